use crate::platform::macos::ffi::CGPreflightScreenCaptureAccess;
use crate::platform::{PlatformResult, SurfaceId};
use log::warn;
use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex, MutexGuard};
use winit::window::Window;

mod capture;
mod events;
mod ffi;
mod overlay;
mod platform;

/// Window server queries, screen capture and overlay windows backed by AppKit and CoreGraphics.
pub struct MacOSPlatform {
    surfaces: Mutex<HashMap<SurfaceId, Arc<Window>>>,
    next_surface: AtomicU64,
}

impl MacOSPlatform {
    pub fn new() -> PlatformResult<Self> {
        if !unsafe { CGPreflightScreenCaptureAccess() } {
            warn!("Screen recording permission not granted, overlays will run without captured textures");
        }

        Ok(Self {
            surfaces: Mutex::new(HashMap::new()),
            next_surface: AtomicU64::new(1),
        })
    }

    fn surfaces(&self) -> MutexGuard<'_, HashMap<SurfaceId, Arc<Window>>> {
        self.surfaces.lock().unwrap_or_else(|e| e.into_inner())
    }
}
