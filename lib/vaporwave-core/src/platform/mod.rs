pub use common::*;
pub use event_bridge::*;
pub use traits::*;

mod common;
mod event_bridge;
pub mod mock;
mod traits;

use cfg_if::cfg_if;
use std::sync::Arc;

cfg_if! {
    if #[cfg(target_os = "macos")] {
        mod macos;
        pub type NativePlatform = macos::MacOSPlatform;
    }
}

/// The set of collaborators the engine talks to. Cheap to clone.
#[derive(Clone)]
pub struct PlatformServices {
    pub platform: Arc<dyn PlatformImpl>,
    pub overlays: Arc<dyn PlatformOverlayImpl>,
    pub capture: Arc<dyn PlatformCaptureImpl>,
    pub events: Arc<dyn PlatformEventsImpl>,
}

impl PlatformServices {
    /// Uses one object for every role.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: PlatformImpl
            + PlatformOverlayImpl
            + PlatformCaptureImpl
            + PlatformEventsImpl
            + 'static,
    {
        Self {
            platform: backend.clone(),
            overlays: backend.clone(),
            capture: backend.clone(),
            events: backend,
        }
    }

    pub fn native() -> PlatformResult<Self> {
        cfg_if! {
            if #[cfg(target_os = "macos")] {
                Ok(Self::from_backend(Arc::new(NativePlatform::new()?)))
            } else {
                Err("No native overlay backend for this platform, use --simulate".into())
            }
        }
    }
}
