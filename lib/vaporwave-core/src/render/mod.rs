mod pipeline;
mod renderer;

pub use pipeline::{RenderPipeline, BUILTIN_EFFECT};
pub use renderer::{RenderCommand, RenderHandle};

use crate::overlay::OverlayId;
use crate::platform::{PixelBuffer, Size, SurfaceId};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to read effect source '{}': {source}", .path.display())]
    Source {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to compile effect: {0}")]
    Compile(String),
    #[error("Effect uniforms don't match: {0}")]
    UniformLayout(String),
    #[error("Could not allocate a {width}x{height} surface")]
    Surface { width: u32, height: u32 },
    #[error("Could not read back a {width}x{height} frame")]
    Readback { width: u32, height: u32 },
    #[error("Render thread stopped before it was ready")]
    ThreadStopped,
}

/// Everything needed to draw one overlay for one frame. Copied out of the registry so the render
/// thread never looks at engine state.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub overlay: OverlayId,
    pub surface: SurfaceId,
    pub size: Size,
    pub opacity: f32,
    /// Time since the overlay's animation start.
    pub elapsed: Duration,
    pub seed: f32,
    pub texture: Option<Arc<PixelBuffer>>,
}
