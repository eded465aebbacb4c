use crate::platform::{
    Bounds, CaptureTarget, Display, DisplayIndex, EventDispatcher, PixelBuffer, PlatformResult,
    ProcessId, Size, SurfaceId, WindowRecord,
};

/// Read-only queries about the desktop. Called about once a second from the coordination task,
/// so implementations should answer with bounded latency.
pub trait PlatformImpl: Send + Sync {
    /// Returns every on-screen window, front to back. Filtering is done by the caller.
    fn list_windows(&self) -> PlatformResult<Vec<WindowRecord>>;

    /// Returns the process that currently owns keyboard focus, if any.
    fn frontmost_process_id(&self) -> PlatformResult<Option<ProcessId>>;

    /// Returns all connected displays. The position in the list is the display index.
    fn list_displays(&self) -> PlatformResult<Vec<Display>>;

    fn current_process_id(&self) -> ProcessId {
        std::process::id()
    }
}

/// Creates and feeds the borderless, always-on-top, click-through surfaces overlays draw into.
pub trait PlatformOverlayImpl: Send + Sync {
    fn create_surface(
        &self,
        bounds: &Bounds,
        display: Option<DisplayIndex>,
    ) -> PlatformResult<SurfaceId>;

    fn resize_surface(&self, surface: SurfaceId, bounds: &Bounds) -> PlatformResult<()>;

    fn destroy_surface(&self, surface: SurfaceId) -> PlatformResult<()>;

    /// Shows a fully rendered frame. Called from the render thread.
    fn present(&self, surface: SurfaceId, frame: &PixelBuffer) -> PlatformResult<()>;
}

pub trait PlatformCaptureImpl: Send + Sync {
    /// Captures the target at roughly `size`. Blocks; only ever called from a worker thread.
    fn capture(&self, target: CaptureTarget, size: Size) -> PlatformResult<PixelBuffer>;
}

pub trait PlatformEventsImpl: Send + Sync {
    /// Begins delivering display, space and activation notifications through `dispatcher`.
    fn start(&self, dispatcher: EventDispatcher) -> PlatformResult<()>;

    /// Whether surfaces must be created from a toolkit event loop on the main thread.
    fn requires_main_loop(&self) -> bool {
        false
    }
}
