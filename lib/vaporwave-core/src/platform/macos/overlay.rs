use crate::event_loop_main::run_on_main_thread_blocking;
use crate::platform::macos::MacOSPlatform;
use crate::platform::{
    Bounds, DisplayIndex, PixelBuffer, PlatformOverlayImpl, PlatformResult, SurfaceId,
};
use core_graphics::base::{
    kCGBitmapByteOrder32Little, kCGImageAlphaPremultipliedFirst, kCGRenderingIntentDefault,
};
use core_graphics::color_space::CGColorSpace;
use core_graphics::data_provider::CGDataProvider;
use core_graphics::image::CGImage;
use foreign_types::ForeignType;
use objc2::msg_send;
use objc2::runtime::AnyObject;
use objc2_app_kit::{NSColor, NSView, NSWindowCollectionBehavior};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use winit::dpi::{LogicalPosition, LogicalSize};
use winit::event_loop::ActiveEventLoop;
use winit::raw_window_handle::{HasWindowHandle, RawWindowHandle};
use winit::window::{Window, WindowLevel};

impl PlatformOverlayImpl for MacOSPlatform {
    fn create_surface(
        &self,
        bounds: &Bounds,
        _display: Option<DisplayIndex>,
    ) -> PlatformResult<SurfaceId> {
        let bounds = *bounds;
        let window =
            run_on_main_thread_blocking(move |event_loop| create_overlay_window(event_loop, &bounds))??;

        let id = self.next_surface.fetch_add(1, Ordering::Relaxed);
        self.surfaces().insert(id, Arc::new(window));
        Ok(id)
    }

    fn resize_surface(&self, surface: SurfaceId, bounds: &Bounds) -> PlatformResult<()> {
        let window = self.window(surface)?;
        let bounds = *bounds;
        run_on_main_thread_blocking(move |_| {
            window.set_outer_position(LogicalPosition::new(bounds.position.x, bounds.position.y));
            let _ = window.request_inner_size(LogicalSize::new(bounds.size.width, bounds.size.height));
        })
    }

    fn destroy_surface(&self, surface: SurfaceId) -> PlatformResult<()> {
        let window = self
            .surfaces()
            .remove(&surface)
            .ok_or_else(|| format!("Unknown surface {surface}"))?;

        // Closing happens when the last reference goes away, which must be on the main thread
        run_on_main_thread_blocking(move |_| {
            window.set_visible(false);
            drop(window);
        })
    }

    fn present(&self, surface: SurfaceId, frame: &PixelBuffer) -> PlatformResult<()> {
        let window = self.window(surface)?;
        let frame = frame.clone();
        run_on_main_thread_blocking(move |_| set_layer_contents(&window, frame))?
    }
}

impl MacOSPlatform {
    fn window(&self, surface: SurfaceId) -> PlatformResult<Arc<Window>> {
        self.surfaces()
            .get(&surface)
            .cloned()
            .ok_or_else(|| format!("Unknown surface {surface}").into())
    }
}

fn create_overlay_window(event_loop: &ActiveEventLoop, bounds: &Bounds) -> PlatformResult<Window> {
    let attributes = Window::default_attributes()
        .with_title("Vaporwave Overlay")
        .with_decorations(false)
        .with_transparent(true)
        .with_resizable(false)
        .with_active(false)
        .with_window_level(WindowLevel::AlwaysOnTop)
        .with_position(LogicalPosition::new(bounds.position.x, bounds.position.y))
        .with_inner_size(LogicalSize::new(bounds.size.width, bounds.size.height));

    let window = event_loop
        .create_window(attributes)
        .map_err(|e| format!("Failed to create overlay window: {e}"))?;
    let _ = window.set_cursor_hittest(false);

    let view = ns_view(&window)?;
    unsafe {
        let ns_window = view.window().ok_or("Failed to get NSWindow from NSView")?;
        ns_window.setOpaque(false);
        ns_window.setBackgroundColor(Some(&NSColor::clearColor()));
        ns_window.setHasShadow(false);
        ns_window.setIgnoresMouseEvents(true);
        ns_window.setCollectionBehavior(
            NSWindowCollectionBehavior::Stationary
                | NSWindowCollectionBehavior::FullScreenAuxiliary
                | NSWindowCollectionBehavior::MoveToActiveSpace,
        );
        view.setWantsLayer(true);
    }

    Ok(window)
}

fn ns_view(window: &Window) -> PlatformResult<&NSView> {
    let window_handle = window
        .window_handle()
        .map_err(|e| format!("Failed to get window handle: {e}"))?;

    match window_handle.as_raw() {
        RawWindowHandle::AppKit(handle) => {
            let ns_view = handle.ns_view.as_ptr() as *const NSView;
            if ns_view.is_null() {
                return Err("NSView pointer is null".into());
            }
            Ok(unsafe { &*ns_view })
        }
        _ => Err("Expected AppKit window handle".into()),
    }
}

/// Hands the frame to the view's backing layer. The layer retains the image.
fn set_layer_contents(window: &Window, frame: PixelBuffer) -> PlatformResult<()> {
    let image = CGImage::new(
        frame.width as usize,
        frame.height as usize,
        8,
        32,
        frame.row_bytes,
        &CGColorSpace::create_device_rgb(),
        kCGBitmapByteOrder32Little | kCGImageAlphaPremultipliedFirst,
        &CGDataProvider::from_buffer(Arc::new(frame.pixels)),
        false,
        kCGRenderingIntentDefault,
    );

    let view = ns_view(window)?;
    unsafe {
        let layer: *mut AnyObject = msg_send![view, layer];
        if layer.is_null() {
            return Err("Overlay view has no layer".into());
        }
        let contents = image.as_ptr() as *mut AnyObject;
        let _: () = msg_send![layer, setContents: contents];
    }
    Ok(())
}
