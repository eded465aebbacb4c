use crate::platform::macos::ffi::CGRectNull;
use crate::platform::macos::MacOSPlatform;
use crate::platform::{CaptureTarget, PixelBuffer, PlatformCaptureImpl, PlatformResult, Size};
use core_graphics::base::{kCGBitmapByteOrder32Little, kCGImageAlphaPremultipliedFirst};
use core_graphics::color_space::CGColorSpace;
use core_graphics::context::CGContext;
use core_graphics::display::CGDisplay;
use core_graphics::geometry::{CGPoint, CGRect, CGSize};
use core_graphics::image::CGImage;
use core_graphics::window::{
    create_image, kCGWindowImageBoundsIgnoreFraming, kCGWindowImageNominalResolution,
    kCGWindowListOptionIncludingWindow, CGWindowID,
};

impl PlatformCaptureImpl for MacOSPlatform {
    /// Display images come back at native (Retina) resolution, so the result is drawn down to
    /// `size` before it leaves the capture worker.
    fn capture(&self, target: CaptureTarget, size: Size) -> PlatformResult<PixelBuffer> {
        let image = match target {
            CaptureTarget::Window(id) => create_image(
                unsafe { CGRectNull },
                kCGWindowListOptionIncludingWindow,
                id as CGWindowID,
                kCGWindowImageBoundsIgnoreFraming | kCGWindowImageNominalResolution,
            ),
            CaptureTarget::Screen(index) => {
                let displays = CGDisplay::active_displays()
                    .map_err(|e| format!("Could not list displays: error {e}"))?;
                let id = displays
                    .get(index)
                    .ok_or_else(|| format!("Display {index} no longer exists"))?;
                CGDisplay::new(*id).image()
            }
        };

        let image = image.ok_or_else(|| format!("Could not capture {target:?}"))?;
        scaled_pixel_buffer(&image, size)
    }
}

/// Draws `image` into a BGRA premultiplied bitmap no larger than `size`.
fn scaled_pixel_buffer(image: &CGImage, size: Size) -> PlatformResult<PixelBuffer> {
    let (width, height) = size.downscale(image.width() as u32, image.height() as u32);
    let row_bytes = width as usize * 4;

    let mut context = CGContext::create_bitmap_context(
        None,
        width as usize,
        height as usize,
        8,
        row_bytes,
        &CGColorSpace::create_device_rgb(),
        kCGImageAlphaPremultipliedFirst | kCGBitmapByteOrder32Little,
    );
    context.draw_image(
        CGRect::new(
            &CGPoint::new(0.0, 0.0),
            &CGSize::new(width as f64, height as f64),
        ),
        image,
    );

    PixelBuffer::new(width, height, row_bytes, context.data().to_vec())
}
