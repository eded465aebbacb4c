use core_graphics::geometry::CGRect;

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    /// Passed to `CGWindowListCreateImage` to capture exactly the window's own bounds.
    pub static CGRectNull: CGRect;

    pub fn CGPreflightScreenCaptureAccess() -> bool;
}
