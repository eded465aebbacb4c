use serde::{Deserialize, Serialize};
use std::backtrace::Backtrace;
use std::fmt::{Debug, Display, Formatter};

#[derive(Debug)]
pub struct PlatformError {
    pub error_type: PlatformErrorType,
    pub backtrace: Backtrace,
}

#[derive(Debug)]
pub enum PlatformErrorType {
    Unknown,
    Error(String),
}

impl From<PlatformErrorType> for PlatformError {
    fn from(error_type: PlatformErrorType) -> Self {
        Self {
            error_type,
            backtrace: Backtrace::capture(),
        }
    }
}

impl From<&str> for PlatformError {
    fn from(error: &str) -> Self {
        PlatformErrorType::Error(error.to_string()).into()
    }
}

impl From<String> for PlatformError {
    fn from(error: String) -> Self {
        PlatformErrorType::Error(error).into()
    }
}

impl From<()> for PlatformError {
    fn from(_: ()) -> Self {
        PlatformErrorType::Unknown.into()
    }
}

impl Display for PlatformError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.error_type {
            PlatformErrorType::Unknown => write!(f, "unknown platform error"),
            PlatformErrorType::Error(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for PlatformError {}

pub type PlatformResult<T> = Result<T, PlatformError>;

pub type DisplayId = u32;
pub type DisplayIndex = usize;
pub type ProcessId = u32;
pub type WindowId = u64;
pub type SurfaceId = u64;

/// The window layer that ordinary application windows live on.
pub const NORMAL_WINDOW_LAYER: i32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Pixel dimensions, rounded and clamped to at least one pixel.
    pub fn to_pixels(&self) -> (u32, u32) {
        let clamp = |v: f64| {
            if v.is_finite() {
                v.round().max(1.0).min(u32::MAX as f64) as u32
            } else {
                1
            }
        };
        (clamp(self.width), clamp(self.height))
    }

    /// Dimensions to scale a `width` x `height` image to so it is no larger than this size.
    /// Never upscales.
    pub fn downscale(&self, width: u32, height: u32) -> (u32, u32) {
        let (max_width, max_height) = self.to_pixels();
        (width.min(max_width).max(1), height.min(max_height).max(1))
    }
}

/// A rectangle in global desktop coordinates, origin at the top-left of the primary display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Bounds {
    pub position: Position,
    pub size: Size,
}

impl Bounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            position: Position::new(x, y),
            size: Size::new(width, height),
        }
    }

    pub fn center(&self) -> Position {
        Position::new(
            self.position.x + self.size.width / 2.0,
            self.position.y + self.size.height / 2.0,
        )
    }

    pub fn contains(&self, position: &Position) -> bool {
        position.x >= self.position.x
            && position.x < self.position.x + self.size.width
            && position.y >= self.position.y
            && position.y < self.position.y + self.size.height
    }

    /// True when any component is NaN or infinite, or the area is empty.
    pub fn is_degenerate(&self) -> bool {
        let components = [
            self.position.x,
            self.position.y,
            self.size.width,
            self.size.height,
        ];
        components.iter().any(|v| !v.is_finite()) || self.size.width <= 0.0 || self.size.height <= 0.0
    }
}

/// One on-screen window as reported by the platform. Produced fresh on every poll.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowRecord {
    pub id: WindowId,
    pub bounds: Bounds,
    pub pid: ProcessId,
    pub title: String,
    pub owner_name: String,
    pub layer: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Display {
    pub id: DisplayId,
    pub name: String,
    pub bounds: Bounds,
}

/// Index of the display whose bounds contain `bounds`' center.
pub fn display_index_for(bounds: &Bounds, displays: &[Display]) -> Option<DisplayIndex> {
    let center = bounds.center();
    displays.iter().position(|d| d.bounds.contains(&center))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureTarget {
    Window(WindowId),
    Screen(DisplayIndex),
}

/// Tightly described BGRA8 premultiplied pixels. Used both for captured images and for the
/// frames handed to overlay surfaces.
#[derive(Clone, PartialEq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub row_bytes: usize,
    pub pixels: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, row_bytes: usize, pixels: Vec<u8>) -> PlatformResult<Self> {
        if row_bytes < width as usize * 4 {
            return Err(format!("Row stride {row_bytes} too small for width {width}").into());
        }
        if pixels.len() < row_bytes * height as usize {
            return Err(format!(
                "Pixel data too short: {} bytes for {width}x{height}",
                pixels.len()
            )
            .into());
        }
        Ok(Self {
            width,
            height,
            row_bytes,
            pixels,
        })
    }

    pub fn filled(width: u32, height: u32, bgra: [u8; 4]) -> Self {
        let pixels = bgra
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            width,
            height,
            row_bytes: width as usize * 4,
            pixels,
        }
    }

    pub fn is_fully_transparent(&self) -> bool {
        self.pixels.chunks_exact(4).all(|px| px[3] == 0)
    }
}

impl Debug for PixelBuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("row_bytes", &self.row_bytes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn display(id: u32, x: f64, width: f64) -> Display {
        Display {
            id,
            name: format!("Display {id}"),
            bounds: Bounds::new(x, 0.0, width, 1080.0),
        }
    }

    #[test]
    fn test_bounds_degenerate() {
        assert!(!Bounds::new(0.0, 0.0, 100.0, 100.0).is_degenerate());
        assert!(Bounds::new(f64::NAN, 0.0, 100.0, 100.0).is_degenerate());
        assert!(Bounds::new(0.0, f64::INFINITY, 100.0, 100.0).is_degenerate());
        assert!(Bounds::new(0.0, 0.0, 0.0, 100.0).is_degenerate());
        assert!(Bounds::new(0.0, 0.0, 100.0, -4.0).is_degenerate());
    }

    #[test]
    fn test_display_index_uses_center() {
        let displays = vec![display(1, 0.0, 1920.0), display(2, 1920.0, 1920.0)];

        // Mostly on the second display even though the origin is on the first
        let window = Bounds::new(1800.0, 100.0, 800.0, 600.0);
        assert_eq!(display_index_for(&window, &displays), Some(1));

        let window = Bounds::new(100.0, 100.0, 800.0, 600.0);
        assert_eq!(display_index_for(&window, &displays), Some(0));

        let offscreen = Bounds::new(-5000.0, 100.0, 800.0, 600.0);
        assert_eq!(display_index_for(&offscreen, &displays), None);
    }

    #[test]
    fn test_size_to_pixels_clamps() {
        assert_eq!(Size::new(99.6, 0.2).to_pixels(), (100, 1));
        assert_eq!(Size::new(f64::NAN, 10.0).to_pixels(), (1, 10));
    }

    #[test]
    fn test_size_downscale() {
        // Retina screenshot of a 1920x1080 point display
        assert_eq!(Size::new(1920.0, 1080.0).downscale(3840, 2160), (1920, 1080));
        assert_eq!(Size::new(1920.0, 1080.0).downscale(800, 600), (800, 600));
        assert_eq!(Size::new(400.0, 300.0).downscale(0, 600), (1, 300));
    }

    #[test]
    fn test_pixel_buffer_validation() {
        assert!(PixelBuffer::new(2, 2, 8, vec![0; 16]).is_ok());
        assert!(PixelBuffer::new(2, 2, 4, vec![0; 16]).is_err());
        assert!(PixelBuffer::new(2, 2, 8, vec![0; 15]).is_err());

        let clear = PixelBuffer::filled(3, 3, [0, 0, 0, 0]);
        assert!(clear.is_fully_transparent());
        let opaque = PixelBuffer::filled(3, 3, [10, 20, 30, 255]);
        assert!(!opaque.is_fully_transparent());
        assert_eq!(opaque.pixels.len(), 36);
    }
}
