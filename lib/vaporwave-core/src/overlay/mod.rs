mod capture;
mod entry;
mod fade;
mod registry;

pub use capture::{CaptureDispatcher, CaptureRequest};
pub use entry::{OverlayEntry, OverlayPhase};
pub use fade::{FadeController, FadeRates, COLLECT_OPACITY, VISIBLE_OPACITY};
pub use registry::OverlayRegistry;

use crate::platform::{CaptureTarget, DisplayIndex, WindowId};
use std::fmt::{Display, Formatter};

/// Handle for one overlay entry. Allocated by the registry and never reused, so a late capture
/// result or render command can't land on a newer overlay for the same window.
pub type OverlayId = u64;

/// What an overlay sits on top of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayTarget {
    Window(WindowId),
    /// A whole display, used in full-screen mode.
    Screen(DisplayIndex),
}

impl OverlayTarget {
    pub fn capture_target(&self) -> CaptureTarget {
        match *self {
            OverlayTarget::Window(id) => CaptureTarget::Window(id),
            OverlayTarget::Screen(index) => CaptureTarget::Screen(index),
        }
    }

    /// Per-overlay variation fed to the effect.
    pub fn seed(&self) -> f32 {
        match *self {
            OverlayTarget::Window(id) => id as f32,
            OverlayTarget::Screen(index) => index as f32,
        }
    }
}

impl Display for OverlayTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OverlayTarget::Window(id) => write!(f, "window {id}"),
            OverlayTarget::Screen(index) => write!(f, "screen {index}"),
        }
    }
}
