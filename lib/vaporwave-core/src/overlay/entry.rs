use crate::overlay::{FadeController, FadeRates, OverlayId, OverlayTarget, COLLECT_OPACITY};
use crate::platform::{Bounds, DisplayIndex, PixelBuffer, PlatformResult, SurfaceId};
use log::trace;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayPhase {
    FadingIn,
    Visible,
    FadingOut,
}

/// Everything the engine tracks for one overlay.
#[derive(Debug)]
pub struct OverlayEntry {
    id: OverlayId,
    target: OverlayTarget,
    pub surface: SurfaceId,
    pub bounds: Bounds,
    pub display: Option<DisplayIndex>,
    pub fade: FadeController,
    fading_out: bool,
    texture: Option<Arc<PixelBuffer>>,
    capture_in_flight: bool,
    last_capture_dispatch: Option<Instant>,
    animation_start: Instant,
    last_frame_at: Option<Instant>,
    /// Set once the transparent frame has been sent after the overlay dropped out of view.
    cleared: bool,
}

impl OverlayEntry {
    pub fn new(
        id: OverlayId,
        target: OverlayTarget,
        surface: SurfaceId,
        bounds: Bounds,
        display: Option<DisplayIndex>,
        now: Instant,
    ) -> Self {
        Self {
            id,
            target,
            surface,
            bounds,
            display,
            fade: FadeController::fading_in(),
            fading_out: false,
            texture: None,
            capture_in_flight: false,
            last_capture_dispatch: None,
            animation_start: now,
            last_frame_at: None,
            // Nothing has been drawn yet, so there is nothing to clear
            cleared: true,
        }
    }

    pub fn id(&self) -> OverlayId {
        self.id
    }

    pub fn target(&self) -> OverlayTarget {
        self.target
    }

    pub fn phase(&self) -> OverlayPhase {
        if self.fading_out {
            OverlayPhase::FadingOut
        } else if self.fade.current() < self.fade.target() {
            OverlayPhase::FadingIn
        } else {
            OverlayPhase::Visible
        }
    }

    pub fn is_fading_out(&self) -> bool {
        self.fading_out
    }

    /// Soft removal: animate to zero, get collected later.
    pub fn fade_out(&mut self) {
        self.fading_out = true;
        self.fade.set_target(0.0);
    }

    pub fn revive(&mut self) {
        self.fading_out = false;
        self.fade.set_target(1.0);
    }

    pub fn is_collectable(&self) -> bool {
        self.fading_out && self.fade.current() < COLLECT_OPACITY
    }

    pub fn opacity(&self) -> f64 {
        self.fade.current()
    }

    pub fn texture(&self) -> Option<&Arc<PixelBuffer>> {
        self.texture.as_ref()
    }

    pub fn is_capture_in_flight(&self) -> bool {
        self.capture_in_flight
    }

    pub fn last_capture_dispatch(&self) -> Option<Instant> {
        self.last_capture_dispatch
    }

    pub fn animation_start(&self) -> Instant {
        self.animation_start
    }

    pub fn reset_animation(&mut self, now: Instant) {
        self.animation_start = now;
    }

    /// True when a new capture may be dispatched: nothing in flight, the overlay is being drawn,
    /// and the throttle interval has passed.
    pub fn wants_capture(&self, now: Instant, interval: Duration) -> bool {
        if self.capture_in_flight || !self.fade.is_visible() {
            return false;
        }
        match self.last_capture_dispatch {
            Some(last) => now.saturating_duration_since(last) >= interval,
            None => true,
        }
    }

    pub fn begin_capture(&mut self, now: Instant) {
        self.capture_in_flight = true;
        self.last_capture_dispatch = Some(now);
    }

    /// Clears the in-flight flag. Returns whether the texture was replaced.
    pub fn finish_capture(&mut self, result: PlatformResult<PixelBuffer>) -> bool {
        self.capture_in_flight = false;
        match result {
            Ok(image) => {
                self.texture = Some(Arc::new(image));
                true
            }
            Err(e) => {
                trace!("Capture for overlay {} ({}) failed: {e}", self.id, self.target);
                false
            }
        }
    }

    pub fn is_frame_due(&self, now: Instant, interval: Duration) -> bool {
        match self.last_frame_at {
            Some(last) => now.saturating_duration_since(last) >= interval,
            None => true,
        }
    }

    /// Fully faded, settled and already cleared: stepping it changes nothing.
    pub fn is_idle(&self) -> bool {
        self.fade.is_settled() && !self.fade.is_visible() && self.cleared
    }

    pub fn next_frame_at(&self, interval: Duration) -> Option<Instant> {
        self.last_frame_at.map(|last| last + interval)
    }

    /// Steps the fade for one frame. Returns whether a frame should be drawn: visible overlays
    /// always draw, and an overlay that just dropped out of view draws one last transparent frame.
    pub fn advance_frame(&mut self, now: Instant, rates: &FadeRates) -> bool {
        self.last_frame_at = Some(now);
        self.fade.step(rates);

        if self.fade.is_visible() {
            self.cleared = false;
            true
        } else if !self.cleared {
            self.cleared = true;
            true
        } else {
            false
        }
    }
}
