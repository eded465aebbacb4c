use std::time::Duration;

/// Below this an overlay is not drawn at all.
pub const VISIBLE_OPACITY: f64 = 0.001;

/// A fading-out overlay below this is destroyed on the next reconciliation pass.
pub const COLLECT_OPACITY: f64 = 0.01;

// Absorbs float drift so a fade finishes in exactly ceil(1 / step) steps.
const SNAP_EPSILON: f64 = 1e-9;

/// Per-frame opacity steps. Fade-in is slow and fade-out is fast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeRates {
    pub fade_in_step: f64,
    pub fade_out_step: f64,
}

impl FadeRates {
    pub fn new(fade_in_step: f64, fade_out_step: f64) -> Self {
        Self {
            fade_in_step: sanitize_step(fade_in_step),
            fade_out_step: sanitize_step(fade_out_step),
        }
    }

    /// Steps that take `fade_in` / `fade_out` to cover the full range when stepped once every
    /// `frame_interval`.
    pub fn from_durations(fade_in: Duration, fade_out: Duration, frame_interval: Duration) -> Self {
        Self::new(
            step_for(fade_in, frame_interval),
            step_for(fade_out, frame_interval),
        )
    }
}

fn step_for(duration: Duration, frame_interval: Duration) -> f64 {
    if duration.is_zero() {
        return 1.0;
    }
    frame_interval.as_secs_f64() / duration.as_secs_f64()
}

fn sanitize_step(step: f64) -> f64 {
    if step.is_finite() && step > 0.0 {
        step.min(1.0)
    } else {
        1.0
    }
}

/// Current and target opacity of one overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeController {
    current: f64,
    target: f64,
}

impl FadeController {
    /// Starts invisible, heading for full opacity.
    pub fn fading_in() -> Self {
        Self {
            current: 0.0,
            target: 1.0,
        }
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn set_target(&mut self, target: f64) {
        self.target = if target.is_nan() {
            0.0
        } else {
            target.clamp(0.0, 1.0)
        };
    }

    pub fn is_settled(&self) -> bool {
        self.current == self.target
    }

    pub fn is_visible(&self) -> bool {
        self.current >= VISIBLE_OPACITY
    }

    /// Moves one step toward the target without overshooting. Returns the new opacity.
    pub fn step(&mut self, rates: &FadeRates) -> f64 {
        if self.current < self.target {
            let next = self.current + rates.fade_in_step;
            self.current = if next >= self.target - SNAP_EPSILON {
                self.target
            } else {
                next
            };
        } else if self.current > self.target {
            let next = self.current - rates.fade_out_step;
            self.current = if next <= self.target + SNAP_EPSILON {
                self.target
            } else {
                next
            };
        }
        self.current
    }
}
