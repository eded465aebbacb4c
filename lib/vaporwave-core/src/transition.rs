use crate::config::Config;
use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Focus,
    Space,
    Display,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionState {
    Idle,
    /// New overlays are not created.
    CoolingDown,
    /// Displays are settling; reconciliation is paused until the rebuild.
    Reconfiguring,
}

impl Display for TransitionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionState::Idle => write!(f, "idle"),
            TransitionState::CoolingDown => write!(f, "cooling down"),
            TransitionState::Reconfiguring => write!(f, "reconfiguring"),
        }
    }
}

/// What the engine should do once a deadline has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionAction {
    None,
    Reconcile,
    /// Destroy every overlay and reconcile from scratch.
    Rebuild,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionTimings {
    pub cooldown: Duration,
    pub focus_settle: Duration,
    pub space_settle: Duration,
    pub display_settle: Duration,
}

impl TransitionTimings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cooldown: config.transition_cooldown(),
            focus_settle: config.focus_settle(),
            space_settle: config.space_settle(),
            display_settle: config.display_settle(),
        }
    }
}

/// Turns focus, space and display notifications into deadlines. Time is always passed in, so
/// the whole protocol can be driven by hand.
#[derive(Debug)]
pub struct TransitionCoordinator {
    timings: TransitionTimings,
    cooldown_until: Option<Instant>,
    pending_reconcile_at: Option<Instant>,
    rebuild_at: Option<Instant>,
}

impl TransitionCoordinator {
    pub fn new(timings: TransitionTimings) -> Self {
        Self {
            timings,
            cooldown_until: None,
            pending_reconcile_at: None,
            rebuild_at: None,
        }
    }

    pub fn set_timings(&mut self, timings: TransitionTimings) {
        self.timings = timings;
    }

    /// Records a transition. The caller is responsible for the global fade-out.
    pub fn begin(&mut self, kind: TransitionKind, now: Instant) {
        self.cooldown_until = later(self.cooldown_until, now + self.timings.cooldown);

        match kind {
            TransitionKind::Focus => {
                self.pending_reconcile_at =
                    later(self.pending_reconcile_at, now + self.timings.focus_settle);
            }
            TransitionKind::Space => {
                self.pending_reconcile_at =
                    later(self.pending_reconcile_at, now + self.timings.space_settle);
            }
            TransitionKind::Display => {
                // Another change while settling restarts the wait
                self.rebuild_at = later(self.rebuild_at, now + self.timings.display_settle);
            }
        }
    }

    pub fn is_cooling_down(&self, now: Instant) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }

    pub fn is_reconfiguring(&self) -> bool {
        self.rebuild_at.is_some()
    }

    pub fn state(&self, now: Instant) -> TransitionState {
        if self.is_reconfiguring() {
            TransitionState::Reconfiguring
        } else if self.is_cooling_down(now) {
            TransitionState::CoolingDown
        } else {
            TransitionState::Idle
        }
    }

    /// Consumes whichever deadline has passed. A rebuild swallows any pending reconcile, and
    /// pending reconciles wait while displays are settling.
    pub fn take_due(&mut self, now: Instant) -> TransitionAction {
        if let Some(at) = self.rebuild_at {
            if now >= at {
                self.rebuild_at = None;
                self.pending_reconcile_at = None;
                return TransitionAction::Rebuild;
            }
            return TransitionAction::None;
        }

        match self.pending_reconcile_at {
            Some(at) if now >= at => {
                self.pending_reconcile_at = None;
                TransitionAction::Reconcile
            }
            _ => TransitionAction::None,
        }
    }

    /// The earliest instant at which `take_due` will return something.
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.rebuild_at {
            Some(at) => Some(at),
            None => self.pending_reconcile_at,
        }
    }

    pub fn clear(&mut self) {
        self.cooldown_until = None;
        self.pending_reconcile_at = None;
        self.rebuild_at = None;
    }
}

fn later(current: Option<Instant>, candidate: Instant) -> Option<Instant> {
    Some(match current {
        Some(existing) => existing.max(candidate),
        None => candidate,
    })
}
