use crate::config::Config;
use crate::overlay::{CaptureRequest, FadeRates, OverlayEntry, OverlayId, OverlayRegistry};
use crate::platform::{EngineEvent, PixelBuffer, PlatformResult, PlatformServices, ProcessId};
use crate::reconcile::{
    apply_plan, destroy_entry, screen_targets, window_targets, ActiveContext, PassOutcome,
    ReconcilePlan, SkipReason, WindowFilter,
};
use crate::render::FrameSnapshot;
use crate::transition::{TransitionAction, TransitionCoordinator, TransitionKind, TransitionTimings};
use log::{debug, info, trace, warn};
use std::time::{Duration, Instant};

/// Work produced by one frame tick.
#[derive(Debug, Default)]
pub struct FrameOutput {
    pub snapshots: Vec<FrameSnapshot>,
    pub captures: Vec<CaptureRequest>,
}

/// Owns the overlay registry and every decision about it. Nothing here blocks or sleeps, and
/// every method that depends on time takes it as an argument.
pub struct OverlayEngine {
    services: PlatformServices,
    registry: OverlayRegistry,
    transitions: TransitionCoordinator,
    filter: WindowFilter,
    own_pid: ProcessId,
    fullscreen: bool,
    frame_interval: Duration,
    fade_rates: FadeRates,
    capture_interval: Duration,
    max_new_overlays_per_pass: usize,
    released: Vec<OverlayId>,
}

impl OverlayEngine {
    pub fn new(services: PlatformServices, config: &Config) -> Self {
        let own_pid = services.platform.current_process_id();
        Self {
            registry: OverlayRegistry::new(),
            transitions: TransitionCoordinator::new(TransitionTimings::from_config(config)),
            filter: WindowFilter::new(config, own_pid),
            own_pid,
            fullscreen: config.fullscreen,
            frame_interval: config.frame_interval(),
            fade_rates: config.fade_rates(),
            capture_interval: config.capture_interval(),
            max_new_overlays_per_pass: config.max_new_overlays_per_pass,
            released: Vec::new(),
            services,
        }
    }

    /// Picks up new timings, rates and filters. Existing overlays keep their identity; a mode
    /// switch fades them out through the normal reconciliation path.
    pub fn apply_config(&mut self, config: &Config) {
        if config.fullscreen != self.fullscreen {
            info!(
                "Switching to {} mode",
                if config.fullscreen { "full-screen" } else { "window" }
            );
        }

        self.transitions
            .set_timings(TransitionTimings::from_config(config));
        self.filter = WindowFilter::new(config, self.own_pid);
        self.fullscreen = config.fullscreen;
        self.frame_interval = config.frame_interval();
        self.fade_rates = config.fade_rates();
        self.capture_interval = config.capture_interval();
        self.max_new_overlays_per_pass = config.max_new_overlays_per_pass;
    }

    pub fn registry(&self) -> &OverlayRegistry {
        &self.registry
    }

    pub fn transitions(&self) -> &TransitionCoordinator {
        &self.transitions
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    pub fn handle_event(&mut self, event: EngineEvent, now: Instant) {
        match event {
            EngineEvent::DisplaysReconfigured => self.on_displays_reconfigured(now),
            EngineEvent::ActiveSpaceChanged => self.on_space_changed(now),
            EngineEvent::ApplicationActivated(pid) => self.on_application_activated(pid, now),
            EngineEvent::CaptureCompleted { overlay, result } => {
                self.complete_capture(overlay, result);
            }
            EngineEvent::ConfigChanged => self.apply_config(&Config::current()),
            EngineEvent::Shutdown => {}
        }
    }

    pub fn on_displays_reconfigured(&mut self, now: Instant) {
        debug!("Display configuration changed, fading out all overlays");
        self.fade_out_all();
        self.transitions.begin(TransitionKind::Display, now);
    }

    pub fn on_space_changed(&mut self, now: Instant) {
        if self.fullscreen {
            return;
        }
        debug!("Space changed, fading out all overlays");
        self.fade_out_all();
        self.transitions.begin(TransitionKind::Space, now);
    }

    pub fn on_application_activated(&mut self, pid: ProcessId, now: Instant) {
        if self.fullscreen {
            return;
        }
        debug!("Application {pid} activated, fading out all overlays");
        // The focused window must never keep an overlay through the transition; the next pass
        // revives the ones that still qualify.
        for entry in self.registry.iter_mut() {
            entry.reset_animation(now);
            entry.fade_out();
        }
        self.transitions.begin(TransitionKind::Focus, now);
    }

    fn fade_out_all(&mut self) {
        for entry in self.registry.iter_mut() {
            entry.fade_out();
        }
    }

    /// One reconciliation pass. Never fails; problems are logged and the registry is left as is.
    pub fn reconcile(&mut self, now: Instant) -> PassOutcome {
        if self.transitions.is_reconfiguring() {
            trace!("Skipping reconciliation while displays settle");
            return PassOutcome::Skipped(SkipReason::Reconfiguring);
        }

        let displays = match self.services.platform.list_displays() {
            Ok(displays) => displays,
            Err(e) => {
                warn!("Failed to list displays: {e}");
                return PassOutcome::Skipped(SkipReason::WindowListFailed);
            }
        };
        if displays.is_empty() {
            return PassOutcome::Skipped(SkipReason::NoDisplays);
        }

        let (desired, active_display) = if self.fullscreen {
            (screen_targets(&displays), None)
        } else {
            let windows = match self.services.platform.list_windows() {
                Ok(windows) => windows,
                Err(e) => {
                    warn!("Failed to list windows: {e}");
                    return PassOutcome::Skipped(SkipReason::WindowListFailed);
                }
            };
            let frontmost = self
                .services
                .platform
                .frontmost_process_id()
                .unwrap_or_else(|e| {
                    warn!("Failed to get frontmost process: {e}");
                    None
                });

            let context = ActiveContext::resolve(frontmost, &windows, &displays, self.own_pid);
            let desired = window_targets(&windows, &self.filter, &context, &displays);
            (desired, context.display)
        };

        let plan = ReconcilePlan::compute(
            &self.registry,
            &desired,
            !self.transitions.is_cooling_down(now),
            self.max_new_overlays_per_pass,
        );
        let report = apply_plan(
            plan,
            &mut self.registry,
            self.services.overlays.as_ref(),
            self.transitions.state(now),
            active_display,
            now,
        );

        debug!("{report}");
        self.released.extend(report.released.iter().copied());
        PassOutcome::Completed(report)
    }

    /// Runs a reconcile or rebuild whose deadline has passed.
    pub fn advance_transitions(&mut self, now: Instant) -> Option<PassOutcome> {
        match self.transitions.take_due(now) {
            TransitionAction::None => None,
            TransitionAction::Reconcile => Some(self.reconcile(now)),
            TransitionAction::Rebuild => Some(self.rebuild(now)),
        }
    }

    /// Destroys every overlay and reconciles from a fresh enumeration.
    fn rebuild(&mut self, now: Instant) -> PassOutcome {
        let destroyed = self.destroy_all();
        debug!("Displays settled, destroyed {destroyed} overlays, rebuilding");
        self.reconcile(now)
    }

    fn destroy_all(&mut self) -> usize {
        let entries = self.registry.drain();
        for entry in &entries {
            destroy_entry(self.services.overlays.as_ref(), entry);
            self.released.push(entry.id());
        }
        entries.len()
    }

    /// Steps every overlay whose frame is due, returning what to draw and what to capture.
    pub fn frame(&mut self, now: Instant) -> FrameOutput {
        let mut output = FrameOutput::default();

        for entry in self.registry.iter_mut() {
            if !entry.is_frame_due(now, self.frame_interval) {
                continue;
            }

            if entry.advance_frame(now, &self.fade_rates) {
                output.snapshots.push(snapshot(entry, now));
            }

            if entry.wants_capture(now, self.capture_interval) {
                entry.begin_capture(now);
                output.captures.push(CaptureRequest {
                    overlay: entry.id(),
                    target: entry.target().capture_target(),
                    size: entry.bounds.size,
                });
            }
        }

        output
    }

    /// Stores a capture result. Results for overlays that no longer exist are dropped.
    pub fn complete_capture(
        &mut self,
        overlay: OverlayId,
        result: PlatformResult<PixelBuffer>,
    ) -> bool {
        match self.registry.get_by_id_mut(overlay) {
            Some(entry) => entry.finish_capture(result),
            None => {
                trace!("Discarding capture for destroyed overlay {overlay}");
                false
            }
        }
    }

    /// The earliest instant at which the engine has work: a transition deadline or an overlay
    /// frame. `None` when only the poll timer matters.
    pub fn next_deadline(&self, now: Instant) -> Option<Instant> {
        let frames = self
            .registry
            .iter()
            .filter(|entry| !entry.is_idle())
            .map(|entry| entry.next_frame_at(self.frame_interval).unwrap_or(now))
            .min();

        match (frames, self.transitions.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Overlays destroyed since the last call. The render thread should drop their surfaces.
    pub fn take_released(&mut self) -> Vec<OverlayId> {
        std::mem::take(&mut self.released)
    }

    /// Destroys every surface. Used on process exit.
    pub fn shutdown(&mut self) {
        let destroyed = self.destroy_all();
        self.transitions.clear();
        self.released.clear();
        debug!("Destroyed {destroyed} overlays on shutdown");
    }
}

fn snapshot(entry: &OverlayEntry, now: Instant) -> FrameSnapshot {
    FrameSnapshot {
        overlay: entry.id(),
        surface: entry.surface,
        size: entry.bounds.size,
        opacity: entry.opacity() as f32,
        elapsed: now.saturating_duration_since(entry.animation_start()),
        seed: entry.target().seed(),
        texture: entry.texture().cloned(),
    }
}
