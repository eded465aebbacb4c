//! One reconciliation pass: decide which windows (or screens) should carry an overlay, diff that
//! against the registry, and apply the result in a fixed order.
//!
//! Computing the [`ReconcilePlan`] is pure. [`apply_plan`] is the only part that touches
//! surfaces, and it never fails: per-target errors are logged and counted.

use crate::config::Config;
use crate::overlay::{OverlayEntry, OverlayId, OverlayRegistry, OverlayTarget};
use crate::platform::{
    display_index_for, Bounds, Display, DisplayIndex, PlatformOverlayImpl, ProcessId,
    WindowRecord, NORMAL_WINDOW_LAYER,
};
use crate::transition::TransitionState;
use log::{debug, warn};
use std::collections::HashSet;
use std::fmt::{Display as FmtDisplay, Formatter};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    OwnProcess,
    ExcludedApp,
    Blacklisted,
    NotNormalLayer,
    InvalidGeometry,
    TooSmall,
}

/// Decides which windows are eligible for an overlay at all, before focus is considered.
#[derive(Debug, Clone)]
pub struct WindowFilter {
    own_pid: ProcessId,
    excluded_apps: HashSet<String>,
    blacklisted_apps: HashSet<String>,
    min_size: f64,
}

impl WindowFilter {
    pub fn new(config: &Config, own_pid: ProcessId) -> Self {
        Self {
            own_pid,
            excluded_apps: config.excluded_apps.iter().cloned().collect(),
            blacklisted_apps: config.blacklisted_apps.iter().cloned().collect(),
            min_size: config.min_window_size,
        }
    }

    pub fn rejection(&self, window: &WindowRecord) -> Option<RejectReason> {
        if window.pid == self.own_pid {
            Some(RejectReason::OwnProcess)
        } else if self.excluded_apps.contains(&window.owner_name) {
            Some(RejectReason::ExcludedApp)
        } else if self.blacklisted_apps.contains(&window.owner_name) {
            Some(RejectReason::Blacklisted)
        } else if window.layer != NORMAL_WINDOW_LAYER {
            Some(RejectReason::NotNormalLayer)
        } else if window.bounds.is_degenerate() {
            Some(RejectReason::InvalidGeometry)
        } else if window.bounds.size.width < self.min_size
            || window.bounds.size.height < self.min_size
        {
            Some(RejectReason::TooSmall)
        } else {
            None
        }
    }

    pub fn accepts(&self, window: &WindowRecord) -> bool {
        self.rejection(window).is_none()
    }
}

/// Where the user is working right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActiveContext {
    pub frontmost: Option<ProcessId>,
    /// The display holding the center of the frontmost process's first normal-layer window that
    /// lies on any display.
    pub display: Option<DisplayIndex>,
}

impl ActiveContext {
    pub fn resolve(
        frontmost: Option<ProcessId>,
        windows: &[WindowRecord],
        displays: &[Display],
        own_pid: ProcessId,
    ) -> Self {
        let display = frontmost.and_then(|pid| {
            windows
                .iter()
                .filter(|w| w.pid == pid && w.pid != own_pid && w.layer == NORMAL_WINDOW_LAYER)
                .find_map(|w| display_index_for(&w.bounds, displays))
        });

        Self { frontmost, display }
    }
}

/// A target that should carry an overlay after this pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DesiredOverlay {
    pub target: OverlayTarget,
    pub bounds: Bounds,
    pub display: Option<DisplayIndex>,
}

/// Eligible windows that are neither owned by the frontmost process nor on the active display.
pub fn window_targets(
    windows: &[WindowRecord],
    filter: &WindowFilter,
    context: &ActiveContext,
    displays: &[Display],
) -> Vec<DesiredOverlay> {
    let mut seen = HashSet::new();
    let mut targets = Vec::new();

    for window in windows {
        if !filter.accepts(window) {
            continue;
        }
        if Some(window.pid) == context.frontmost {
            continue;
        }

        let display = display_index_for(&window.bounds, displays);
        if display.is_some() && display == context.display {
            continue;
        }

        if seen.insert(window.id) {
            targets.push(DesiredOverlay {
                target: OverlayTarget::Window(window.id),
                bounds: window.bounds,
                display,
            });
        }
    }

    targets
}

/// One overlay per display, covering it entirely.
pub fn screen_targets(displays: &[Display]) -> Vec<DesiredOverlay> {
    displays
        .iter()
        .enumerate()
        .filter(|(_, display)| !display.bounds.is_degenerate())
        .map(|(index, display)| DesiredOverlay {
            target: OverlayTarget::Screen(index),
            bounds: display.bounds,
            display: Some(index),
        })
        .collect()
}

/// The decisions of one pass, in the order they are applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    pub revive: Vec<OverlayTarget>,
    pub remove: Vec<OverlayTarget>,
    pub collect: Vec<OverlayTarget>,
    pub update: Vec<DesiredOverlay>,
    pub add: Vec<DesiredOverlay>,
    /// New targets held back by a transition cooldown.
    pub suppressed_adds: usize,
    /// New targets beyond the per-pass limit. They are picked up by later passes.
    pub deferred_adds: usize,
}

impl ReconcilePlan {
    pub fn compute(
        registry: &OverlayRegistry,
        desired: &[DesiredOverlay],
        allow_adds: bool,
        max_adds: usize,
    ) -> Self {
        let wanted: HashSet<OverlayTarget> = desired.iter().map(|d| d.target).collect();
        let mut plan = ReconcilePlan::default();

        for entry in registry.iter() {
            let target = entry.target();
            let targeted = wanted.contains(&target);
            let fading_after = match (entry.is_fading_out(), targeted) {
                (true, true) => {
                    plan.revive.push(target);
                    false
                }
                (false, false) => {
                    plan.remove.push(target);
                    true
                }
                (fading, _) => fading,
            };

            // Removal sets the target to zero but leaves the current opacity alone, so an overlay
            // that never became visible is collected in the same pass.
            if fading_after && entry.opacity() < crate::overlay::COLLECT_OPACITY {
                plan.collect.push(target);
            }
        }

        for overlay in desired {
            match registry.get(&overlay.target) {
                Some(entry) => {
                    // Revived entries pick up new geometry on the next pass
                    if !entry.is_fading_out() && entry.bounds != overlay.bounds {
                        plan.update.push(*overlay);
                    }
                }
                None if !allow_adds => plan.suppressed_adds += 1,
                None if plan.add.len() < max_adds => plan.add.push(*overlay),
                None => plan.deferred_adds += 1,
            }
        }

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.revive.is_empty()
            && self.remove.is_empty()
            && self.collect.is_empty()
            && self.update.is_empty()
            && self.add.is_empty()
    }
}

/// Counts of what one pass did. Logged at debug level after every pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileReport {
    pub overlays: usize,
    pub revived: usize,
    pub removed: usize,
    pub collected: usize,
    pub updated: usize,
    pub added: usize,
    pub failed_adds: usize,
    pub suppressed_adds: usize,
    pub deferred_adds: usize,
    pub transition: TransitionState,
    pub active_display: Option<DisplayIndex>,
    /// Overlays destroyed by this pass. The render thread drops their surfaces.
    pub released: Vec<OverlayId>,
}

impl FmtDisplay for ReconcileReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Overlays: {}, revived: {}, removed: {}, collected: {}, updated: {}, added: {}",
            self.overlays, self.revived, self.removed, self.collected, self.updated, self.added
        )?;
        if self.failed_adds > 0 {
            write!(f, " ({} failed)", self.failed_adds)?;
        }
        write!(
            f,
            ", suppressed: {}, deferred: {}, transition: {}, active display: ",
            self.suppressed_adds, self.deferred_adds, self.transition
        )?;
        match self.active_display {
            Some(index) => write!(f, "{index}"),
            None => write!(f, "none"),
        }
    }
}

/// Why a pass did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Reconfiguring,
    NoDisplays,
    WindowListFailed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    Skipped(SkipReason),
    Completed(ReconcileReport),
}

/// Applies `plan` in order: revive, remove, collect, update, add.
pub fn apply_plan(
    plan: ReconcilePlan,
    registry: &mut OverlayRegistry,
    overlays: &dyn PlatformOverlayImpl,
    transition: TransitionState,
    active_display: Option<DisplayIndex>,
    now: Instant,
) -> ReconcileReport {
    let mut report = ReconcileReport {
        overlays: 0,
        revived: 0,
        removed: 0,
        collected: 0,
        updated: 0,
        added: 0,
        failed_adds: 0,
        suppressed_adds: plan.suppressed_adds,
        deferred_adds: plan.deferred_adds,
        transition,
        active_display,
        released: Vec::new(),
    };

    for target in &plan.revive {
        if let Some(entry) = registry.get_mut(target) {
            entry.revive();
            report.revived += 1;
        }
    }

    for target in &plan.remove {
        if let Some(entry) = registry.get_mut(target) {
            entry.fade_out();
            report.removed += 1;
        }
    }

    for target in &plan.collect {
        if let Some(entry) = registry.remove(target) {
            destroy_entry(overlays, &entry);
            report.released.push(entry.id());
            report.collected += 1;
        }
    }

    for overlay in &plan.update {
        let Some(entry) = registry.get_mut(&overlay.target) else {
            continue;
        };
        match overlays.resize_surface(entry.surface, &overlay.bounds) {
            Ok(()) => {
                entry.bounds = overlay.bounds;
                entry.display = overlay.display;
                report.updated += 1;
            }
            Err(e) => warn!("Failed to resize overlay for {}: {e}", overlay.target),
        }
    }

    for overlay in &plan.add {
        let surface = match overlays.create_surface(&overlay.bounds, overlay.display) {
            Ok(surface) => surface,
            Err(e) => {
                // Usually the window closed between the listing and now
                debug!("Skipping overlay for {}: {e}", overlay.target);
                report.failed_adds += 1;
                continue;
            }
        };

        let id = registry.allocate_id();
        let entry = OverlayEntry::new(
            id,
            overlay.target,
            surface,
            overlay.bounds,
            overlay.display,
            now,
        );
        match registry.insert(entry) {
            Ok(()) => report.added += 1,
            Err(entry) => {
                warn!("Overlay for {} already exists", overlay.target);
                destroy_entry(overlays, &entry);
            }
        }
    }

    report.overlays = registry.len();
    report
}

pub(crate) fn destroy_entry(overlays: &dyn PlatformOverlayImpl, entry: &OverlayEntry) {
    if let Err(e) = overlays.destroy_surface(entry.surface) {
        warn!(
            "Failed to destroy overlay {} for {}: {e}",
            entry.id(),
            entry.target()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::FadeRates;
    use crate::platform::mock::{mock_display, mock_window, MockPlatform};

    const OWN_PID: ProcessId = 1;

    fn displays() -> Vec<Display> {
        vec![
            mock_display(1, Bounds::new(0.0, 0.0, 1920.0, 1080.0)),
            mock_display(2, Bounds::new(1920.0, 0.0, 1920.0, 1080.0)),
        ]
    }

    fn on_left(id: u64, pid: ProcessId) -> WindowRecord {
        mock_window(id, pid, "Editor", Bounds::new(100.0, 100.0, 800.0, 600.0))
    }

    fn on_right(id: u64, pid: ProcessId) -> WindowRecord {
        mock_window(id, pid, "Browser", Bounds::new(2000.0, 100.0, 800.0, 600.0))
    }

    fn desired(id: u64, bounds: Bounds) -> DesiredOverlay {
        DesiredOverlay {
            target: OverlayTarget::Window(id),
            bounds,
            display: None,
        }
    }

    fn insert(registry: &mut OverlayRegistry, id: u64, bounds: Bounds) {
        let overlay_id = registry.allocate_id();
        let entry = OverlayEntry::new(
            overlay_id,
            OverlayTarget::Window(id),
            overlay_id,
            bounds,
            None,
            Instant::now(),
        );
        registry.insert(entry).unwrap();
    }

    fn make_visible(registry: &mut OverlayRegistry, id: u64) {
        let entry = registry.get_mut(&OverlayTarget::Window(id)).unwrap();
        entry.advance_frame(Instant::now(), &FadeRates::new(1.0, 1.0));
    }

    // === Filter ===

    #[test]
    fn test_filter_rejections() {
        let filter = WindowFilter::new(&Config::default(), OWN_PID);
        let bounds = Bounds::new(0.0, 0.0, 300.0, 300.0);

        let mut window = mock_window(1, OWN_PID, "Vaporwave", bounds);
        assert_eq!(filter.rejection(&window), Some(RejectReason::OwnProcess));

        window.pid = 40;
        window.owner_name = "Dock".into();
        assert_eq!(filter.rejection(&window), Some(RejectReason::ExcludedApp));

        window.owner_name = "System Settings".into();
        assert_eq!(filter.rejection(&window), Some(RejectReason::Blacklisted));

        window.owner_name = "Editor".into();
        window.layer = 25;
        assert_eq!(filter.rejection(&window), Some(RejectReason::NotNormalLayer));

        window.layer = NORMAL_WINDOW_LAYER;
        window.bounds = Bounds::new(f64::NAN, 0.0, 300.0, 300.0);
        assert_eq!(filter.rejection(&window), Some(RejectReason::InvalidGeometry));

        window.bounds = Bounds::new(0.0, 0.0, 300.0, 49.0);
        assert_eq!(filter.rejection(&window), Some(RejectReason::TooSmall));

        window.bounds = Bounds::new(0.0, 0.0, 50.0, 50.0);
        assert!(filter.accepts(&window));
    }

    // === Active context ===

    #[test]
    fn test_active_display_from_first_frontmost_window() {
        let windows = vec![on_right(1, 10), on_left(2, 10), on_left(3, 20)];
        let context = ActiveContext::resolve(Some(10), &windows, &displays(), OWN_PID);
        assert_eq!(context.display, Some(1));

        let context = ActiveContext::resolve(Some(20), &windows, &displays(), OWN_PID);
        assert_eq!(context.display, Some(0));
    }

    #[test]
    fn test_active_display_skips_offscreen_frontmost_window() {
        let offscreen = mock_window(1, 10, "Palette", Bounds::new(-5000.0, 100.0, 400.0, 300.0));
        let windows = vec![offscreen, on_right(2, 10), on_right(3, 20)];
        let context = ActiveContext::resolve(Some(10), &windows, &displays(), OWN_PID);
        assert_eq!(context.display, Some(1));

        let targets = window_targets(
            &windows,
            &WindowFilter::new(&Config::default(), OWN_PID),
            &context,
            &displays(),
        );
        assert!(targets.is_empty());
    }

    #[test]
    fn test_active_display_skips_other_layers() {
        let mut menu = on_right(1, 10);
        menu.layer = 24;
        let windows = vec![menu, on_left(2, 10)];
        let context = ActiveContext::resolve(Some(10), &windows, &displays(), OWN_PID);
        assert_eq!(context.display, Some(0));
    }

    #[test]
    fn test_no_frontmost_means_no_active_display() {
        let windows = vec![on_left(1, 10)];
        let context = ActiveContext::resolve(None, &windows, &displays(), OWN_PID);
        assert_eq!(context, ActiveContext::default());
    }

    // === Targets ===

    #[test]
    fn test_targets_exclude_frontmost_and_active_display() {
        let filter = WindowFilter::new(&Config::default(), OWN_PID);
        // 10 is frontmost with a window on the left display
        let windows = vec![
            on_left(1, 10),
            on_right(2, 10),
            on_left(3, 20),
            on_right(4, 20),
        ];
        let context = ActiveContext::resolve(Some(10), &windows, &displays(), OWN_PID);
        let targets = window_targets(&windows, &filter, &context, &displays());

        let ids: Vec<_> = targets.iter().map(|t| t.target).collect();
        assert_eq!(ids, vec![OverlayTarget::Window(4)]);
        assert_eq!(targets[0].display, Some(1));
    }

    #[test]
    fn test_duplicate_window_ids_yield_one_target() {
        let filter = WindowFilter::new(&Config::default(), OWN_PID);
        let windows = vec![on_right(4, 20), on_right(4, 20)];
        let targets = window_targets(&windows, &filter, &ActiveContext::default(), &displays());
        assert_eq!(targets.len(), 1);
    }

    #[test]
    fn test_screen_targets_cover_each_display() {
        let targets = screen_targets(&displays());
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[1].target, OverlayTarget::Screen(1));
        assert_eq!(targets[1].bounds, displays()[1].bounds);
    }

    // === Plan ===

    #[test]
    fn test_plan_diff() {
        let bounds = Bounds::new(0.0, 0.0, 100.0, 100.0);
        let moved = Bounds::new(10.0, 0.0, 100.0, 100.0);
        let mut registry = OverlayRegistry::new();
        for id in 1..=4 {
            insert(&mut registry, id, bounds);
            make_visible(&mut registry, id);
        }
        // 3 is fading out but wanted again
        registry.get_mut(&OverlayTarget::Window(3)).unwrap().fade_out();

        let wanted = vec![
            desired(1, bounds),
            desired(2, moved),
            desired(3, bounds),
            desired(5, bounds),
        ];
        let plan = ReconcilePlan::compute(&registry, &wanted, true, 10);

        assert_eq!(plan.revive, vec![OverlayTarget::Window(3)]);
        assert_eq!(plan.remove, vec![OverlayTarget::Window(4)]);
        assert!(plan.collect.is_empty());
        assert_eq!(plan.update, vec![desired(2, moved)]);
        assert_eq!(plan.add, vec![desired(5, bounds)]);
    }

    #[test]
    fn test_plan_collects_only_faded_entries() {
        let bounds = Bounds::new(0.0, 0.0, 100.0, 100.0);
        let mut registry = OverlayRegistry::new();
        insert(&mut registry, 1, bounds);
        insert(&mut registry, 2, bounds);
        make_visible(&mut registry, 2);
        registry.get_mut(&OverlayTarget::Window(2)).unwrap().fade_out();

        let plan = ReconcilePlan::compute(&registry, &[], true, 10);
        // 1 never became visible, 2 is still at full opacity
        assert_eq!(plan.collect, vec![OverlayTarget::Window(1)]);
    }

    #[test]
    fn test_plan_respects_cooldown_and_cap() {
        let bounds = Bounds::new(0.0, 0.0, 100.0, 100.0);
        let registry = OverlayRegistry::new();
        let wanted: Vec<_> = (1..=15).map(|id| desired(id, bounds)).collect();

        let plan = ReconcilePlan::compute(&registry, &wanted, true, 10);
        assert_eq!(plan.add.len(), 10);
        assert_eq!(plan.deferred_adds, 5);

        let plan = ReconcilePlan::compute(&registry, &wanted, false, 10);
        assert!(plan.add.is_empty());
        assert_eq!(plan.suppressed_adds, 15);
    }

    // === Apply ===

    #[test]
    fn test_apply_creates_and_destroys_surfaces() {
        let platform = MockPlatform::dual_display();
        let bounds = Bounds::new(0.0, 0.0, 100.0, 100.0);
        let mut registry = OverlayRegistry::new();
        let now = Instant::now();

        let plan = ReconcilePlan::compute(&registry, &[desired(1, bounds)], true, 10);
        let report = apply_plan(plan, &mut registry, &platform, TransitionState::Idle, None, now);
        assert_eq!(report.added, 1);
        assert_eq!(platform.live_surfaces(), 1);

        let plan = ReconcilePlan::compute(&registry, &[], true, 10);
        let report = apply_plan(plan, &mut registry, &platform, TransitionState::Idle, None, now);
        assert_eq!(report.removed, 1);
        assert_eq!(report.collected, 1);
        assert_eq!(report.released, vec![1]);
        assert!(registry.is_empty());
        assert_eq!(platform.live_surfaces(), 0);
    }

    #[test]
    fn test_apply_skips_failed_surface() {
        let platform = MockPlatform::dual_display();
        let good = Bounds::new(0.0, 0.0, 100.0, 100.0);
        let gone = Bounds::new(500.0, 0.0, 100.0, 100.0);
        platform.state().failing_surface_bounds.push(gone);

        let mut registry = OverlayRegistry::new();
        let plan =
            ReconcilePlan::compute(&registry, &[desired(1, gone), desired(2, good)], true, 10);
        let report = apply_plan(
            plan,
            &mut registry,
            &platform,
            TransitionState::Idle,
            None,
            Instant::now(),
        );

        assert_eq!(report.added, 1);
        assert_eq!(report.failed_adds, 1);
        assert!(registry.contains(&OverlayTarget::Window(2)));
        assert!(!registry.contains(&OverlayTarget::Window(1)));
    }

    #[test]
    fn test_apply_resizes_surface() {
        let platform = MockPlatform::dual_display();
        let bounds = Bounds::new(0.0, 0.0, 100.0, 100.0);
        let moved = Bounds::new(40.0, 40.0, 300.0, 100.0);
        let mut registry = OverlayRegistry::new();
        let now = Instant::now();

        let plan = ReconcilePlan::compute(&registry, &[desired(1, bounds)], true, 10);
        apply_plan(plan, &mut registry, &platform, TransitionState::Idle, None, now);

        let plan = ReconcilePlan::compute(&registry, &[desired(1, moved)], true, 10);
        let report = apply_plan(plan, &mut registry, &platform, TransitionState::Idle, None, now);

        assert_eq!(report.updated, 1);
        let entry = registry.get(&OverlayTarget::Window(1)).unwrap();
        assert_eq!(entry.bounds, moved);
        assert_eq!(platform.surface(entry.surface).unwrap().bounds, moved);
        assert!(report.to_string().starts_with("Overlays: 1, revived: 0"));
    }
}
