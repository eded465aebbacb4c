use std::sync::Arc;
use std::time::{Duration, Instant};
use vaporwave_core::engine::OverlayEngine;
use vaporwave_core::overlay::OverlayTarget;
use vaporwave_core::platform::mock::{mock_display, mock_window, MockPlatform};
use vaporwave_core::platform::{Bounds, EngineEvent, PlatformServices, ProcessId};
use vaporwave_core::reconcile::{PassOutcome, ReconcileReport, SkipReason};
use vaporwave_core::Config;

const TERMINAL: ProcessId = 10;
const BROWSER: ProcessId = 20;
const NOTES: ProcessId = 30;

const FRAME: Duration = Duration::from_millis(200);

/// Instant fade-in and a one second fade-out at the default 5 fps.
fn config() -> Config {
    Config {
        fade_in_ms: 0,
        ..Config::default()
    }
}

/// Terminal on display 0, Browser on display 1, Terminal focused.
fn desktop(config: &Config) -> (Arc<MockPlatform>, OverlayEngine) {
    let platform = Arc::new(MockPlatform::dual_display());
    platform.add_window(mock_window(
        1,
        TERMINAL,
        "Terminal",
        Bounds::new(100.0, 100.0, 800.0, 600.0),
    ));
    platform.add_window(mock_window(
        2,
        BROWSER,
        "Browser",
        Bounds::new(2000.0, 100.0, 800.0, 600.0),
    ));
    platform.set_frontmost(Some(TERMINAL));

    let engine = OverlayEngine::new(PlatformServices::from_backend(platform.clone()), config);
    (platform, engine)
}

fn completed(outcome: PassOutcome) -> ReconcileReport {
    match outcome {
        PassOutcome::Completed(report) => report,
        other => panic!("pass did not complete: {other:?}"),
    }
}

fn id_of(engine: &OverlayEngine, window: u64) -> u64 {
    engine
        .registry()
        .get(&OverlayTarget::Window(window))
        .map(|entry| entry.id())
        .unwrap_or_else(|| panic!("no overlay for window {window}"))
}

/// Steps frames every `FRAME` from `start` for `count` frames. Returns the instant after the last.
fn run_frames(engine: &mut OverlayEngine, start: Instant, count: u32) -> Instant {
    let mut now = start;
    for _ in 0..count {
        engine.frame(now);
        now += FRAME;
    }
    now
}

fn assert_nothing_on_active_display(engine: &OverlayEngine, report: &ReconcileReport) {
    let Some(active) = report.active_display else {
        return;
    };
    for entry in engine.registry().iter().filter(|e| !e.is_fading_out()) {
        assert_ne!(entry.display, Some(active), "{} is on the active display", entry.target());
    }
}

// === Focus ===

#[test]
fn test_window_on_other_display_gets_overlay() {
    let config = config();
    let (_platform, mut engine) = desktop(&config);
    let now = Instant::now();

    let report = completed(engine.reconcile(now));
    assert_eq!(report.active_display, Some(0));
    assert_eq!(report.added, 1);
    assert_nothing_on_active_display(&engine, &report);

    let entry = engine.registry().get(&OverlayTarget::Window(2)).unwrap();
    assert_eq!(entry.fade.target(), 1.0);
    assert!(!engine.registry().contains(&OverlayTarget::Window(1)));
}

#[test]
fn test_focus_move_collects_old_overlays_and_adds_new_ones() {
    let config = config();
    let (platform, mut engine) = desktop(&config);
    platform.add_window(mock_window(
        3,
        NOTES,
        "Notes",
        Bounds::new(300.0, 200.0, 600.0, 400.0),
    ));
    let start = Instant::now();
    engine.reconcile(start);
    let browser_overlay = id_of(&engine, 2);
    run_frames(&mut engine, start, 1);

    // Focus moves to the Browser on display 1
    let focus = start + Duration::from_secs(1);
    platform.set_frontmost(Some(BROWSER));
    engine.handle_event(EngineEvent::ApplicationActivated(BROWSER), focus);
    assert!(engine.registry().iter().all(|e| e.is_fading_out()));

    // The settle pass sees the new layout but the cooldown holds back new overlays
    let report = completed(engine.advance_transitions(focus + FRAME).unwrap());
    assert_eq!(report.active_display, Some(1));
    assert_eq!(report.suppressed_adds, 2);
    assert_eq!(report.collected, 0);

    // Five frames of fade-out take the old overlay to zero
    let later = run_frames(&mut engine, focus + FRAME, 5);
    let entry = engine.registry().get(&OverlayTarget::Window(2)).unwrap();
    assert_eq!(entry.opacity(), 0.0);

    let report = completed(engine.reconcile(later));
    assert_eq!(report.collected, 1);
    assert_eq!(report.added, 2);
    assert_nothing_on_active_display(&engine, &report);
    assert!(!engine.registry().contains(&OverlayTarget::Window(2)));
    assert!(engine.registry().contains(&OverlayTarget::Window(1)));
    assert!(engine.registry().contains(&OverlayTarget::Window(3)));

    assert_eq!(engine.take_released(), vec![browser_overlay]);
    assert_eq!(platform.live_surfaces(), 2);
}

#[test]
fn test_quick_focus_return_revives_same_overlay() {
    let config = config();
    let (platform, mut engine) = desktop(&config);
    let start = Instant::now();
    engine.reconcile(start);
    let id = id_of(&engine, 2);
    run_frames(&mut engine, start, 1);

    let away = start + Duration::from_secs(1);
    platform.set_frontmost(Some(BROWSER));
    engine.handle_event(EngineEvent::ApplicationActivated(BROWSER), away);

    let back = away + Duration::from_millis(100);
    platform.set_frontmost(Some(TERMINAL));
    engine.handle_event(EngineEvent::ApplicationActivated(TERMINAL), back);

    // The second activation pushed the settle deadline out
    assert!(engine.advance_transitions(away + FRAME).is_none());
    let report = completed(engine.advance_transitions(back + FRAME).unwrap());
    assert_eq!(report.revived, 1);

    let entry = engine.registry().get(&OverlayTarget::Window(2)).unwrap();
    assert_eq!(entry.id(), id);
    assert!(!entry.is_fading_out());
    assert_eq!(entry.fade.target(), 1.0);
}

// === Window lifecycle ===

#[test]
fn test_moved_window_keeps_overlay_and_resizes_surface() {
    let config = config();
    let (platform, mut engine) = desktop(&config);
    let now = Instant::now();
    engine.reconcile(now);
    let id = id_of(&engine, 2);

    let moved = Bounds::new(2400.0, 300.0, 640.0, 480.0);
    platform.move_window(2, moved);
    let report = completed(engine.reconcile(now + Duration::from_secs(1)));
    assert_eq!(report.updated, 1);
    assert_eq!(report.added, 0);

    let entry = engine.registry().get(&OverlayTarget::Window(2)).unwrap();
    assert_eq!(entry.id(), id);
    assert_eq!(entry.bounds, moved);
    assert_eq!(platform.surface(entry.surface).unwrap().bounds, moved);
}

#[test]
fn test_closed_window_fades_then_is_collected() {
    let config = config();
    let (platform, mut engine) = desktop(&config);
    let start = Instant::now();
    engine.reconcile(start);
    let after_first = run_frames(&mut engine, start, 1);

    platform.remove_window(2);
    let report = completed(engine.reconcile(after_first));
    assert_eq!(report.removed, 1);
    assert_eq!(report.collected, 0);
    assert!(engine.registry().get(&OverlayTarget::Window(2)).unwrap().is_fading_out());

    let later = run_frames(&mut engine, after_first, 5);
    let report = completed(engine.reconcile(later));
    assert_eq!(report.collected, 1);
    assert!(engine.registry().is_empty());
    assert_eq!(platform.live_surfaces(), 0);
}

#[test]
fn test_never_visible_overlay_is_collected_in_same_pass() {
    let config = config();
    let (platform, mut engine) = desktop(&config);
    let now = Instant::now();
    engine.reconcile(now);

    platform.remove_window(2);
    let report = completed(engine.reconcile(now + Duration::from_secs(1)));
    assert_eq!(report.removed, 1);
    assert_eq!(report.collected, 1);
    assert!(engine.registry().is_empty());
}

#[test]
fn test_vanished_window_is_skipped_for_the_pass() {
    let config = config();
    let (platform, mut engine) = desktop(&config);
    platform
        .state()
        .failing_surface_bounds
        .push(Bounds::new(2000.0, 100.0, 800.0, 600.0));

    let report = completed(engine.reconcile(Instant::now()));
    assert_eq!(report.added, 0);
    assert_eq!(report.failed_adds, 1);
    assert!(engine.registry().is_empty());
}

#[test]
fn test_add_limit_defers_to_later_passes() {
    let config = Config {
        max_new_overlays_per_pass: 2,
        ..config()
    };
    let (platform, mut engine) = desktop(&config);
    for id in 10..15 {
        platform.add_window(mock_window(
            id,
            100 + id as ProcessId,
            "Viewer",
            Bounds::new(2000.0 + id as f64 * 20.0, 200.0, 400.0, 300.0),
        ));
    }
    let now = Instant::now();

    let report = completed(engine.reconcile(now));
    assert_eq!(report.added, 2);
    assert_eq!(report.deferred_adds, 4);

    completed(engine.reconcile(now + Duration::from_secs(1)));
    completed(engine.reconcile(now + Duration::from_secs(2)));
    assert_eq!(engine.registry().len(), 6);
}

// === Displays ===

#[test]
fn test_display_unplug_rebuilds_from_fresh_enumeration() {
    let config = config();
    let (platform, mut engine) = desktop(&config);
    platform.set_frontmost(None);
    let start = Instant::now();
    engine.reconcile(start);
    let old_ids = vec![id_of(&engine, 1), id_of(&engine, 2)];
    assert_eq!(platform.live_surfaces(), 2);

    // The second display goes away and its window lands on the first one
    let unplug = start + Duration::from_secs(1);
    platform.set_displays(vec![mock_display(1, Bounds::new(0.0, 0.0, 1920.0, 1080.0))]);
    platform.move_window(2, Bounds::new(500.0, 300.0, 800.0, 600.0));
    engine.handle_event(EngineEvent::DisplaysReconfigured, unplug);
    assert!(engine.registry().iter().all(|e| e.is_fading_out()));

    // Periodic passes are skipped while displays settle
    assert_eq!(
        engine.reconcile(unplug + Duration::from_millis(700)),
        PassOutcome::Skipped(SkipReason::Reconfiguring)
    );
    assert!(engine
        .advance_transitions(unplug + Duration::from_millis(1499))
        .is_none());

    let report = completed(
        engine
            .advance_transitions(unplug + Duration::from_millis(1500))
            .unwrap(),
    );
    assert_eq!(report.added, 2);
    assert_eq!(platform.live_surfaces(), 2);
    assert_eq!(engine.take_released(), old_ids);

    let entry = engine.registry().get(&OverlayTarget::Window(2)).unwrap();
    assert!(!old_ids.contains(&entry.id()));
    assert_eq!(entry.display, Some(0));
}

#[test]
fn test_reconfiguration_burst_restarts_settle_delay() {
    let config = config();
    let (_platform, mut engine) = desktop(&config);
    let start = Instant::now();
    engine.reconcile(start);

    engine.handle_event(EngineEvent::DisplaysReconfigured, start);
    let second = start + Duration::from_secs(1);
    engine.handle_event(EngineEvent::DisplaysReconfigured, second);

    assert!(engine
        .advance_transitions(start + Duration::from_millis(1500))
        .is_none());
    assert!(engine
        .advance_transitions(second + Duration::from_millis(1500))
        .is_some());
}

#[test]
fn test_fullscreen_rebuilds_screen_overlays() {
    let config = Config {
        fullscreen: true,
        ..config()
    };
    let (platform, mut engine) = desktop(&config);
    assert!(engine.is_fullscreen());
    let start = Instant::now();

    let report = completed(engine.reconcile(start));
    assert_eq!(report.added, 2);

    let unplug = start + Duration::from_secs(1);
    platform.set_displays(vec![mock_display(1, Bounds::new(0.0, 0.0, 1920.0, 1080.0))]);
    engine.handle_event(EngineEvent::DisplaysReconfigured, unplug);
    engine.advance_transitions(unplug + Duration::from_millis(1500));

    assert_eq!(engine.registry().len(), 1);
    assert!(engine.registry().contains(&OverlayTarget::Screen(0)));
    assert_eq!(platform.live_surfaces(), 1);
}
