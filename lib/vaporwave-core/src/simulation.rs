//! A scripted desktop for running the whole pipeline without a window server.
//!
//! Two side-by-side displays with a handful of application windows. Every tick advances a fixed
//! script: focus alternates between the displays, a window opens and later closes, one window
//! drifts across its display, the space changes now and then, and the display arrangement is
//! periodically reconfigured.

use crate::platform::mock::{mock_display, mock_window, MockPlatform};
use crate::platform::{Bounds, Display, EngineEvent, ProcessId, WindowId};
use log::{debug, trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub const TICK: Duration = Duration::from_millis(500);

const FOCUS_EVERY: u64 = 10;
const WINDOW_CYCLE: u64 = 16;
const WINDOW_OPENS_AT: u64 = 6;
const WINDOW_CLOSES_AT: u64 = 14;
const DRIFT_EVERY: u64 = 4;
const SPACE_EVERY: u64 = 44;
const RECONFIGURE_EVERY: u64 = 60;

const TERMINAL_PID: ProcessId = 100;
const BROWSER_PID: ProcessId = 200;
const MUSIC_PID: ProcessId = 201;
const NOTES_PID: ProcessId = 300;
const DOCK_PID: ProcessId = 50;

const NOTES_WINDOW: WindowId = 30;
const MUSIC_WINDOW: WindowId = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedChange {
    Focus(ProcessId),
    WindowOpened(WindowId),
    WindowClosed(WindowId),
    WindowMoved(WindowId),
    SpaceChanged,
    DisplaysReconfigured,
}

pub struct Simulation {
    platform: Arc<MockPlatform>,
    tick: u64,
    /// Whether the displays are currently stacked vertically rather than side by side.
    stacked: bool,
}

impl Simulation {
    /// Seeds `platform` with the starting desktop. Terminal on the left display has focus.
    pub fn new(platform: Arc<MockPlatform>) -> Self {
        platform.set_displays(arrangement(side_by_side_origin()));
        platform.add_window(mock_window(
            10,
            TERMINAL_PID,
            "Terminal",
            Bounds::new(80.0, 120.0, 900.0, 600.0),
        ));
        platform.add_window(mock_window(
            11,
            101,
            "Editor",
            Bounds::new(700.0, 200.0, 1100.0, 800.0),
        ));
        platform.add_window(mock_window(
            20,
            BROWSER_PID,
            "Browser",
            Bounds::new(2000.0, 60.0, 1400.0, 900.0),
        ));
        platform.add_window(mock_window(
            MUSIC_WINDOW,
            MUSIC_PID,
            "Music",
            Bounds::new(3300.0, 700.0, 420.0, 300.0),
        ));
        // Never gets an overlay
        platform.add_window(mock_window(
            1,
            DOCK_PID,
            "Dock",
            Bounds::new(0.0, 1000.0, 3840.0, 80.0),
        ));
        platform.set_frontmost(Some(TERMINAL_PID));

        Self {
            platform,
            tick: 0,
            stacked: false,
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Advances the script by one tick, applies the changes to the desktop and emits the
    /// notifications a real window server would post for them.
    pub fn step(&mut self) -> Vec<ScriptedChange> {
        self.tick += 1;
        let tick = self.tick;
        let mut changes = Vec::new();

        if tick % FOCUS_EVERY == 0 {
            let pid = if (tick / FOCUS_EVERY) % 2 == 1 {
                BROWSER_PID
            } else {
                TERMINAL_PID
            };
            self.platform.set_frontmost(Some(pid));
            self.platform.emit(EngineEvent::ApplicationActivated(pid));
            changes.push(ScriptedChange::Focus(pid));
        }

        match tick % WINDOW_CYCLE {
            WINDOW_OPENS_AT => {
                self.platform.add_window(mock_window(
                    NOTES_WINDOW,
                    NOTES_PID,
                    "Notes",
                    self.notes_bounds(),
                ));
                changes.push(ScriptedChange::WindowOpened(NOTES_WINDOW));
            }
            WINDOW_CLOSES_AT => {
                self.platform.remove_window(NOTES_WINDOW);
                changes.push(ScriptedChange::WindowClosed(NOTES_WINDOW));
            }
            _ => {}
        }

        if tick % DRIFT_EVERY == 0 {
            let offset = ((tick / DRIFT_EVERY) % 8) as f64 * 40.0;
            let origin = self.right_display_origin();
            self.platform.move_window(
                MUSIC_WINDOW,
                Bounds::new(origin.0 + 1200.0 - offset, origin.1 + 600.0, 420.0, 300.0),
            );
            changes.push(ScriptedChange::WindowMoved(MUSIC_WINDOW));
        }

        if tick % SPACE_EVERY == 0 {
            self.platform.emit(EngineEvent::ActiveSpaceChanged);
            changes.push(ScriptedChange::SpaceChanged);
        }

        if tick % RECONFIGURE_EVERY == 0 {
            self.reconfigure();
            changes.push(ScriptedChange::DisplaysReconfigured);
        }

        for change in &changes {
            trace!("Simulation tick {tick}: {change:?}");
        }
        changes
    }

    /// Runs the script on its own thread, one step per [`TICK`], until `shutdown` is set.
    pub fn spawn(mut self, shutdown: Arc<AtomicBool>) -> std::io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("vaporwave-simulation".into())
            .spawn(move || {
                debug!("Simulated desktop running");
                while !shutdown.load(Ordering::SeqCst) {
                    thread::sleep(TICK);
                    self.step();
                }
                debug!("Simulated desktop stopped after {} ticks", self.tick);
            })
    }

    /// Moves the right display below the left one (or back) and relocates its windows.
    fn reconfigure(&mut self) {
        let (from, to) = if self.stacked {
            (stacked_origin(), side_by_side_origin())
        } else {
            (side_by_side_origin(), stacked_origin())
        };
        self.stacked = !self.stacked;

        {
            let mut state = self.platform.state();
            for window in state.windows.iter_mut() {
                if window.pid == DOCK_PID {
                    continue;
                }
                if window.bounds.position.x >= from.0 && window.bounds.position.y >= from.1 {
                    window.bounds.position.x += to.0 - from.0;
                    window.bounds.position.y += to.1 - from.1;
                }
            }
        }

        self.platform.set_displays(arrangement(to));
        // One notification per display, as the window server does
        self.platform.emit(EngineEvent::DisplaysReconfigured);
        self.platform.emit(EngineEvent::DisplaysReconfigured);
    }

    fn right_display_origin(&self) -> (f64, f64) {
        if self.stacked {
            stacked_origin()
        } else {
            side_by_side_origin()
        }
    }

    fn notes_bounds(&self) -> Bounds {
        let origin = self.right_display_origin();
        Bounds::new(origin.0 + 300.0, origin.1 + 400.0, 600.0, 500.0)
    }
}

fn side_by_side_origin() -> (f64, f64) {
    (1920.0, 0.0)
}

fn stacked_origin() -> (f64, f64) {
    (0.0, 1080.0)
}

/// The left display stays at the origin; the second one sits at `origin`.
fn arrangement((x, y): (f64, f64)) -> Vec<Display> {
    vec![
        mock_display(1, Bounds::new(0.0, 0.0, 1920.0, 1080.0)),
        mock_display(2, Bounds::new(x, y, 1920.0, 1080.0)),
    ]
}
