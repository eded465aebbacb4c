//! An in-memory desktop. Backs the unit and integration tests and the `--simulate` mode.

use crate::platform::{
    Bounds, CaptureTarget, Display, DisplayIndex, EngineEvent, EventDispatcher, PixelBuffer,
    PlatformCaptureImpl, PlatformEventsImpl, PlatformImpl, PlatformOverlayImpl, PlatformResult,
    ProcessId, Size, SurfaceId, WindowId, WindowRecord, NORMAL_WINDOW_LAYER,
};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockCaptureMode {
    /// Every capture succeeds with a solid BGRA color.
    Solid([u8; 4]),
    Fail,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockSurface {
    pub bounds: Bounds,
    pub display: Option<DisplayIndex>,
    pub presented: usize,
    pub last_frame_transparent: Option<bool>,
}

pub struct MockState {
    pub windows: Vec<WindowRecord>,
    pub displays: Vec<Display>,
    pub frontmost: Option<ProcessId>,
    pub own_pid: ProcessId,
    pub surfaces: HashMap<SurfaceId, MockSurface>,
    pub created_surfaces: usize,
    pub destroyed_surfaces: usize,
    pub resized_surfaces: usize,
    pub capture_mode: MockCaptureMode,
    pub capture_calls: usize,
    pub list_windows_fails: bool,
    /// Surface creation fails for these bounds, as if the window vanished mid-pass.
    pub failing_surface_bounds: Vec<Bounds>,
    next_surface: SurfaceId,
    dispatcher: Option<EventDispatcher>,
}

pub struct MockPlatform {
    state: Mutex<MockState>,
}

impl MockPlatform {
    pub fn new(displays: Vec<Display>) -> Self {
        Self {
            state: Mutex::new(MockState {
                windows: Vec::new(),
                displays,
                frontmost: None,
                own_pid: 1,
                surfaces: HashMap::new(),
                created_surfaces: 0,
                destroyed_surfaces: 0,
                resized_surfaces: 0,
                capture_mode: MockCaptureMode::Solid([180, 40, 200, 255]),
                capture_calls: 0,
                list_windows_fails: false,
                failing_surface_bounds: Vec::new(),
                next_surface: 1,
                dispatcher: None,
            }),
        }
    }

    /// Two 1920x1080 displays side by side.
    pub fn dual_display() -> Self {
        Self::new(vec![
            mock_display(1, Bounds::new(0.0, 0.0, 1920.0, 1080.0)),
            mock_display(2, Bounds::new(1920.0, 0.0, 1920.0, 1080.0)),
        ])
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        // A panic while holding the lock only happens inside a failing test.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_window(&self, window: WindowRecord) {
        let mut state = self.state();
        state.windows.retain(|w| w.id != window.id);
        state.windows.push(window);
    }

    pub fn remove_window(&self, id: WindowId) {
        self.state().windows.retain(|w| w.id != id);
    }

    pub fn move_window(&self, id: WindowId, bounds: Bounds) {
        if let Some(window) = self.state().windows.iter_mut().find(|w| w.id == id) {
            window.bounds = bounds;
        }
    }

    pub fn set_frontmost(&self, pid: Option<ProcessId>) {
        self.state().frontmost = pid;
    }

    pub fn set_displays(&self, displays: Vec<Display>) {
        self.state().displays = displays;
    }

    pub fn set_capture_mode(&self, mode: MockCaptureMode) {
        self.state().capture_mode = mode;
    }

    pub fn live_surfaces(&self) -> usize {
        self.state().surfaces.len()
    }

    pub fn surface(&self, id: SurfaceId) -> Option<MockSurface> {
        self.state().surfaces.get(&id).cloned()
    }

    /// Sends an event as if the OS had posted it. Does nothing before `start`.
    pub fn emit(&self, event: EngineEvent) {
        let dispatcher = self.state().dispatcher.clone();
        if let Some(dispatcher) = dispatcher {
            dispatcher.send(event);
        }
    }
}

pub fn mock_display(id: u32, bounds: Bounds) -> Display {
    Display {
        id,
        name: format!("Mock Display {id}"),
        bounds,
    }
}

pub fn mock_window(id: WindowId, pid: ProcessId, owner_name: &str, bounds: Bounds) -> WindowRecord {
    WindowRecord {
        id,
        bounds,
        pid,
        title: format!("{owner_name} window {id}"),
        owner_name: owner_name.to_string(),
        layer: NORMAL_WINDOW_LAYER,
    }
}

impl PlatformImpl for MockPlatform {
    fn list_windows(&self) -> PlatformResult<Vec<WindowRecord>> {
        let state = self.state();
        if state.list_windows_fails {
            return Err("Window server unavailable".into());
        }
        Ok(state.windows.clone())
    }

    fn frontmost_process_id(&self) -> PlatformResult<Option<ProcessId>> {
        Ok(self.state().frontmost)
    }

    fn list_displays(&self) -> PlatformResult<Vec<Display>> {
        Ok(self.state().displays.clone())
    }

    fn current_process_id(&self) -> ProcessId {
        self.state().own_pid
    }
}

impl PlatformOverlayImpl for MockPlatform {
    fn create_surface(
        &self,
        bounds: &Bounds,
        display: Option<DisplayIndex>,
    ) -> PlatformResult<SurfaceId> {
        let mut state = self.state();
        if state.failing_surface_bounds.contains(bounds) {
            return Err("Target window is gone".into());
        }

        let id = state.next_surface;
        state.next_surface += 1;
        state.created_surfaces += 1;
        state.surfaces.insert(
            id,
            MockSurface {
                bounds: *bounds,
                display,
                presented: 0,
                last_frame_transparent: None,
            },
        );
        Ok(id)
    }

    fn resize_surface(&self, surface: SurfaceId, bounds: &Bounds) -> PlatformResult<()> {
        let mut state = self.state();
        let entry = state
            .surfaces
            .get_mut(&surface)
            .ok_or_else(|| format!("Unknown surface {surface}"))?;
        entry.bounds = *bounds;
        state.resized_surfaces += 1;
        Ok(())
    }

    fn destroy_surface(&self, surface: SurfaceId) -> PlatformResult<()> {
        let mut state = self.state();
        state
            .surfaces
            .remove(&surface)
            .ok_or_else(|| format!("Unknown surface {surface}"))?;
        state.destroyed_surfaces += 1;
        Ok(())
    }

    fn present(&self, surface: SurfaceId, frame: &PixelBuffer) -> PlatformResult<()> {
        let mut state = self.state();
        let entry = state
            .surfaces
            .get_mut(&surface)
            .ok_or_else(|| format!("Unknown surface {surface}"))?;
        entry.presented += 1;
        entry.last_frame_transparent = Some(frame.is_fully_transparent());
        Ok(())
    }
}

impl PlatformCaptureImpl for MockPlatform {
    fn capture(&self, target: CaptureTarget, size: Size) -> PlatformResult<PixelBuffer> {
        let mut state = self.state();
        state.capture_calls += 1;

        let exists = match target {
            CaptureTarget::Window(id) => state.windows.iter().any(|w| w.id == id),
            CaptureTarget::Screen(index) => index < state.displays.len(),
        };
        if !exists {
            return Err(format!("Capture target {target:?} no longer exists").into());
        }

        match state.capture_mode {
            MockCaptureMode::Solid(color) => {
                // Captures are scaled down, the effect only needs a rough image
                let (width, height) = size.to_pixels();
                Ok(PixelBuffer::filled(width.min(64), height.min(64), color))
            }
            MockCaptureMode::Fail => Err("Screen recording permission denied".into()),
        }
    }
}

impl PlatformEventsImpl for MockPlatform {
    fn start(&self, dispatcher: EventDispatcher) -> PlatformResult<()> {
        self.state().dispatcher = Some(dispatcher);
        Ok(())
    }
}
