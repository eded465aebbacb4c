use crate::platform::macos::ffi::{window_info, WindowInfoDict};
use crate::platform::macos::MacOSPlatform;
use crate::platform::{
    Bounds, Display, PlatformImpl, PlatformResult, ProcessId, WindowId, WindowRecord,
};
use core_graphics::display::CGDisplay;
use core_graphics::geometry::CGRect;
use core_graphics::window::{
    copy_window_info, kCGNullWindowID, kCGWindowListExcludeDesktopElements,
    kCGWindowListOptionOnScreenOnly,
};
use objc2_app_kit::NSWorkspace;

impl PlatformImpl for MacOSPlatform {
    fn list_windows(&self) -> PlatformResult<Vec<WindowRecord>> {
        let window_info = copy_window_info(
            kCGWindowListOptionOnScreenOnly | kCGWindowListExcludeDesktopElements,
            kCGNullWindowID,
        )
        .ok_or("Could not get window info")?;

        Ok(WindowInfoDict::all(&window_info)
            .iter()
            .filter_map(window_record)
            .collect())
    }

    fn frontmost_process_id(&self) -> PlatformResult<Option<ProcessId>> {
        let pid = unsafe {
            NSWorkspace::sharedWorkspace()
                .frontmostApplication()
                .map(|app| app.processIdentifier())
        };
        // The window server reports 0 while nothing is frontmost
        Ok(pid.filter(|pid| *pid > 0).map(|pid| pid as ProcessId))
    }

    fn list_displays(&self) -> PlatformResult<Vec<Display>> {
        let ids = CGDisplay::active_displays()
            .map_err(|e| format!("Could not list displays: error {e}"))?;

        Ok(ids
            .into_iter()
            .map(|id| Display {
                id,
                name: format!("Display {id}"),
                bounds: bounds_from_rect(&CGDisplay::new(id).bounds()),
            })
            .collect())
    }
}

/// Windows without an id, owner pid or bounds are skipped; missing names and layers default.
fn window_record(window: &WindowInfoDict) -> Option<WindowRecord> {
    Some(WindowRecord {
        id: window.get_i64(window_info::number())? as WindowId,
        pid: window.get_i64(window_info::owner_pid())? as ProcessId,
        owner_name: window
            .get_string(window_info::owner_name())
            .unwrap_or_default(),
        title: window.get_string(window_info::name()).unwrap_or_default(),
        layer: window.get_i64(window_info::layer()).unwrap_or(0) as i32,
        bounds: bounds_from_rect(&window.get_rect(window_info::bounds())?),
    })
}

/// CoreGraphics window and display rects already use a top-left origin.
pub(super) fn bounds_from_rect(rect: &CGRect) -> Bounds {
    Bounds::new(
        rect.origin.x,
        rect.origin.y,
        rect.size.width,
        rect.size.height,
    )
}
