use crate::overlay::OverlayId;
use crate::platform::{CaptureTarget, EngineEvent, EventDispatcher, PlatformCaptureImpl, Size};
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureRequest {
    pub overlay: OverlayId,
    pub target: CaptureTarget,
    pub size: Size,
}

/// Runs captures on blocking workers and posts the results back to the engine loop.
#[derive(Clone)]
pub struct CaptureDispatcher {
    capture: Arc<dyn PlatformCaptureImpl>,
    events: EventDispatcher,
}

impl CaptureDispatcher {
    pub fn new(capture: Arc<dyn PlatformCaptureImpl>, events: EventDispatcher) -> Self {
        Self { capture, events }
    }

    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, request: CaptureRequest) -> JoinHandle<()> {
        let capture = self.capture.clone();
        let events = self.events.clone();

        // No timeout: a capture that never returns keeps its overlay's in-flight flag set.
        tokio::task::spawn_blocking(move || {
            let result = capture.capture(request.target, request.size);
            events.send(EngineEvent::CaptureCompleted {
                overlay: request.overlay,
                result,
            });
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::{mock_window, MockCaptureMode, MockPlatform};
    use crate::platform::{Bounds, EventBridge};

    #[tokio::test]
    async fn test_capture_result_comes_back_as_event() {
        let platform = Arc::new(MockPlatform::dual_display());
        platform.add_window(mock_window(4, 20, "Editor", Bounds::new(0.0, 0.0, 200.0, 100.0)));

        let mut bridge = EventBridge::new();
        let dispatcher = CaptureDispatcher::new(platform.clone(), bridge.dispatcher());

        dispatcher
            .dispatch(CaptureRequest {
                overlay: 11,
                target: CaptureTarget::Window(4),
                size: Size::new(200.0, 100.0),
            })
            .await
            .unwrap();

        match bridge.next_event().await {
            Some(EngineEvent::CaptureCompleted { overlay, result }) => {
                assert_eq!(overlay, 11);
                assert!(result.is_ok());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_capture_failure_is_delivered() {
        let platform = Arc::new(MockPlatform::dual_display());
        platform.set_capture_mode(MockCaptureMode::Fail);

        let mut bridge = EventBridge::new();
        let dispatcher = CaptureDispatcher::new(platform.clone(), bridge.dispatcher());

        dispatcher
            .dispatch(CaptureRequest {
                overlay: 2,
                target: CaptureTarget::Screen(1),
                size: Size::new(1920.0, 1080.0),
            })
            .await
            .unwrap();

        assert!(matches!(
            bridge.next_event().await,
            Some(EngineEvent::CaptureCompleted {
                overlay: 2,
                result: Err(_)
            })
        ));
    }
}
