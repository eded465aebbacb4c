use crate::overlay::OverlayId;
use crate::platform::{PixelBuffer, PlatformResult, ProcessId};
use tokio::sync::mpsc;

#[derive(Debug)]
pub enum EngineEvent {
    /// Displays were added, removed, moved or changed resolution.
    DisplaysReconfigured,
    /// The active space (virtual desktop) changed.
    ActiveSpaceChanged,
    /// An application was brought to the front.
    ApplicationActivated(ProcessId),
    /// A capture dispatched for `overlay` finished.
    CaptureCompleted {
        overlay: OverlayId,
        result: PlatformResult<PixelBuffer>,
    },
    /// The config file changed on disk and the current config was replaced.
    ConfigChanged,
    Shutdown,
}

pub struct EventBridge {
    sender: mpsc::UnboundedSender<EngineEvent>,
    receiver: mpsc::UnboundedReceiver<EngineEvent>,
    pending_event: Option<EngineEvent>,
}

impl EventBridge {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver,
            pending_event: None,
        }
    }

    pub fn dispatcher(&self) -> EventDispatcher {
        EventDispatcher::new(self.sender.clone())
    }

    pub async fn next_event(&mut self) -> Option<EngineEvent> {
        if let Some(event) = self.pending_event.take() {
            return Some(event);
        }

        let event = self.receiver.recv().await?;
        Some(self.coalesce(event))
    }

    pub fn try_next_event(&mut self) -> Option<EngineEvent> {
        if let Some(event) = self.pending_event.take() {
            return Some(event);
        }

        let event = self.receiver.try_recv().ok()?;
        Some(self.coalesce(event))
    }

    /// A reconfiguration usually arrives as a burst of notifications, one per display. Only one
    /// of them needs handling.
    fn coalesce(&mut self, event: EngineEvent) -> EngineEvent {
        if !matches!(event, EngineEvent::DisplaysReconfigured) {
            return event;
        }

        loop {
            match self.receiver.try_recv() {
                Ok(EngineEvent::DisplaysReconfigured) => {}
                Ok(other_event) => {
                    self.pending_event = Some(other_event);
                    break;
                }
                Err(_) => break,
            }
        }

        event
    }
}

impl Default for EventBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct EventDispatcher {
    sender: mpsc::UnboundedSender<EngineEvent>,
}

impl EventDispatcher {
    pub fn new(sender: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { sender }
    }

    pub fn send(&self, event: EngineEvent) {
        // If send fails, then the engine is shutting down.
        let _ = self.sender.send(event);
    }
}
