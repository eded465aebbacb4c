use crate::platform::PlatformResult;
use crate::VaporwaveResult;
use log::trace;
use std::sync::OnceLock;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy};
use winit::window::WindowId;

#[allow(clippy::type_complexity)]
pub enum MainThreadMessage {
    RunOnMainThread {
        task: Box<dyn FnOnce(&ActiveEventLoop) + Send>,
    },
    Shutdown,
}

pub static EVENT_LOOP_PROXY: OnceLock<EventLoopProxy<MainThreadMessage>> = OnceLock::new();

/// Runs `f` on the main thread and waits for its result. Must not be called from the main thread.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
pub fn run_on_main_thread_blocking<F, R>(f: F) -> PlatformResult<R>
where
    F: FnOnce(&ActiveEventLoop) -> R + Send + 'static,
    R: Send + 'static,
{
    let proxy = EVENT_LOOP_PROXY
        .get()
        .ok_or("Event loop has not been started yet")?
        .clone();

    let (tx, rx) = std::sync::mpsc::channel();
    let task = Box::new(move |event_loop: &ActiveEventLoop| {
        let result = f(event_loop);
        let _ = tx.send(result);
    });

    proxy
        .send_event(MainThreadMessage::RunOnMainThread { task })
        .map_err(|_| "Event loop has already exited")?;
    rx.recv()
        .map_err(|_| "Main thread task was cancelled".into())
}

pub struct EventLoopMain {}

impl EventLoopMain {
    /// Runs the toolkit loop on the calling thread until [`EventLoopMain::shutdown`].
    /// `on_ready` is called once other threads can use [`run_on_main_thread_blocking`].
    pub fn run(on_ready: impl FnOnce()) -> VaporwaveResult<()> {
        let event_loop = Self::build()?;
        EVENT_LOOP_PROXY
            .set(event_loop.create_proxy())
            .map_err(|_| "Event loop proxy already initialized")?;
        event_loop.set_control_flow(ControlFlow::Wait);

        on_ready();

        let mut app = App::default();
        event_loop
            .run_app(&mut app)
            .map_err(|e| format!("Failed to run event loop: {e}"))?;
        Ok(())
    }

    #[cfg(target_os = "macos")]
    fn build() -> VaporwaveResult<EventLoop<MainThreadMessage>> {
        use winit::platform::macos::{ActivationPolicy, EventLoopBuilderExtMacOS};

        // No dock icon and no menu bar; overlays never take focus
        EventLoop::with_user_event()
            .with_activation_policy(ActivationPolicy::Accessory)
            .build()
            .map_err(|e| format!("Failed to create event loop: {e}").into())
    }

    #[cfg(not(target_os = "macos"))]
    fn build() -> VaporwaveResult<EventLoop<MainThreadMessage>> {
        EventLoop::with_user_event()
            .build()
            .map_err(|e| format!("Failed to create event loop: {e}").into())
    }

    pub fn shutdown() {
        if let Some(proxy) = EVENT_LOOP_PROXY.get() {
            let _ = proxy.send_event(MainThreadMessage::Shutdown);
        }
    }
}

#[derive(Default)]
struct App;

impl ApplicationHandler<MainThreadMessage> for App {
    fn resumed(&mut self, _event_loop: &ActiveEventLoop) {}

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: MainThreadMessage) {
        match event {
            MainThreadMessage::RunOnMainThread { task } => {
                task(event_loop);
            }
            MainThreadMessage::Shutdown => {
                trace!("Stopping main event loop");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, _event: WindowEvent) {
        // Overlays ignore input and are never closed by the user
    }
}
