use crate::event_loop_engine::EngineLoop;
use crate::event_loop_main::EventLoopMain;
use crate::platform::mock::MockPlatform;
use crate::platform::{EngineEvent, EventBridge, EventDispatcher, PlatformError, PlatformServices};
use crate::render::{RenderError, RenderHandle, RenderPipeline};
use crate::simulation::Simulation;
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, OnceLock};
use std::thread;
use std::time::Duration;
use thiserror::Error;

pub mod config;
pub mod engine;
pub mod event_loop_engine;
mod event_loop_main;
pub mod overlay;
pub mod paths;
pub mod platform;
pub mod reconcile;
pub mod render;
pub mod simulation;
pub mod transition;

pub use config::{Config, ConfigError};
pub use engine::OverlayEngine;

/// Blocking captures still running at exit get this long before the runtime is torn down.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

static DISPATCHER: OnceLock<EventDispatcher> = OnceLock::new();

pub fn version() -> &'static str {
    option_env!("VERSION").unwrap_or("v0.0.0-dev")
}

/// Where the desktop comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Native,
    Simulated,
}

/// Tells a running engine that [`Config::current`] was replaced. Does nothing before `start`.
pub fn notify_config_changed() {
    if let Some(dispatcher) = DISPATCHER.get() {
        dispatcher.send(EngineEvent::ConfigChanged);
    }
}

/// Validates the config and compiles its render pipeline without touching the desktop.
pub fn check(config: &Config) -> VaporwaveResult<()> {
    config.validate()?;
    RenderPipeline::from_config(config)?;
    Ok(())
}

pub fn start_with_config(
    shutdown: Arc<AtomicBool>,
    config: Config,
    backend: Backend,
) -> VaporwaveResult<()> {
    Config::set_config(config);
    start(shutdown, backend)
}

/// Runs until `shutdown` is set or the platform asks us to quit. Blocks the calling thread,
/// which must be the main thread when the native backend needs a toolkit loop.
pub fn start(shutdown: Arc<AtomicBool>, backend: Backend) -> VaporwaveResult<()> {
    let config = Config::current().clone();
    config.validate()?;

    let (services, simulated) = match backend {
        Backend::Native => (PlatformServices::native()?, None),
        Backend::Simulated => {
            let platform = Arc::new(MockPlatform::dual_display());
            (PlatformServices::from_backend(platform.clone()), Some(platform))
        }
    };

    // A broken effect must stop us before any surface exists
    let renderer = RenderHandle::spawn(&config, services.overlays.clone())?;
    info!("Render pipeline ready");

    let bridge = EventBridge::new();
    let dispatcher = bridge.dispatcher();
    let _ = DISPATCHER.set(dispatcher.clone());
    services.events.start(dispatcher)?;

    let simulation_thread = match simulated {
        Some(platform) => Some(
            Simulation::new(platform)
                .spawn(shutdown.clone())
                .map_err(|e| format!("Failed to start simulation: {e}"))?,
        ),
        None => None,
    };

    let uses_main_loop = services.events.requires_main_loop();
    let (main_ready_tx, main_ready_rx) = mpsc::channel();

    let shutdown_engine = shutdown.clone();
    let engine_thread = thread::Builder::new()
        .name("vaporwave-engine".into())
        .spawn(move || {
            let result = run_engine(
                uses_main_loop.then_some(main_ready_rx),
                bridge,
                services,
                renderer,
                shutdown_engine,
            );
            if uses_main_loop {
                EventLoopMain::shutdown();
            }
            result
        })
        .map_err(|e| format!("Failed to start engine thread: {e}"))?;

    if uses_main_loop {
        EventLoopMain::run(move || {
            let _ = main_ready_tx.send(());
        })?;
        // The loop can also end because the platform quit us
        shutdown.store(true, Ordering::SeqCst);
    }

    let result = engine_thread
        .join()
        .map_err(|_| VaporwaveFatalError::from("Engine thread panicked"))?;

    shutdown.store(true, Ordering::SeqCst);
    if let Some(thread) = simulation_thread {
        let _ = thread.join();
    }

    debug!("Engine stopped");
    result
}

fn run_engine(
    main_ready: Option<mpsc::Receiver<()>>,
    bridge: EventBridge,
    services: PlatformServices,
    renderer: RenderHandle,
    shutdown: Arc<AtomicBool>,
) -> VaporwaveResult<()> {
    // Surfaces are created through the main thread, so wait until it is servicing requests
    if let Some(main_ready) = main_ready {
        main_ready
            .recv()
            .map_err(|_| "Failed to receive main thread ready signal")?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start async runtime: {e}"))?;

    let result = runtime.block_on(EngineLoop::run(bridge, services, renderer, shutdown));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    result
}

#[derive(Debug, Error)]
pub enum VaporwaveFatalError {
    #[error("{0}")]
    Error(String),
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

pub type VaporwaveResult<T> = Result<T, VaporwaveFatalError>;

impl From<&str> for VaporwaveFatalError {
    fn from(value: &str) -> Self {
        VaporwaveFatalError::Error(value.to_owned())
    }
}

impl From<String> for VaporwaveFatalError {
    fn from(error: String) -> Self {
        VaporwaveFatalError::Error(error)
    }
}
