use crate::config::Config;
use crate::engine::OverlayEngine;
use crate::overlay::CaptureDispatcher;
use crate::platform::{EngineEvent, EventBridge, PlatformServices};
use crate::render::RenderHandle;
use crate::VaporwaveResult;
use log::{info, trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{self, Interval, MissedTickBehavior};

const SHUTDOWN_CHECK_INTERVAL: Duration = Duration::from_millis(100);

pub struct EngineLoop {}

impl EngineLoop {
    /// Drives the engine until a shutdown event arrives, the event channel closes, or `shutdown`
    /// is set. Destroys every surface before returning.
    pub async fn run(
        mut bridge: EventBridge,
        services: PlatformServices,
        mut renderer: RenderHandle,
        shutdown: Arc<AtomicBool>,
    ) -> VaporwaveResult<()> {
        trace!("Handling events...");

        let config = Config::current().clone();
        let mut engine = OverlayEngine::new(services.clone(), &config);
        let captures = CaptureDispatcher::new(services.capture.clone(), bridge.dispatcher());

        // The first tick fires immediately, which is the initial pass
        let mut poll = Self::poll_timer(config.poll_interval());
        let mut shutdown_check = time::interval(SHUTDOWN_CHECK_INTERVAL);
        shutdown_check.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let wake = engine.next_deadline(Instant::now());

            tokio::select! {
                event = bridge.next_event() => match event {
                    None | Some(EngineEvent::Shutdown) => break,
                    Some(EngineEvent::ConfigChanged) => {
                        info!("Reloading config...");
                        let config = Config::current().clone();
                        engine.apply_config(&config);
                        renderer.set_texture_mix(config.texture_mix);
                        poll = Self::poll_timer(config.poll_interval());
                    }
                    Some(event) => engine.handle_event(event, Instant::now()),
                },
                _ = poll.tick() => {
                    engine.reconcile(Instant::now());
                }
                _ = Self::sleep_until(wake) => {}
                _ = shutdown_check.tick() => {
                    if shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                }
            }

            Self::step(&mut engine, &renderer, &captures, Instant::now());
        }

        info!("Shutting down...");
        // Stop drawing first so no frame lands on a surface that is about to go away
        renderer.shutdown();
        engine.shutdown();
        Ok(())
    }

    /// Runs due transitions, then hands finished frames to the renderer and starts captures.
    fn step(
        engine: &mut OverlayEngine,
        renderer: &RenderHandle,
        captures: &CaptureDispatcher,
        now: Instant,
    ) {
        engine.advance_transitions(now);
        let output = engine.frame(now);

        for overlay in engine.take_released() {
            renderer.release(overlay);
        }
        renderer.submit(output.snapshots);
        for request in output.captures {
            captures.dispatch(request);
        }
    }

    fn poll_timer(period: Duration) -> Interval {
        let mut timer = time::interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer
    }

    async fn sleep_until(deadline: Option<Instant>) {
        match deadline {
            Some(at) => time::sleep_until(at.into()).await,
            None => std::future::pending().await,
        }
    }
}
