use crate::config::Config;
use crate::overlay::OverlayId;
use crate::platform::PlatformOverlayImpl;
use crate::render::pipeline::RasterTarget;
use crate::render::{FrameSnapshot, RenderError, RenderPipeline};
use indexmap::IndexMap;
use log::{debug, error, trace};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc;

pub enum RenderCommand {
    Frame(Vec<FrameSnapshot>),
    /// The overlay is gone; drop its surface.
    Release(OverlayId),
    SetTextureMix(f32),
    Shutdown,
}

/// Owner side of the render thread. Dropping it stops the thread.
pub struct RenderHandle {
    command_sender: mpsc::UnboundedSender<RenderCommand>,
    render_thread: Option<thread::JoinHandle<()>>,
}

impl RenderHandle {
    /// Starts the render thread and waits for it to compile the effect. A compile failure is
    /// returned here and the thread is gone.
    pub fn spawn(
        config: &Config,
        overlays: Arc<dyn PlatformOverlayImpl>,
    ) -> Result<Self, RenderError> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let config = config.clone();

        let render_thread = thread::Builder::new()
            .name("vaporwave-render".into())
            .spawn(move || {
                let pipeline = match RenderPipeline::from_config(&config) {
                    Ok(pipeline) => pipeline,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                RenderLoop {
                    pipeline,
                    overlays,
                    targets: HashMap::new(),
                }
                .run(command_rx);
            })
            .map_err(|_| RenderError::ThreadStopped)?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                debug!("Render pipeline compiled");
                Ok(Self {
                    command_sender: command_tx,
                    render_thread: Some(render_thread),
                })
            }
            Ok(Err(e)) => {
                let _ = render_thread.join();
                Err(e)
            }
            Err(_) => Err(RenderError::ThreadStopped),
        }
    }

    pub fn submit(&self, frames: Vec<FrameSnapshot>) {
        if frames.is_empty() {
            return;
        }
        let _ = self.command_sender.send(RenderCommand::Frame(frames));
    }

    pub fn release(&self, overlay: OverlayId) {
        let _ = self.command_sender.send(RenderCommand::Release(overlay));
    }

    pub fn set_texture_mix(&self, texture_mix: f32) {
        let _ = self
            .command_sender
            .send(RenderCommand::SetTextureMix(texture_mix));
    }

    /// Draws whatever is queued, then stops the thread and waits for it.
    pub fn shutdown(&mut self) {
        let _ = self.command_sender.send(RenderCommand::Shutdown);
        if let Some(thread) = self.render_thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for RenderHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct RenderLoop {
    pipeline: RenderPipeline,
    overlays: Arc<dyn PlatformOverlayImpl>,
    targets: HashMap<OverlayId, RasterTarget>,
}

impl RenderLoop {
    fn run(mut self, mut command_rx: mpsc::UnboundedReceiver<RenderCommand>) {
        let mut running = true;

        while running {
            let Some(command) = command_rx.blocking_recv() else {
                break;
            };

            // Only the newest snapshot per overlay is drawn when we fall behind
            let mut pending: IndexMap<OverlayId, FrameSnapshot> = IndexMap::new();
            running = self.apply(command, &mut pending);
            while running {
                match command_rx.try_recv() {
                    Ok(command) => running = self.apply(command, &mut pending),
                    Err(_) => break,
                }
            }

            for frame in pending.into_values() {
                self.draw(frame);
            }
        }

        debug!("Render thread stopped");
    }

    fn apply(
        &mut self,
        command: RenderCommand,
        pending: &mut IndexMap<OverlayId, FrameSnapshot>,
    ) -> bool {
        match command {
            RenderCommand::Frame(frames) => {
                for frame in frames {
                    pending.insert(frame.overlay, frame);
                }
            }
            RenderCommand::Release(overlay) => {
                pending.shift_remove(&overlay);
                self.targets.remove(&overlay);
            }
            RenderCommand::SetTextureMix(texture_mix) => {
                self.pipeline.set_texture_mix(texture_mix);
            }
            RenderCommand::Shutdown => return false,
        }
        true
    }

    fn draw(&mut self, frame: FrameSnapshot) {
        let target = match self.targets.entry(frame.overlay) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => match RasterTarget::new(frame.size.to_pixels()) {
                Ok(target) => entry.insert(target),
                Err(e) => {
                    error!("Failed to create surface for overlay {}: {e}", frame.overlay);
                    return;
                }
            },
        };

        match target.render(&self.pipeline, &frame) {
            Ok(pixels) => {
                // The surface may already be destroyed if the overlay was collected meanwhile
                if let Err(e) = self.overlays.present(frame.surface, &pixels) {
                    trace!("Could not present overlay {}: {e}", frame.overlay);
                }
            }
            Err(e) => error!("Failed to render overlay {}: {e}", frame.overlay),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::MockPlatform;
    use crate::platform::{Bounds, Size};
    use std::time::Duration;

    fn snapshot(overlay: OverlayId, surface: u64, opacity: f32) -> FrameSnapshot {
        FrameSnapshot {
            overlay,
            surface,
            size: Size::new(16.0, 16.0),
            opacity,
            elapsed: Duration::from_millis(100),
            seed: overlay as f32,
            texture: None,
        }
    }

    #[test]
    fn test_bad_effect_fails_spawn() {
        let platform = Arc::new(MockPlatform::dual_display());
        let path = std::env::temp_dir().join(format!("vaporwave-bad-{}.sksl", std::process::id()));
        std::fs::write(&path, "this is not sksl").unwrap();

        let config = Config {
            shader_path: Some(path.clone()),
            ..Config::default()
        };
        assert!(matches!(
            RenderHandle::spawn(&config, platform),
            Err(RenderError::Compile(_))
        ));

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_frames_are_presented_before_shutdown() {
        let platform = Arc::new(MockPlatform::dual_display());
        let surface = platform
            .create_surface(&Bounds::new(0.0, 0.0, 16.0, 16.0), None)
            .unwrap();

        let mut renderer = RenderHandle::spawn(&Config::default(), platform.clone()).unwrap();
        renderer.submit(vec![snapshot(1, surface, 1.0)]);
        renderer.shutdown();

        let presented = platform.surface(surface).unwrap();
        assert_eq!(presented.presented, 1);
        assert_eq!(presented.last_frame_transparent, Some(false));
    }

    #[test]
    fn test_released_overlay_is_not_drawn() {
        let platform = Arc::new(MockPlatform::dual_display());
        let surface = platform
            .create_surface(&Bounds::new(0.0, 0.0, 16.0, 16.0), None)
            .unwrap();

        let mut renderer = RenderHandle::spawn(&Config::default(), platform.clone()).unwrap();
        // Both commands sit in the queue together only if the thread is slow, so this checks the
        // outcome rather than the coalescing itself.
        renderer.submit(vec![snapshot(1, surface, 1.0)]);
        renderer.release(1);
        renderer.submit(vec![snapshot(2, surface, 0.0)]);
        renderer.shutdown();

        let presented = platform.surface(surface).unwrap();
        assert!(presented.presented >= 1);
        assert_eq!(presented.last_frame_transparent, Some(true));
    }
}
