//! # Viewer Runtime
//!
//! Each connected session gets one runtime task that owns its viewer tree.
//! Commands arrive over a channel and are handled one at a time, which gives
//! every actor the single-writer discipline the device and the state
//! machines require. The task ends when the session's shutdown controller
//! fires or the last handle is dropped; commands still queued at that point
//! receive explicit failures rather than vanishing.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::actor::handle::ViewerHandle;
use crate::actor::machine::LifecycleState;
use crate::errors::ViewerError;
use crate::events::EventEnvelope;
use crate::messages::ViewerCommand;
use crate::render::codec::FrameCodec;
use crate::render::device::RenderDevice;
use crate::shutdown::ShutdownReceiver;
use crate::transport::pull;
use crate::viewer::Viewer;

/// Builds the device handle for a session at `setup` time.
pub type DeviceFactory = Box<dyn Fn() -> Result<Box<dyn RenderDevice>, ViewerError> + Send>;

pub struct ViewerRuntime {
    viewer: Viewer,
    command_rx: mpsc::Receiver<ViewerCommand>,
    device_factory: DeviceFactory,
    codec: Arc<dyn FrameCodec>,
}

impl ViewerRuntime {
    /// Start the runtime task and return the handle for talking to it.
    pub fn spawn(
        viewer: Viewer,
        device_factory: DeviceFactory,
        codec: Arc<dyn FrameCodec>,
        shutdown_rx: ShutdownReceiver,
    ) -> (ViewerHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let runtime = Self {
            viewer,
            command_rx,
            device_factory,
            codec,
        };
        let task = tokio::spawn(runtime.run(shutdown_rx));
        (ViewerHandle::new(command_tx), task)
    }

    async fn run(mut self, mut shutdown_rx: ShutdownReceiver) {
        let mut shutdown_active = true;
        loop {
            let next = if shutdown_active {
                tokio::select! {
                    signal = &mut shutdown_rx.receiver => {
                        match signal {
                            Ok(signal) => {
                                info!("shutdown signal received, stopping session");
                                if let Err(e) = self.viewer.shutdown().await {
                                    debug!("session was not running at shutdown: {}", e);
                                }
                                if let Some(ack) = signal.sender {
                                    let _ = ack.send(());
                                }
                                break;
                            }
                            Err(_) => {
                                // Controller gone without signaling; keep
                                // serving until the handles drop.
                                shutdown_active = false;
                                continue;
                            }
                        }
                    }
                    command = self.command_rx.recv() => command,
                }
            } else {
                self.command_rx.recv().await
            };

            let Some(command) = next else {
                debug!("all handles dropped, stopping session");
                break;
            };
            debug!("handling command: {}", command.to_log());
            self.handle_command(command).await;
        }

        // Nothing queued before shutdown is silently dropped: every command
        // still in the channel gets an explicit cancellation result.
        self.command_rx.close();
        while let Ok(command) = self.command_rx.try_recv() {
            warn!("cancelling queued command: {}", command.to_log());
            reject(command);
        }
    }

    async fn handle_command(&mut self, command: ViewerCommand) {
        match command {
            ViewerCommand::Setup {
                width,
                height,
                response_tx,
            } => {
                let result = self.setup(width, height).await;
                let _ = response_tx.send(result);
            }
            ViewerCommand::Dispatch {
                events,
                response_tx,
            } => {
                let _ = response_tx.send(self.viewer.dispatch(&events).await);
            }
            ViewerCommand::UpdateRenderer {
                events,
                response_tx,
            } => {
                let _ = response_tx.send(self.viewer.update_renderer(&events).await);
            }
            ViewerCommand::Render { response_tx } => {
                let result = pull::render(&mut self.viewer, self.codec.as_ref()).await;
                let _ = response_tx.send(result);
            }
            ViewerCommand::GetRenderTime { response_tx } => {
                let result = self
                    .viewer
                    .renderer()
                    .map(|renderer| renderer.last_render_seconds())
                    .ok_or(ViewerError::NotSetUp);
                let _ = response_tx.send(result);
            }
            ViewerCommand::LoadImage {
                request,
                response_tx,
            } => {
                let result = match serde_json::to_value(&request) {
                    Ok(payload) => self
                        .viewer
                        .update_renderer(&[EventEnvelope::new("loadImage", payload)])
                        .await
                        .map(|_| ()),
                    Err(e) => Err(ViewerError::InvalidEventPayload {
                        kind: "loadImage".to_string(),
                        reason: e.to_string(),
                    }),
                };
                let _ = response_tx.send(result);
            }
            ViewerCommand::GetConfig { response_tx } => {
                let _ = response_tx.send(Ok(self.viewer.config()));
            }
            ViewerCommand::SetConfig {
                config,
                response_tx,
            } => {
                let _ = response_tx.send(self.viewer.set_config(config));
            }
            ViewerCommand::Shutdown { response_tx } => {
                // The task stays alive so late callers observe ActorNotReady
                // from the terminal state instead of a dead channel.
                let result = self.viewer.shutdown().await.map(|_| ());
                let _ = response_tx.send(result);
            }
        }
    }

    async fn setup(&mut self, width: i64, height: i64) -> Result<(), ViewerError> {
        if self.viewer.state() == LifecycleState::Idle {
            self.viewer.load()?;
        }
        if self.viewer.state() == LifecycleState::Loading {
            self.viewer.run()?;
        }
        if self.viewer.state() != LifecycleState::Running {
            return Err(ViewerError::ActorNotReady {
                state: self.viewer.state(),
            });
        }
        let device = (self.device_factory)()?;
        self.viewer.setup_renderer(device, width, height).await
    }
}

fn reject(command: ViewerCommand) {
    match command {
        ViewerCommand::Setup { response_tx, .. } => {
            let _ = response_tx.send(Err(ViewerError::ShuttingDown));
        }
        ViewerCommand::Dispatch { response_tx, .. } => {
            let _ = response_tx.send(Err(ViewerError::ShuttingDown));
        }
        ViewerCommand::UpdateRenderer { response_tx, .. } => {
            let _ = response_tx.send(Err(ViewerError::ShuttingDown));
        }
        ViewerCommand::Render { response_tx } => {
            let _ = response_tx.send(Err(ViewerError::ShuttingDown));
        }
        ViewerCommand::GetRenderTime { response_tx } => {
            let _ = response_tx.send(Err(ViewerError::ShuttingDown));
        }
        ViewerCommand::LoadImage { response_tx, .. } => {
            let _ = response_tx.send(Err(ViewerError::ShuttingDown));
        }
        ViewerCommand::GetConfig { response_tx } => {
            let _ = response_tx.send(Err(ViewerError::ShuttingDown));
        }
        ViewerCommand::SetConfig { response_tx, .. } => {
            let _ = response_tx.send(Err(ViewerError::ShuttingDown));
        }
        ViewerCommand::Shutdown { response_tx } => {
            let _ = response_tx.send(Err(ViewerError::ShuttingDown));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewerConfig;
    use crate::render::codec::QuantizingPngCodec;
    use crate::render::device::SoftwareDevice;
    use crate::shutdown::ShutdownController;

    fn spawn_session() -> (ViewerHandle, JoinHandle<()>, ShutdownController) {
        let mut controller = ShutdownController::new();
        let shutdown_rx = controller.subscribe();
        let viewer = Viewer::new(ViewerConfig::default()).unwrap();
        let (handle, task) = ViewerRuntime::spawn(
            viewer,
            Box::new(|| Ok(Box::new(SoftwareDevice::new()) as Box<dyn RenderDevice>)),
            Arc::new(QuantizingPngCodec::default()),
            shutdown_rx,
        );
        (handle, task, controller)
    }

    #[tokio::test]
    async fn setup_render_and_render_time() {
        let (handle, task, controller) = spawn_session();

        handle.setup(64, 64).await.unwrap();
        let response = handle.render().await.unwrap();
        assert!(!response.frame.is_empty());
        assert!(response.render_time_seconds >= 0.0);

        let first = handle.render_time().await.unwrap();
        let second = handle.render_time().await.unwrap();
        assert_eq!(first, second);

        controller.signal_shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn render_before_setup_is_not_set_up() {
        let (handle, task, controller) = spawn_session();

        // The tree is idle: pull delivery needs the lifecycle first.
        assert!(matches!(
            handle.render().await.unwrap_err(),
            ViewerError::ActorNotReady { .. }
        ));

        controller.signal_shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_then_render_is_not_ready() {
        let (handle, task, controller) = spawn_session();

        handle.setup(32, 32).await.unwrap();
        handle.shutdown().await.unwrap();

        assert_eq!(
            handle.render().await.unwrap_err(),
            ViewerError::ActorNotReady {
                state: LifecycleState::ShuttingDown
            }
        );

        controller.signal_shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn unavailable_device_fails_setup() {
        let mut controller = ShutdownController::new();
        let shutdown_rx = controller.subscribe();
        let viewer = Viewer::new(ViewerConfig::default()).unwrap();
        let (handle, task) = ViewerRuntime::spawn(
            viewer,
            Box::new(|| Err(ViewerError::DeviceUnavailable("engine offline".to_string()))),
            Arc::new(QuantizingPngCodec::default()),
            shutdown_rx,
        );

        assert!(matches!(
            handle.setup(64, 64).await.unwrap_err(),
            ViewerError::DeviceUnavailable(_)
        ));

        controller.signal_shutdown().await;
        task.await.unwrap();
    }
}
