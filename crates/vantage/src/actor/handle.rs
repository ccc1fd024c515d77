//! # Viewer Handle
//!
//! The primary interface for interacting with a running viewer session. A
//! handle is cheap to clone; every operation is a message to the session's
//! runtime task plus a `oneshot` reply, bounded by a per-operation timeout so
//! a wedged device fails the one request instead of freezing the caller.

use tokio::sync::{mpsc, oneshot};
use tokio::time::{timeout, Duration};
use tracing::error;

use crate::actor::core::DispatchReport;
use crate::config::ViewerConfig;
use crate::errors::ViewerError;
use crate::events::{EventEnvelope, LoadImageRequest};
use crate::messages::ViewerCommand;
use crate::transport::pull::RenderResponse;

/// Default timeout for session operations, sized for a slow device draw.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// A handle to a viewer session's runtime task.
#[derive(Clone, Debug)]
pub struct ViewerHandle {
    command_tx: mpsc::Sender<ViewerCommand>,
}

impl ViewerHandle {
    pub fn new(command_tx: mpsc::Sender<ViewerCommand>) -> Self {
        Self { command_tx }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, ViewerError>>) -> ViewerCommand,
    ) -> Result<T, ViewerError> {
        let (tx, rx) = oneshot::channel();
        let command = build(tx);
        let description = command.to_log();

        self.command_tx.send(command).await.map_err(|_| {
            error!("Failed to send command: {}", description);
            ViewerError::ChannelClosed
        })?;

        match timeout(DEFAULT_OPERATION_TIMEOUT, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                // The runtime dropped the reply channel — it shut down with
                // this command still queued.
                error!("Session went away while handling: {}", description);
                Err(ViewerError::ShuttingDown)
            }
            Err(_) => {
                error!(
                    "Operation timed out after {:?}: {}",
                    DEFAULT_OPERATION_TIMEOUT, description
                );
                Err(ViewerError::OperationTimeout(
                    DEFAULT_OPERATION_TIMEOUT.as_secs(),
                ))
            }
        }
    }

    /// Drive the lifecycle to `running` and install a device at `width` x
    /// `height`. Must precede any render.
    pub async fn setup(&self, width: i64, height: i64) -> Result<(), ViewerError> {
        self.request(|response_tx| ViewerCommand::Setup {
            width,
            height,
            response_tx,
        })
        .await
    }

    /// Apply a batch of viewer-level events, in array order.
    pub async fn dispatch(&self, events: Vec<EventEnvelope>) -> Result<DispatchReport, ViewerError> {
        self.request(|response_tx| ViewerCommand::Dispatch {
            events,
            response_tx,
        })
        .await
    }

    /// Apply a batch of renderer-bound events, in array order.
    pub async fn update_renderer(
        &self,
        events: Vec<EventEnvelope>,
    ) -> Result<DispatchReport, ViewerError> {
        self.request(|response_tx| ViewerCommand::UpdateRenderer {
            events,
            response_tx,
        })
        .await
    }

    /// Pull delivery: one draw, one encoded frame back.
    pub async fn render(&self) -> Result<RenderResponse, ViewerError> {
        self.request(|response_tx| ViewerCommand::Render { response_tx })
            .await
    }

    /// Duration of the most recent draw, in seconds.
    pub async fn render_time(&self) -> Result<f64, ViewerError> {
        self.request(|response_tx| ViewerCommand::GetRenderTime { response_tx })
            .await
    }

    /// Resolve an image into the rendering device.
    pub async fn load_image(&self, request: LoadImageRequest) -> Result<(), ViewerError> {
        self.request(|response_tx| ViewerCommand::LoadImage {
            request,
            response_tx,
        })
        .await
    }

    /// Snapshot of the viewer tree's configuration.
    pub async fn config(&self) -> Result<ViewerConfig, ViewerError> {
        self.request(|response_tx| ViewerCommand::GetConfig { response_tx })
            .await
    }

    /// Re-initialize the viewer tree from a snapshot.
    pub async fn set_config(&self, config: ViewerConfig) -> Result<(), ViewerError> {
        self.request(|response_tx| ViewerCommand::SetConfig {
            config,
            response_tx,
        })
        .await
    }

    /// Initiate an orderly shutdown of the session.
    pub async fn shutdown(&self) -> Result<(), ViewerError> {
        self.request(|response_tx| ViewerCommand::Shutdown { response_tx })
            .await
    }
}
