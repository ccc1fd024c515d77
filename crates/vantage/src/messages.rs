//! # Session Commands
//!
//! All interaction with a running viewer session happens through
//! [`ViewerCommand`] messages carrying a `oneshot` response channel. The
//! per-session runtime consumes them one at a time, which is what serializes
//! event dispatch, renders, and lifecycle transitions per actor.

use tokio::sync::oneshot;

use crate::actor::core::DispatchReport;
use crate::config::ViewerConfig;
use crate::errors::ViewerError;
use crate::events::{EventEnvelope, LoadImageRequest};
use crate::transport::pull::RenderResponse;

#[derive(Debug)]
pub enum ViewerCommand {
    /// Drive the lifecycle to `running` and install a rendering device at
    /// the given resolution.
    Setup {
        width: i64,
        height: i64,
        response_tx: oneshot::Sender<Result<(), ViewerError>>,
    },
    /// Apply a batch of viewer-level events (`setImage`, `render`).
    Dispatch {
        events: Vec<EventEnvelope>,
        response_tx: oneshot::Sender<Result<DispatchReport, ViewerError>>,
    },
    /// Apply a batch of renderer-bound events.
    UpdateRenderer {
        events: Vec<EventEnvelope>,
        response_tx: oneshot::Sender<Result<DispatchReport, ViewerError>>,
    },
    /// Pull delivery: draw, encode, return the frame.
    Render {
        response_tx: oneshot::Sender<Result<RenderResponse, ViewerError>>,
    },
    GetRenderTime {
        response_tx: oneshot::Sender<Result<f64, ViewerError>>,
    },
    /// Resolve an image into the rendering device.
    LoadImage {
        request: LoadImageRequest,
        response_tx: oneshot::Sender<Result<(), ViewerError>>,
    },
    GetConfig {
        response_tx: oneshot::Sender<Result<ViewerConfig, ViewerError>>,
    },
    SetConfig {
        config: ViewerConfig,
        response_tx: oneshot::Sender<Result<(), ViewerError>>,
    },
    /// Shut the actor tree down; terminal.
    Shutdown {
        response_tx: oneshot::Sender<Result<(), ViewerError>>,
    },
}

impl ViewerCommand {
    pub fn to_log(&self) -> String {
        match self {
            Self::Setup { width, height, .. } => format!("Setup: {}x{}", width, height),
            Self::Dispatch { events, .. } => format!("Dispatch: {} events", events.len()),
            Self::UpdateRenderer { events, .. } => {
                format!("UpdateRenderer: {} events", events.len())
            }
            Self::Render { .. } => "Render".to_string(),
            Self::GetRenderTime { .. } => "GetRenderTime".to_string(),
            Self::LoadImage { request, .. } => format!("LoadImage: {}", request.path),
            Self::GetConfig { .. } => "GetConfig".to_string(),
            Self::SetConfig { .. } => "SetConfig".to_string(),
            Self::Shutdown { .. } => "Shutdown".to_string(),
        }
    }
}
