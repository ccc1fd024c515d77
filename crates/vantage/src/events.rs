//! # Event Taxonomy
//!
//! Events arrive over the wire as ordered batches of `[tag, payload]` pairs.
//! Each actor kind declares a closed set of tags it can receive; dispatch
//! matches tags by exact string equality and validates the payload for a
//! known tag before any handler runs. Tags outside the declared set are
//! routed through the actor's [`UnknownEventAction`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::ViewerError;
use crate::store::ImageData;

/// How an actor responds to an event tag outside its declared set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum UnknownEventAction {
    /// Silently skip the event.
    Ignore,
    /// Skip the event and surface an advisory to the caller.
    #[default]
    Warn,
    /// Fail the dispatch; remaining events in the batch are not processed.
    Error,
}

/// One event on the wire: a tag and a structured payload.
///
/// Serializes as a two-element JSON array, `["density", 30.0]`, matching the
/// batch shape consumed by `updateRenderer`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventEnvelope(pub String, #[serde(default)] pub serde_json::Value);

impl EventEnvelope {
    pub fn new(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self(kind.into(), payload)
    }

    pub fn kind(&self) -> &str {
        &self.0
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.1
    }
}

fn typed_payload<T: DeserializeOwned>(envelope: &EventEnvelope) -> Result<T, ViewerError> {
    serde_json::from_value(envelope.1.clone()).map_err(|e| ViewerError::InvalidEventPayload {
        kind: envelope.0.clone(),
        reason: e.to_string(),
    })
}

/// Camera pose for the rendered scene.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CameraPose {
    pub eye: [f64; 3],
    pub up: [f64; 3],
    pub target: [f64; 3],
}

/// Request to load an image into the rendering device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoadImageRequest {
    pub path: String,
    #[serde(default)]
    pub resolution_level: u32,
    #[serde(default)]
    pub channels: Vec<u32>,
    /// Index-space bounds of the sub-region to load; empty means the whole image.
    #[serde(default)]
    pub region: Vec<u32>,
}

/// Events receivable by a Renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum RendererEvent {
    LoadImage(LoadImageRequest),
    CameraPose(CameraPose),
    RenderSize { width: i64, height: i64 },
    Density(f64),
    RenderIterations(u32),
    NormalizedClipBounds([f64; 6]),
    Render,
}

impl RendererEvent {
    pub const KINDS: &'static [&'static str] = &[
        "loadImage",
        "cameraPose",
        "renderSize",
        "density",
        "renderIterations",
        "normalizedClipBounds",
        "render",
    ];

    /// Parse an envelope into a typed renderer event.
    ///
    /// Returns `Ok(None)` for tags outside the declared set so the caller can
    /// apply its unknown-event policy. A known tag with a malformed payload
    /// is an error regardless of policy.
    pub fn parse(envelope: &EventEnvelope) -> Result<Option<Self>, ViewerError> {
        let event = match envelope.kind() {
            "loadImage" => Self::LoadImage(typed_payload(envelope)?),
            "cameraPose" => Self::CameraPose(typed_payload(envelope)?),
            "renderSize" => {
                let [width, height]: [i64; 2] = typed_payload(envelope)?;
                Self::RenderSize { width, height }
            }
            "density" => Self::Density(typed_payload(envelope)?),
            "renderIterations" => Self::RenderIterations(typed_payload(envelope)?),
            "normalizedClipBounds" => Self::NormalizedClipBounds(typed_payload(envelope)?),
            "render" => Self::Render,
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

/// Payload of a `setImage` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SetImageRequest {
    #[serde(default)]
    pub name: Option<String>,
    pub image: ImageData,
}

/// Events receivable by a Viewer.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    SetImage(SetImageRequest),
    Render,
}

impl ViewerEvent {
    pub const KINDS: &'static [&'static str] = &["setImage", "render"];

    pub fn parse(envelope: &EventEnvelope) -> Result<Option<Self>, ViewerError> {
        let event = match envelope.kind() {
            "setImage" => Self::SetImage(typed_payload(envelope)?),
            "render" => Self::Render,
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

/// Events receivable by a DataManager.
#[derive(Debug, Clone, PartialEq)]
pub enum DataManagerEvent {
    SetImage(SetImageRequest),
    LoadImage { name: Option<String>, path: String },
}

impl DataManagerEvent {
    pub const KINDS: &'static [&'static str] = &["setImage", "loadImage"];

    pub fn parse(envelope: &EventEnvelope) -> Result<Option<Self>, ViewerError> {
        #[derive(Deserialize)]
        struct LoadImagePayload {
            #[serde(default)]
            name: Option<String>,
            path: String,
        }

        let event = match envelope.kind() {
            "setImage" => Self::SetImage(typed_payload(envelope)?),
            "loadImage" => {
                let payload: LoadImagePayload = typed_payload(envelope)?;
                Self::LoadImage {
                    name: payload.name,
                    path: payload.path,
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}
