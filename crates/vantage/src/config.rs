//! # Configuration Snapshots
//!
//! Every actor exposes a serializable configuration snapshot. Reading one
//! reflects current child state (a viewer snapshot embeds its data manager's
//! image list); writing one re-initializes the actor tree from scratch —
//! never a partial merge. The same shapes double as the on-disk TOML
//! manifest the server boots from.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::events::UnknownEventAction;
use crate::store::ImageData;

pub const DEFAULT_TITLE: &str = "Vantage Viewer";
pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 480;

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

fn default_width() -> u32 {
    DEFAULT_WIDTH
}

fn default_height() -> u32 {
    DEFAULT_HEIGHT
}

/// Rectangular display target owned by a renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default)]
    pub unknown_event_action: UnknownEventAction,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            unknown_event_action: UnknownEventAction::default(),
        }
    }
}

/// Renderer snapshot: canvas size plus the owned viewport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RendererConfig {
    #[serde(default)]
    pub viewport: ViewportConfig,
    #[serde(default)]
    pub unknown_event_action: UnknownEventAction,
}

/// DataManager snapshot: the ordered image list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DataManagerConfig {
    #[serde(default)]
    pub images: Vec<ImageData>,
    #[serde(default)]
    pub unknown_event_action: UnknownEventAction,
}

/// Viewer snapshot embedding both children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub unknown_event_action: UnknownEventAction,
    #[serde(default)]
    pub data_manager: DataManagerConfig,
    /// Absent when the session is headless (no rendering).
    #[serde(default)]
    pub renderer: Option<RendererConfig>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            unknown_event_action: UnknownEventAction::default(),
            data_manager: DataManagerConfig::default(),
            renderer: Some(RendererConfig::default()),
        }
    }
}

impl ViewerConfig {
    /// Load a viewer manifest from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Ok(toml::from_str(&raw)?)
    }
}

/// Which rendering backend a session's device factory builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DeviceBackend {
    /// Built-in deterministic device.
    #[default]
    Software,
    /// External engine reached over TCP at `setup`.
    Remote { address: String },
}

/// Server-side session settings: device backend and the data root that
/// client-supplied image paths are mapped under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    #[serde(default)]
    pub viewer: ViewerConfig,
    #[serde(default)]
    pub device: DeviceBackend,
    #[serde(default)]
    pub data_root: Option<PathBuf>,
}

impl SessionConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Ok(toml::from_str(&raw)?)
    }

    /// Map a client-supplied image path under the configured data root.
    /// Absolute URLs (`scheme://…`) pass through untouched.
    pub fn map_path(&self, image_path: &str) -> PathBuf {
        if image_path.contains("://") {
            return PathBuf::from(image_path);
        }
        match &self.data_root {
            Some(root) => root.join(image_path),
            None => PathBuf::from(image_path),
        }
    }
}
