//! # Image Stores
//!
//! The backing store for multiscale images is an opaque key/value interface
//! addressed by a mapped filesystem path or URL. "Path does not exist" and
//! "store cannot be read" are distinct failures so clients can tell a typo
//! from an outage.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;

use crate::errors::ViewerError;

/// Reference to the backing store of one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StoreRef {
    /// A store backed by a directory on the local filesystem.
    Directory { path: PathBuf },
    /// A store addressed by protocol and path, like `s3://bucket/root.zarr`.
    Url { url: String },
}

impl StoreRef {
    pub fn location(&self) -> String {
        match self {
            Self::Directory { path } => path.display().to_string(),
            Self::Url { url } => url.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageDataWire {
    #[serde(default)]
    store: Option<StoreRef>,
    #[serde(default)]
    data_uri: Option<String>,
}

/// One loaded image reference: a store reference XOR an inline data URI.
///
/// Immutable once created; to change an image, replace the entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ImageDataWire", into = "ImageDataWire")]
pub struct ImageData {
    store: Option<StoreRef>,
    data_uri: Option<String>,
}

impl ImageData {
    pub fn from_store(store: StoreRef) -> Self {
        Self {
            store: Some(store),
            data_uri: None,
        }
    }

    pub fn from_data_uri(data_uri: impl Into<String>) -> Result<Self, ViewerError> {
        let data_uri = data_uri.into();
        if data_uri.is_empty() {
            return Err(ViewerError::InvalidImageData(
                "empty data URI".to_string(),
            ));
        }
        Ok(Self {
            store: None,
            data_uri: Some(data_uri),
        })
    }

    pub fn store(&self) -> Option<&StoreRef> {
        self.store.as_ref()
    }

    pub fn data_uri(&self) -> Option<&str> {
        self.data_uri.as_deref()
    }

    /// Decode the inline payload of a data-URI image.
    pub fn decode_inline(&self) -> Result<Vec<u8>, ViewerError> {
        let uri = self.data_uri.as_deref().ok_or_else(|| {
            ViewerError::InvalidImageData("image is store-backed, not inline".to_string())
        })?;
        let encoded = uri.rsplit_once(',').map(|(_, data)| data).unwrap_or(uri);
        BASE64
            .decode(encoded)
            .map_err(|e| ViewerError::InvalidImageData(format!("bad base64 payload: {}", e)))
    }
}

impl TryFrom<ImageDataWire> for ImageData {
    type Error = ViewerError;

    fn try_from(wire: ImageDataWire) -> Result<Self, Self::Error> {
        match (&wire.store, &wire.data_uri) {
            (Some(_), Some(_)) => Err(ViewerError::InvalidImageData(
                "both store and dataUri set".to_string(),
            )),
            (None, None) => Err(ViewerError::InvalidImageData(
                "neither store nor dataUri set".to_string(),
            )),
            _ => Ok(Self {
                store: wire.store,
                data_uri: wire.data_uri,
            }),
        }
    }
}

impl From<ImageData> for ImageDataWire {
    fn from(image: ImageData) -> Self {
        Self {
            store: image.store,
            data_uri: image.data_uri,
        }
    }
}

/// Key/value interface over an image's backing store.
pub trait ImageStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Vec<u8>, ViewerError>;
    fn set(&self, key: &str, value: &[u8]) -> Result<(), ViewerError>;
    fn contains(&self, key: &str) -> Result<bool, ViewerError>;
}

/// A store backed by a directory on the filesystem.
#[derive(Debug)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Open an existing store directory.
    ///
    /// A missing path is `StoreNotFound`; an unreadable one is
    /// `StoreUnreachable`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ViewerError> {
        let root = root.into();
        match root.try_exists() {
            Ok(true) => Ok(Self { root }),
            Ok(false) => Err(ViewerError::StoreNotFound(root.display().to_string())),
            Err(e) => Err(ViewerError::StoreUnreachable(format!(
                "{}: {}",
                root.display(),
                e
            ))),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store_ref(&self) -> StoreRef {
        StoreRef::Directory {
            path: self.root.clone(),
        }
    }

    // Keys are relative chunk paths; anything escaping the root is rejected.
    fn resolve(&self, key: &str) -> Result<PathBuf, ViewerError> {
        let relative = Path::new(key);
        let escapes = relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, Component::ParentDir));
        if escapes {
            return Err(ViewerError::StoreNotFound(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl ImageStore for DirectoryStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, ViewerError> {
        let path = self.resolve(key)?;
        std::fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ViewerError::StoreNotFound(key.to_string()),
            _ => ViewerError::StoreUnreachable(format!("{}: {}", path.display(), e)),
        })
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), ViewerError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ViewerError::StoreUnreachable(format!("{}: {}", parent.display(), e)))?;
        }
        std::fs::write(&path, value)
            .map_err(|e| ViewerError::StoreUnreachable(format!("{}: {}", path.display(), e)))
    }

    fn contains(&self, key: &str) -> Result<bool, ViewerError> {
        let path = self.resolve(key)?;
        path.try_exists()
            .map_err(|e| ViewerError::StoreUnreachable(format!("{}: {}", path.display(), e)))
    }
}

/// In-memory store, for tests and inline images.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ImageStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, ViewerError> {
        self.entries
            .read()
            .expect("store lock poisoned")
            .get(key)
            .cloned()
            .ok_or_else(|| ViewerError::StoreNotFound(key.to_string()))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), ViewerError> {
        self.entries
            .write()
            .expect("store lock poisoned")
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn contains(&self, key: &str) -> Result<bool, ViewerError> {
        Ok(self
            .entries
            .read()
            .expect("store lock poisoned")
            .contains_key(key))
    }
}

/// A multiscale image pyramid resolved against its backing store.
///
/// Scale level 0 is the finest resolution; higher levels are coarser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiscaleImage {
    pub store: StoreRef,
    pub scale_levels: u32,
}

impl MultiscaleImage {
    const MAX_PROBED_LEVELS: u32 = 16;

    /// Probe the store for scale-level array metadata (`<level>/.zarray`)
    /// and record how many levels the pyramid has. A store without any
    /// recognizable levels is treated as a single-scale image.
    pub fn detect(store_ref: StoreRef, store: &dyn ImageStore) -> Result<Self, ViewerError> {
        let mut scale_levels = 0;
        while scale_levels < Self::MAX_PROBED_LEVELS {
            if !store.contains(&format!("{}/.zarray", scale_levels))? {
                break;
            }
            scale_levels += 1;
        }
        Ok(Self {
            store: store_ref,
            scale_levels: scale_levels.max(1),
        })
    }

    pub fn coarsest_scale(&self) -> u32 {
        self.scale_levels - 1
    }

    /// Clamp a requested resolution level into the pyramid's range.
    pub fn clamp_scale(&self, requested: u32) -> u32 {
        requested.min(self.coarsest_scale())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn image_data_requires_exactly_one_source() {
        let both = json!({
            "store": {"type": "Directory", "path": "/data/brain.zarr"},
            "dataUri": "data:application/octet-stream;base64,AAAA",
        });
        let err = serde_json::from_value::<ImageData>(both).unwrap_err();
        assert!(err.to_string().contains("both"));

        let neither = json!({});
        let err = serde_json::from_value::<ImageData>(neither).unwrap_err();
        assert!(err.to_string().contains("neither"));

        let store_only = json!({"store": {"type": "Directory", "path": "/data/brain.zarr"}});
        let image: ImageData = serde_json::from_value(store_only).unwrap();
        assert!(image.store().is_some());
        assert!(image.data_uri().is_none());
    }

    #[test]
    fn data_uri_round_trip() {
        let image = ImageData::from_data_uri("data:application/octet-stream;base64,aGVsbG8=")
            .unwrap();
        assert_eq!(image.decode_inline().unwrap(), b"hello");
    }

    #[test]
    fn memory_store_get_set_contains() {
        let store = MemoryStore::new();
        assert!(!store.contains("0/.zarray").unwrap());
        store.set("0/.zarray", b"{}").unwrap();
        assert!(store.contains("0/.zarray").unwrap());
        assert_eq!(store.get("0/.zarray").unwrap(), b"{}");
        assert_eq!(
            store.get("missing").unwrap_err(),
            ViewerError::StoreNotFound("missing".to_string())
        );
    }

    #[test]
    fn directory_store_missing_path_is_not_found() {
        let err = DirectoryStore::open("/definitely/not/here.zarr").unwrap_err();
        assert!(matches!(err, ViewerError::StoreNotFound(_)));
    }

    #[test]
    fn directory_store_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::open(dir.path()).unwrap();
        assert!(store.get("../outside").is_err());
        store.set("1/.zarray", b"{}").unwrap();
        assert!(store.contains("1/.zarray").unwrap());
    }

    #[test]
    fn multiscale_detection_counts_levels() {
        let store = MemoryStore::new();
        store.set("0/.zarray", b"{}").unwrap();
        store.set("1/.zarray", b"{}").unwrap();
        store.set("2/.zarray", b"{}").unwrap();

        let image = MultiscaleImage::detect(
            StoreRef::Url {
                url: "memory://test".to_string(),
            },
            &store,
        )
        .unwrap();
        assert_eq!(image.scale_levels, 3);
        assert_eq!(image.coarsest_scale(), 2);
        assert_eq!(image.clamp_scale(9), 2);
        assert_eq!(image.clamp_scale(1), 1);
    }
}
