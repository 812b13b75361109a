//! Asset resolution.
//!
//! Engines never interpret where audio comes from: they receive an opaque
//! [`AssetHandle`] per identifier and hand it to the audio backend.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An opaque, loadable reference to encoded audio.
#[derive(Clone, PartialEq, Eq)]
pub enum AssetHandle {
    /// A file on disk.
    Path(PathBuf),
    /// Encoded bytes already in memory (bundled or generated).
    Embedded(Arc<[u8]>),
}

impl fmt::Debug for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetHandle::Path(path) => write!(f, "Path({})", path.display()),
            AssetHandle::Embedded(bytes) => write!(f, "Embedded({} bytes)", bytes.len()),
        }
    }
}

impl fmt::Display for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetHandle::Path(path) => write!(f, "{}", path.display()),
            AssetHandle::Embedded(bytes) => write!(f, "<{} embedded bytes>", bytes.len()),
        }
    }
}

impl From<PathBuf> for AssetHandle {
    fn from(path: PathBuf) -> Self {
        AssetHandle::Path(path)
    }
}

impl From<&Path> for AssetHandle {
    fn from(path: &Path) -> Self {
        AssetHandle::Path(path.to_path_buf())
    }
}

impl From<Vec<u8>> for AssetHandle {
    fn from(bytes: Vec<u8>) -> Self {
        AssetHandle::Embedded(bytes.into())
    }
}

/// Mapping from base-layer/event identifier to asset handle.
#[derive(Debug, Clone, Default)]
pub struct AssetMap {
    handles: HashMap<String, AssetHandle>,
}

impl AssetMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a map where each id resolves to `<dir>/<id>.<extension>`.
    pub fn from_directory<'a>(
        dir: impl AsRef<Path>,
        ids: impl IntoIterator<Item = &'a str>,
        extension: &str,
    ) -> Self {
        let dir = dir.as_ref();
        ids.into_iter()
            .map(|id| (id.to_string(), dir.join(format!("{}.{}", id, extension))))
            .collect()
    }

    /// Registers (or replaces) the handle for `id`.
    pub fn insert(&mut self, id: impl Into<String>, handle: impl Into<AssetHandle>) {
        self.handles.insert(id.into(), handle.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, id: impl Into<String>, handle: impl Into<AssetHandle>) -> Self {
        self.insert(id, handle);
        self
    }

    /// Resolves an identifier.
    pub fn get(&self, id: &str) -> Option<&AssetHandle> {
        self.handles.get(id)
    }

    /// Number of registered ids.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns true if no ids are registered.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl<K: Into<String>, V: Into<AssetHandle>> FromIterator<(K, V)> for AssetMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            handles: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
