//! Asset id → media path resolution

use std::path::{Component, Path, PathBuf};

use crate::error::{DecodeError, DecodeResult};

/// Resolves opaque asset ids to decoder paths
pub trait AssetResolver: Send + Sync {
    fn resolve(&self, asset: &str) -> DecodeResult<PathBuf>;
}

/// Resolves ids relative to a media root directory
///
/// Ids must be relative and stay inside the root (`..` and absolute paths
/// are rejected).
#[derive(Debug, Clone)]
pub struct MediaRoot {
    root: PathBuf,
}

impl MediaRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetResolver for MediaRoot {
    fn resolve(&self, asset: &str) -> DecodeResult<PathBuf> {
        let relative = Path::new(asset);
        let contained = !asset.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !contained {
            return Err(DecodeError::AssetNotFound(asset.to_string()));
        }
        let path = self.root.join(relative);
        if !path.exists() {
            return Err(DecodeError::AssetNotFound(asset.to_string()));
        }
        Ok(path)
    }
}
