//! Filesystem-backed content store for downloaded textures.
//!
//! Artifacts are keyed by [`ArtifactKey`] and stored flat as
//! `{root}/{key}.png`. The store is safe to share between concurrent
//! batch workers: content for a given key is immutable once known, so
//! two writers racing on the same key produce the same final bytes.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, instrument, trace};

use crate::queue::task::ArtifactKey;

/// File extension for stored artifacts.
const ARTIFACT_EXT: &str = "png";

/// Errors from content store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to create or resolve the store root directory.
    #[error("failed to prepare store root {path}: {source}")]
    Root {
        /// The root directory that could not be prepared.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write an artifact file.
    #[error("failed to write artifact {path}: {source}")]
    Write {
        /// The artifact path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to list the store root.
    #[error("failed to list store root {path}: {source}")]
    List {
        /// The root directory that could not be listed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Filesystem directory holding one `.png` per artifact key.
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    /// Opens the store rooted at `root`, creating the directory on
    /// first use.
    ///
    /// The root is canonicalized so that stored paths (recorded in the
    /// metadata table) are absolute.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Root`] if the directory cannot be created
    /// or resolved. This is a fatal setup error for the crawler.
    #[instrument(skip(root))]
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(|source| StoreError::Root {
            path: root.to_path_buf(),
            source,
        })?;
        let root = fs::canonicalize(root).map_err(|source| StoreError::Root {
            path: root.to_path_buf(),
            source,
        })?;
        debug!(root = %root.display(), "content store ready");
        Ok(Self { root })
    }

    /// Returns the absolute path an artifact with this key is stored at.
    #[must_use]
    pub fn path_for(&self, key: &ArtifactKey) -> PathBuf {
        self.root.join(format!("{key}.{ARTIFACT_EXT}"))
    }

    /// Returns the store root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Checks whether an artifact with this key is already stored.
    #[must_use]
    pub fn exists(&self, key: &ArtifactKey) -> bool {
        self.path_for(key).is_file()
    }

    /// Writes an artifact, returning its absolute path.
    ///
    /// Overwrites by key: concurrent writers to the same key race to
    /// identical final bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] if the file cannot be written.
    #[instrument(skip(self, bytes), fields(key = %key, len = bytes.len()))]
    pub async fn write(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let path = self.path_for(key);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| StoreError::Write {
                path: path.clone(),
                source,
            })?;
        trace!(path = %path.display(), "artifact saved");
        Ok(path)
    }

    /// Lists the keys of all artifacts currently stored.
    ///
    /// Files without the `.png` extension or with a stem that is not a
    /// valid key are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::List`] if the root cannot be read.
    pub fn keys(&self) -> Result<Vec<ArtifactKey>, StoreError> {
        let entries = fs::read_dir(&self.root).map_err(|source| StoreError::List {
            path: self.root.clone(),
            source,
        })?;

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::List {
                path: self.root.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(OsStr::to_str) != Some(ARTIFACT_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(OsStr::to_str)
                && let Ok(key) = ArtifactKey::from_segment(stem)
            {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}
