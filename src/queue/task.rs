//! Task and artifact-key types for the download pipeline.
//!
//! An [`ArtifactKey`] is the texture-hash segment of a texture URL,
//! obtained by stripping a fixed prefix. It is both the filename stem in
//! the content store and the dedup key at admission. Two descriptors
//! with the same URL always map to the same key.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use crate::catalog::SkinDescriptor;
use crate::store::{MetadataError, StoreError};
use crate::texture::FetchError;

/// Texture URL prefixes accepted by the default key derivation.
const DEFAULT_TEXTURE_PREFIXES: [&str; 2] = [
    "https://textures.minecraft.net/texture/",
    "http://textures.minecraft.net/texture/",
];

/// Errors from artifact-key derivation.
///
/// A URL from which no key can be derived is a hard admission error;
/// the pipeline never invents synthetic identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// The URL does not start with a known texture prefix.
    #[error("URL does not match the texture prefix: {url}")]
    UnknownPrefix {
        /// The offending URL.
        url: String,
    },

    /// The URL matched a prefix but the key segment is empty.
    #[error("texture URL has an empty key segment: {url}")]
    EmptyKey {
        /// The offending URL.
        url: String,
    },

    /// The key segment contains characters outside `[0-9A-Za-z]`.
    #[error("texture key contains unexpected characters: {url}")]
    MalformedKey {
        /// The offending URL or segment.
        url: String,
    },
}

/// Identifier derived from a texture URL.
///
/// Used as the filename stem (`{key}.png`) and the admission dedup key.
/// The inner segment is guaranteed ASCII-alphanumeric, so it is always
/// safe to join onto the store root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey(String);

impl ArtifactKey {
    /// Validates a bare key segment (a filename stem, a stored hash).
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::EmptyKey`] or [`KeyError::MalformedKey`] if
    /// the segment is not a plausible texture hash.
    pub fn from_segment(segment: &str) -> Result<Self, KeyError> {
        Self::parse(segment, segment)
    }

    fn parse(segment: &str, url: &str) -> Result<Self, KeyError> {
        if segment.is_empty() {
            return Err(KeyError::EmptyKey {
                url: url.to_string(),
            });
        }
        if !segment.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(KeyError::MalformedKey {
                url: url.to_string(),
            });
        }
        Ok(Self(segment.to_string()))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The fixed URL prefix(es) artifact keys are derived against.
///
/// Defaults to the Minecraft texture CDN in both scheme variants.
/// Tests point it at a mock server instead.
#[derive(Debug, Clone)]
pub struct TexturePrefix {
    prefixes: Vec<String>,
}

impl Default for TexturePrefix {
    fn default() -> Self {
        Self {
            prefixes: DEFAULT_TEXTURE_PREFIXES
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl TexturePrefix {
    /// Creates a prefix set with a single custom prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefixes: vec![prefix.into()],
        }
    }

    /// Derives the artifact key for a texture URL.
    ///
    /// # Errors
    ///
    /// Returns a [`KeyError`] if the URL does not match any prefix or
    /// the remaining segment is not a plausible texture hash.
    pub fn key_for(&self, url: &str) -> Result<ArtifactKey, KeyError> {
        let segment = self
            .prefixes
            .iter()
            .find_map(|prefix| url.strip_prefix(prefix.as_str()))
            .ok_or_else(|| KeyError::UnknownPrefix {
                url: url.to_string(),
            })?;
        ArtifactKey::parse(segment, url)
    }
}

/// One unit of work: download a descriptor's texture and commit it.
///
/// Owned exclusively by the task queue from creation until its terminal
/// event fires.
#[derive(Debug, Clone)]
pub struct Task {
    /// Unique id assigned at admission; carried by all lifecycle events.
    pub id: Uuid,
    /// Artifact key derived at admission.
    pub key: ArtifactKey,
    /// The catalog record this task downloads.
    pub descriptor: SkinDescriptor,
}

impl Task {
    /// Creates a task with a fresh id.
    #[must_use]
    pub fn new(key: ArtifactKey, descriptor: SkinDescriptor) -> Self {
        Self {
            id: Uuid::new_v4(),
            key,
            descriptor,
        }
    }
}

/// Errors from a single task attempt (fetch, content write, metadata
/// insert). All variants are retried uniformly by the worker pool.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Texture fetch failed.
    #[error("texture fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Content store write failed.
    #[error("artifact write failed: {0}")]
    Store(#[from] StoreError),

    /// Metadata insert failed.
    #[error("metadata insert failed: {0}")]
    Metadata(#[from] MetadataError),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ==================== Key Derivation Tests ====================

    #[test]
    fn test_key_for_strips_https_prefix() {
        let prefix = TexturePrefix::default();
        let key = prefix
            .key_for("https://textures.minecraft.net/texture/abc123DEF")
            .unwrap();
        assert_eq!(key.as_str(), "abc123DEF");
    }

    #[test]
    fn test_key_for_strips_http_prefix() {
        let prefix = TexturePrefix::default();
        let key = prefix
            .key_for("http://textures.minecraft.net/texture/abc123")
            .unwrap();
        assert_eq!(key.as_str(), "abc123");
    }

    #[test]
    fn test_same_url_same_key() {
        let prefix = TexturePrefix::default();
        let url = "https://textures.minecraft.net/texture/00ff00";
        assert_eq!(prefix.key_for(url).unwrap(), prefix.key_for(url).unwrap());
    }

    #[test]
    fn test_key_for_rejects_foreign_url() {
        let prefix = TexturePrefix::default();
        let result = prefix.key_for("https://example.com/texture/abc123");
        assert!(matches!(result, Err(KeyError::UnknownPrefix { .. })));
    }

    #[test]
    fn test_key_for_rejects_empty_segment() {
        let prefix = TexturePrefix::default();
        let result = prefix.key_for("https://textures.minecraft.net/texture/");
        assert!(matches!(result, Err(KeyError::EmptyKey { .. })));
    }

    #[test]
    fn test_key_for_rejects_path_traversal() {
        let prefix = TexturePrefix::default();
        let result = prefix.key_for("https://textures.minecraft.net/texture/../../etc/passwd");
        assert!(matches!(result, Err(KeyError::MalformedKey { .. })));
    }

    #[test]
    fn test_key_for_rejects_query_suffix() {
        let prefix = TexturePrefix::default();
        let result = prefix.key_for("https://textures.minecraft.net/texture/abc?size=64");
        assert!(matches!(result, Err(KeyError::MalformedKey { .. })));
    }

    #[test]
    fn test_custom_prefix() {
        let prefix = TexturePrefix::new("http://127.0.0.1:9999/texture/");
        let key = prefix.key_for("http://127.0.0.1:9999/texture/cafe01").unwrap();
        assert_eq!(key.as_str(), "cafe01");
    }

    // ==================== Segment Validation Tests ====================

    #[test]
    fn test_from_segment_accepts_hex_hash() {
        let key = ArtifactKey::from_segment("3b60a1f6d562f52aaebbf1434f1de147933a3affe0e764fa49ea057536623cd3");
        assert!(key.is_ok());
    }

    #[test]
    fn test_from_segment_rejects_separator() {
        assert!(matches!(
            ArtifactKey::from_segment("a/b"),
            Err(KeyError::MalformedKey { .. })
        ));
    }

    #[test]
    fn test_display_is_raw_segment() {
        let key = ArtifactKey::from_segment("abc123").unwrap();
        assert_eq!(key.to_string(), "abc123");
    }

    // ==================== Task Tests ====================

    #[test]
    fn test_new_tasks_get_distinct_ids() {
        let descriptor = SkinDescriptor {
            id: 1,
            name: None,
            skin_uuid: None,
            uuid: None,
            url: "https://textures.minecraft.net/texture/aa".to_string(),
            time: 0.0,
            variant: None,
        };
        let key = ArtifactKey::from_segment("aa").unwrap();
        let a = Task::new(key.clone(), descriptor.clone());
        let b = Task::new(key, descriptor);
        assert_ne!(a.id, b.id);
    }
}
