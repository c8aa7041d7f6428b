//! Admission filter: decides whether a discovered descriptor enters a
//! batch at all.
//!
//! The filter derives the artifact key from the texture URL and checks
//! the content store for an existing artifact. The check-then-act is
//! inherently racy under concurrent admission of the same key within
//! one discovery burst; that is accepted because the eventual writes
//! are idempotent (overwrite-by-key file, insert-or-ignore row), so
//! duplicate in-flight downloads converge to one consistent end state.

use std::fmt;

use tracing::trace;

use super::task::{ArtifactKey, KeyError, TexturePrefix};
use crate::store::ContentStore;

/// Why a task was not admitted.
///
/// Rejections are a normal filtering outcome, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// An artifact with this key is already in the content store.
    AlreadyDownloaded,
    /// No artifact key could be derived from the texture URL.
    InvalidKey(KeyError),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyDownloaded => f.write_str("already_downloaded"),
            Self::InvalidKey(err) => write!(f, "invalid_key: {err}"),
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The task may enter a batch; carries the derived key.
    Allow(ArtifactKey),
    /// The task is dropped; no retry, no error surfaced.
    Reject(RejectReason),
}

/// Dedup/filter stage in front of the batch queue.
#[derive(Debug, Clone)]
pub struct AdmissionFilter {
    content: ContentStore,
    prefix: TexturePrefix,
}

impl AdmissionFilter {
    /// Creates a filter checking against the given content store.
    #[must_use]
    pub fn new(content: ContentStore, prefix: TexturePrefix) -> Self {
        Self { content, prefix }
    }

    /// Decides admit/reject for a texture URL.
    pub fn admit(&self, url: &str) -> Admission {
        let key = match self.prefix.key_for(url) {
            Ok(key) => key,
            Err(err) => {
                trace!(url, error = %err, "admission rejected: key derivation failed");
                return Admission::Reject(RejectReason::InvalidKey(err));
            }
        };

        if self.content.exists(&key) {
            trace!(url, key = %key, "admission rejected: already downloaded");
            return Admission::Reject(RejectReason::AlreadyDownloaded);
        }

        trace!(url, key = %key, "admission passed");
        Admission::Allow(key)
    }
}
