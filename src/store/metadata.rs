//! SQLite-backed provenance store for downloaded textures.
//!
//! One row per stored artifact, keyed by the catalog's numeric skin id.
//! Inserts are conflict-ignored on the primary key so replaying the same
//! descriptor (a re-crawled page, a process restart) is idempotent. Rows
//! are never updated or deleted by this system.

use std::path::Path;

use thiserror::Error;
use tracing::{instrument, trace};

use crate::catalog::SkinDescriptor;
use crate::db::Database;
use crate::queue::task::ArtifactKey;

/// Errors from metadata store operations.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// Underlying database operation failed.
    #[error("metadata store query failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// A provenance row for one stored artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct SkinRow {
    /// Catalog skin id (primary key).
    pub id: i64,
    /// Skin display name, empty when the catalog omitted it.
    pub name: String,
    /// Skin UUID from the catalog, empty when omitted.
    pub suid: String,
    /// Artifact key (texture hash), also the filename stem.
    pub hash: String,
    /// Owner UUID from the catalog, empty when omitted.
    pub uuid: String,
    /// Catalog timestamp (epoch seconds).
    pub time: f64,
    /// Absolute path of the stored artifact.
    pub path: String,
    /// Application version that wrote the row.
    pub version: String,
}

impl SkinRow {
    /// Builds a row from a catalog descriptor and the stored artifact's
    /// key and absolute path.
    #[must_use]
    pub fn new(descriptor: &SkinDescriptor, key: &ArtifactKey, path: &Path) -> Self {
        Self {
            id: descriptor.id,
            name: descriptor.name.clone().unwrap_or_default(),
            suid: descriptor.skin_uuid.clone().unwrap_or_default(),
            hash: key.as_str().to_string(),
            uuid: descriptor.uuid.clone().unwrap_or_default(),
            time: descriptor.time,
            path: path.display().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Metadata store with insert-or-ignore write semantics.
///
/// All writes flow through the single-connection [`Database`] pool, so
/// concurrent batch workers never contend inside SQLite.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    db: Database,
}

impl MetadataStore {
    /// Creates a metadata store over an open database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts a row, ignoring primary-key conflicts.
    ///
    /// Returns `true` if a row was actually inserted, `false` if a row
    /// with the same id already existed.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Database`] if the insert fails.
    #[instrument(skip(self, row), fields(id = row.id, hash = %row.hash))]
    pub async fn insert_ignore(&self, row: &SkinRow) -> Result<bool, MetadataError> {
        let result = sqlx::query(
            r"INSERT OR IGNORE INTO skins (id, name, suid, hash, uuid, time, path, version)
              VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(row.id)
        .bind(&row.name)
        .bind(&row.suid)
        .bind(&row.hash)
        .bind(&row.uuid)
        .bind(row.time)
        .bind(&row.path)
        .bind(&row.version)
        .execute(self.db.pool())
        .await?;

        let inserted = result.rows_affected() > 0;
        if !inserted {
            trace!(id = row.id, "row already present, insert ignored");
        }
        Ok(inserted)
    }

    /// Checks whether a row with this artifact hash exists.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Database`] if the query fails.
    pub async fn contains_hash(&self, hash: &str) -> Result<bool, MetadataError> {
        let row: (i64,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM skins WHERE hash = ?)")
            .bind(hash)
            .fetch_one(self.db.pool())
            .await?;
        Ok(row.0 != 0)
    }

    /// Returns the number of rows in the table.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Database`] if the query fails.
    pub async fn count(&self) -> Result<i64, MetadataError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM skins")
            .fetch_one(self.db.pool())
            .await?;
        Ok(row.0)
    }

    /// Closes the underlying database, flushing pending writes.
    ///
    /// Must be called on the process exit path.
    pub async fn close(self) {
        self.db.close().await;
    }
}
