//! Application runtime: wires the components together and owns the
//! process lifecycle.
//!
//! [`run`] builds the stores, the clients, the queue, and the periodic
//! jobs, then parks on the interrupt signal. The shutdown path stops
//! the timers first, waits for in-flight batches, and closes the
//! metadata store last so pending writes are flushed before exit.
//! [`validate`] is the offline consistency check over an existing
//! store.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::catalog::CatalogClient;
use crate::db::{Database, DbError};
use crate::discovery::Discovery;
use crate::queue::{AdmissionFilter, QueueConfig, QueueError, TaskQueue, TexturePrefix};
use crate::queue::task::ArtifactKey;
use crate::reporter::Reporter;
use crate::scheduler::Scheduler;
use crate::store::{ContentStore, MetadataError, MetadataStore, StoreError};
use crate::texture::TextureClient;

/// How often the live counter line refreshes.
const REPORT_PERIOD: Duration = Duration::from_millis(250);

/// Fatal setup and lifecycle errors. Anything that happens after
/// startup is absorbed by the pipeline instead.
#[derive(Debug, Error)]
pub enum AppError {
    /// Content store root could not be prepared.
    #[error("failed to prepare content store: {0}")]
    Store(#[from] StoreError),

    /// Metadata database could not be opened or migrated.
    #[error("failed to open metadata store: {0}")]
    Db(#[from] DbError),

    /// Metadata query failed during validation.
    #[error("metadata store error: {0}")]
    Metadata(#[from] MetadataError),

    /// Queue configuration was rejected.
    #[error("failed to start task queue: {0}")]
    Queue(#[from] QueueError),

    /// Could not listen for the interrupt signal.
    #[error("failed to wait for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),
}

/// Resolved runtime settings for a crawl.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Catalog API base URL.
    pub catalog_base: String,
    /// Texture URL prefix keys are derived against.
    pub texture_prefix: TexturePrefix,
    /// Page indices are sampled in `[0, pages_to_load)`.
    pub pages_to_load: u32,
    /// Discovery tick period.
    pub load_delay: Duration,
    /// Worker pool parameters.
    pub queue: QueueConfig,
    /// Content store root.
    pub download_dir: PathBuf,
    /// Metadata database file.
    pub db_path: PathBuf,
    /// Whether to draw the live counter line.
    pub show_progress: bool,
}

/// Runs the crawler until the process is interrupted.
///
/// # Errors
///
/// Returns an [`AppError`] only for fatal setup problems (storage
/// roots, database, queue configuration) or a broken signal handler;
/// crawl-time failures are retried or logged by the pipeline.
pub async fn run(settings: RunSettings) -> Result<(), AppError> {
    let content = ContentStore::new(&settings.download_dir)?;
    let db = Database::new(&settings.db_path).await?;
    let metadata = MetadataStore::new(db);

    let admission = AdmissionFilter::new(content.clone(), settings.texture_prefix.clone());
    let queue = Arc::new(TaskQueue::new(
        settings.queue.clone(),
        admission,
        TextureClient::new(),
        content,
        metadata.clone(),
    )?);

    let catalog = CatalogClient::new(settings.catalog_base.clone());
    let discovery = Arc::new(Discovery::new(
        catalog,
        Arc::clone(&queue),
        settings.pages_to_load,
    ));

    let mut scheduler = Scheduler::new();

    info!(
        delay_ms = settings.load_delay.as_millis(),
        pages = settings.pages_to_load,
        "warming up before the first discovery tick"
    );
    {
        let discovery = Arc::clone(&discovery);
        scheduler.spawn_periodic("discovery", settings.load_delay, move || {
            let discovery = Arc::clone(&discovery);
            async move { discovery.tick().await }
        });
    }

    let reporter = settings.show_progress.then(Reporter::new);
    if let Some(reporter) = reporter.clone() {
        let queue = Arc::clone(&queue);
        scheduler.spawn_periodic("reporter", REPORT_PERIOD, move || {
            reporter.render(&queue.stats());
            std::future::ready(())
        });
    }

    tokio::signal::ctrl_c().await.map_err(AppError::Signal)?;
    info!("interrupt received, shutting down");

    scheduler.shutdown().await;
    queue.shutdown().await;
    if let Some(reporter) = reporter {
        reporter.finish();
    }

    let snapshot = queue.stats();
    info!(
        completed = snapshot.total_completed,
        failed = snapshot.total_failed,
        batches = snapshot.total_batches,
        retried = snapshot.total_retried,
        "crawl stopped"
    );

    // Deferred close on the exit path: flush pending writes before the
    // process terminates.
    metadata.close().await;
    Ok(())
}

/// Result of an offline store consistency check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// Artifacts found in the content store.
    pub artifacts: usize,
    /// Artifacts with a matching metadata row.
    pub indexed: usize,
    /// Keys of artifacts without a metadata row.
    pub missing: Vec<ArtifactKey>,
}

impl ValidationReport {
    /// Whether every artifact has a matching metadata row.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Walks the download root and checks each stored artifact for a
/// matching metadata row.
///
/// # Errors
///
/// Returns an [`AppError`] if the store root cannot be listed or the
/// database cannot be queried.
pub async fn validate(download_dir: &Path, db_path: &Path) -> Result<ValidationReport, AppError> {
    let content = ContentStore::new(download_dir)?;
    let db = Database::new(db_path).await?;
    let metadata = MetadataStore::new(db);

    let keys = content.keys()?;
    let mut indexed = 0;
    let mut missing = Vec::new();
    for key in &keys {
        if metadata.contains_hash(key.as_str()).await? {
            indexed += 1;
        } else {
            warn!(key = %key, "stored artifact has no metadata row");
            missing.push(key.clone());
        }
    }

    metadata.close().await;
    Ok(ValidationReport {
        artifacts: keys.len(),
        indexed,
        missing,
    })
}
