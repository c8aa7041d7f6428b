//! Batch-oriented task queue with a bounded concurrent worker pool.
//!
//! This is the coordination core of the crawler. Discovered descriptors
//! enter through [`TaskQueue::push`], pass the [`AdmissionFilter`], and
//! accumulate into batches of at most `batch_size` tasks. Up to
//! `concurrency` batches are processed simultaneously; the bound is
//! enforced with a semaphore whose permits are held for the whole batch
//! body plus the configured post-batch delay.
//!
//! Each worker, per task: fetches the texture, writes it into the
//! content store, and on a successful write inserts the provenance row.
//! Any I/O failure is retried up to `max_retries` times with
//! `retry_delay` between attempts; exhaustion demotes the task to a
//! logged permanent failure. One task's failure never aborts its batch
//! siblings, and nothing here ever propagates a download error to the
//! caller.
//!
//! Lifecycle events flow through a single emission path which updates
//! the [`QueueStats`] counters, writes the structured data log, and
//! fans out to broadcast subscribers.

pub mod admission;
pub mod events;
pub mod stats;
pub mod task;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, Semaphore, broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub use admission::{Admission, AdmissionFilter, RejectReason};
pub use events::TaskEvent;
pub use stats::{QueueStats, QueueStatsSnapshot};
pub use task::{ArtifactKey, KeyError, Task, TaskError, TexturePrefix};

use crate::catalog::SkinDescriptor;
use crate::store::{ContentStore, MetadataStore, SkinRow};
use crate::texture::TextureClient;

/// Minimum allowed worker concurrency.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed worker concurrency.
const MAX_CONCURRENCY: usize = 100;

/// Maximum allowed batch size.
const MAX_BATCH_SIZE: usize = 1000;

/// Broadcast buffer for lifecycle events.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Default tasks grouped per worker invocation.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Default simultaneous batch-processing workers.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Default per-task retry ceiling.
pub const DEFAULT_MAX_RETRIES: u32 = 32;

/// Default pause before re-attempting a failed task.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(2500);

/// Default pause after a batch completes before its slot takes more work.
pub const DEFAULT_AFTER_PROCESS_DELAY: Duration = Duration::from_millis(500);

/// Operator-tunable queue parameters.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Tasks grouped per worker invocation (1..=1000).
    pub batch_size: usize,
    /// Max simultaneous batch-processing workers (1..=100).
    pub concurrency: usize,
    /// Per-task retry ceiling; 0 means a single attempt.
    pub max_retries: u32,
    /// Pause before re-attempting a failed task.
    pub retry_delay: Duration,
    /// Pause after a batch completes before the slot takes more work.
    pub after_process_delay: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            after_process_delay: DEFAULT_AFTER_PROCESS_DELAY,
        }
    }
}

/// Errors from queue construction and intake.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Invalid batch size provided.
    #[error("invalid batch size {value}: must be between 1 and {MAX_BATCH_SIZE}")]
    InvalidBatchSize {
        /// The invalid value that was provided.
        value: usize,
    },

    /// The queue no longer accepts tasks.
    #[error("task queue is shut down")]
    Closed,
}

/// Acknowledgement for a pushed descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// The task was admitted; carries its assigned id.
    Queued(Uuid),
    /// The task was filtered out; a normal outcome, not an error.
    Rejected(RejectReason),
}

/// Shared state between the queue handle, the dispatcher, and workers.
#[derive(Debug)]
struct QueueInner {
    config: QueueConfig,
    admission: AdmissionFilter,
    texture: TextureClient,
    content: ContentStore,
    metadata: MetadataStore,
    stats: QueueStats,
    events: broadcast::Sender<TaskEvent>,
    semaphore: Arc<Semaphore>,
}

impl QueueInner {
    /// Single emission path for lifecycle events: counters, data log,
    /// broadcast subscribers. Nothing else mutates [`QueueStats`].
    fn emit(&self, event: &TaskEvent) {
        match event {
            TaskEvent::Queued { .. } => self.stats.on_queued(),
            TaskEvent::Started { .. } => self.stats.on_started(),
            TaskEvent::Finished { .. } => self.stats.on_finished(),
            TaskEvent::Failed { .. } => self.stats.on_failed(),
            TaskEvent::BatchFinished { .. } => self.stats.on_batch_finished(),
            TaskEvent::Accepted { .. } | TaskEvent::Progress { .. } => {}
        }

        match event {
            TaskEvent::Queued { task_id }
            | TaskEvent::Accepted { task_id }
            | TaskEvent::Started { task_id } => {
                debug!(target: "data", task_id = %task_id, status = event.status());
            }
            TaskEvent::Progress {
                task_id,
                current,
                total,
            } => {
                debug!(target: "data", task_id = %task_id, status = event.status(), current, total);
            }
            TaskEvent::Finished { task_id, path } => {
                debug!(target: "data", task_id = %task_id, status = event.status(), message = %path.display());
            }
            TaskEvent::Failed { task_id, error } => {
                debug!(target: "data", task_id = %task_id, status = event.status(), message = %error);
            }
            TaskEvent::BatchFinished { tasks } => {
                debug!(target: "data", status = event.status(), tasks);
            }
        }

        // No receivers is fine; the counters and the data log are the
        // canonical record.
        let _ = self.events.send(event.clone());
    }
}

/// Handle to the batch pipeline.
///
/// Cheap to share via `Arc`; the discovery loop pushes into it while
/// the reporter reads [`TaskQueue::stats`].
#[derive(Debug)]
pub struct TaskQueue {
    inner: Arc<QueueInner>,
    intake: Mutex<Option<mpsc::UnboundedSender<Task>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl TaskQueue {
    /// Creates the queue and starts its dispatcher.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidConcurrency`] or
    /// [`QueueError::InvalidBatchSize`] for out-of-range configuration.
    #[instrument(skip_all, fields(
        batch_size = config.batch_size,
        concurrency = config.concurrency,
        max_retries = config.max_retries
    ))]
    pub fn new(
        config: QueueConfig,
        admission: AdmissionFilter,
        texture: TextureClient,
        content: ContentStore,
        metadata: MetadataStore,
    ) -> Result<Self, QueueError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&config.concurrency) {
            return Err(QueueError::InvalidConcurrency {
                value: config.concurrency,
            });
        }
        if !(1..=MAX_BATCH_SIZE).contains(&config.batch_size) {
            return Err(QueueError::InvalidBatchSize {
                value: config.batch_size,
            });
        }

        debug!("creating task queue");

        let (tx, rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let inner = Arc::new(QueueInner {
            semaphore: Arc::new(Semaphore::new(config.concurrency)),
            config,
            admission,
            texture,
            content,
            metadata,
            stats: QueueStats::new(),
            events,
        });

        let dispatcher = tokio::spawn(dispatch(Arc::clone(&inner), rx));

        Ok(Self {
            inner,
            intake: Mutex::new(Some(tx)),
            dispatcher: Mutex::new(Some(dispatcher)),
        })
    }

    /// Runs admission for a discovered descriptor and, if allowed,
    /// queues it as a fresh task.
    ///
    /// Rejection is a normal filtering outcome: the descriptor is
    /// dropped without retry and without surfacing an error.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] if the queue has been drained or
    /// shut down.
    pub async fn push(&self, descriptor: SkinDescriptor) -> Result<PushOutcome, QueueError> {
        match self.inner.admission.admit(&descriptor.url) {
            Admission::Reject(reason) => Ok(PushOutcome::Rejected(reason)),
            Admission::Allow(key) => {
                let task = Task::new(key, descriptor);
                let task_id = task.id;

                let intake = self.intake.lock().await;
                let Some(tx) = intake.as_ref() else {
                    return Err(QueueError::Closed);
                };
                // Emit before handing the task to the dispatcher so a
                // fast worker cannot observe `started` ahead of `queued`.
                self.inner.emit(&TaskEvent::Queued { task_id });
                self.inner.emit(&TaskEvent::Accepted { task_id });
                tx.send(task).map_err(|_| QueueError::Closed)?;
                Ok(PushOutcome::Queued(task_id))
            }
        }
    }

    /// Returns a point-in-time view of the queue counters.
    #[must_use]
    pub fn stats(&self) -> QueueStatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Subscribes to the lifecycle event stream.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.inner.events.subscribe()
    }

    /// Stops intake and processes every task already queued, then waits
    /// for all in-flight batches to finish.
    pub async fn drain(&self) {
        self.intake.lock().await.take();
        if let Some(handle) = self.dispatcher.lock().await.take() {
            if let Err(error) = handle.await {
                warn!(%error, "dispatcher task panicked");
            }
        }
        self.wait_for_workers().await;
    }

    /// Stops intake and the dispatcher immediately, waits for in-flight
    /// batches only, and discards anything still queued.
    pub async fn shutdown(&self) {
        self.intake.lock().await.take();
        if let Some(handle) = self.dispatcher.lock().await.take() {
            handle.abort();
            let _ = handle.await;
        }
        self.wait_for_workers().await;

        let snapshot = self.inner.stats.snapshot();
        if snapshot.remaining > 0 {
            warn!(
                dropped = snapshot.remaining,
                "unprocessed tasks discarded at shutdown"
            );
        }
    }

    /// Blocks until every worker slot is free.
    async fn wait_for_workers(&self) {
        let permits = u32::try_from(self.inner.config.concurrency).unwrap_or(u32::MAX);
        let _ = self.inner.semaphore.acquire_many(permits).await;
    }
}

/// Seals admitted tasks into batches and hands each batch to a worker.
///
/// Exits when the intake channel is closed and fully drained.
async fn dispatch(inner: Arc<QueueInner>, mut rx: mpsc::UnboundedReceiver<Task>) {
    while let Some(first) = rx.recv().await {
        // One permit per in-flight batch; acquired before sealing so a
        // full backlog drains in maximal batches once a slot frees.
        let permit = match Arc::clone(&inner.semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        let mut batch = Vec::with_capacity(inner.config.batch_size);
        batch.push(first);
        while batch.len() < inner.config.batch_size {
            match rx.try_recv() {
                Ok(task) => batch.push(task),
                Err(_) => break,
            }
        }

        debug!(size = batch.len(), "batch sealed");

        let worker = Arc::clone(&inner);
        tokio::spawn(async move {
            let _permit = permit;
            process_batch(&worker, batch).await;
            tokio::time::sleep(worker.config.after_process_delay).await;
        });
    }
}

/// Processes every task in a batch. Task outcomes are independent: a
/// failure is recorded and the loop moves on to the next sibling.
async fn process_batch(inner: &QueueInner, batch: Vec<Task>) {
    let total = batch.len();
    for (index, task) in batch.into_iter().enumerate() {
        inner.emit(&TaskEvent::Started { task_id: task.id });

        match run_task_with_retry(inner, &task).await {
            Ok(path) => {
                info!(task_id = %task.id, path = %path.display(), "task finished");
                inner.emit(&TaskEvent::Finished {
                    task_id: task.id,
                    path,
                });
            }
            Err((error, attempts)) => {
                warn!(
                    task_id = %task.id,
                    url = %task.descriptor.url,
                    %error,
                    attempts,
                    "task failed after all attempts"
                );
                inner.emit(&TaskEvent::Failed {
                    task_id: task.id,
                    error: error.to_string(),
                });
            }
        }

        inner.emit(&TaskEvent::Progress {
            task_id: task.id,
            current: index + 1,
            total,
        });
    }
    inner.emit(&TaskEvent::BatchFinished { tasks: total });
}

/// Runs one task to a terminal outcome, retrying failed attempts up to
/// the configured ceiling with a fixed delay between attempts.
///
/// # Returns
///
/// - `Ok(PathBuf)` - absolute path of the stored artifact
/// - `Err((TaskError, u32))` - last error and total attempt count
async fn run_task_with_retry(
    inner: &QueueInner,
    task: &Task,
) -> Result<PathBuf, (TaskError, u32)> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        debug!(task_id = %task.id, attempt, "attempting task");

        match run_task(inner, task).await {
            Ok(path) => return Ok(path),
            Err(error) => {
                if attempt > inner.config.max_retries {
                    return Err((error, attempt));
                }
                info!(
                    task_id = %task.id,
                    url = %task.descriptor.url,
                    attempt,
                    max_retries = inner.config.max_retries,
                    delay_ms = inner.config.retry_delay.as_millis(),
                    %error,
                    "retrying task"
                );
                inner.stats.on_retry();
                tokio::time::sleep(inner.config.retry_delay).await;
            }
        }
    }
}

/// One attempt: fetch the texture, store the artifact, record the row.
///
/// Nothing is written until the fetch succeeded, so a failed attempt
/// leaves no partial file behind.
async fn run_task(inner: &QueueInner, task: &Task) -> Result<PathBuf, TaskError> {
    let bytes = inner.texture.fetch(&task.descriptor.url).await?;
    let path = inner.content.write(&task.key, &bytes).await?;
    let row = SkinRow::new(&task.descriptor, &task.key, &path);
    inner.metadata.insert_ignore(&row).await?;
    Ok(path)
}
