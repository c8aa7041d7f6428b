//! Process-wide queue counters.
//!
//! Mutated only by the queue's own event-emission path; everything else
//! reads a point-in-time [`QueueStatsSnapshot`]. Counters live for the
//! process lifetime and reset only on restart.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Atomic counters tracking the pipeline's progress.
#[derive(Debug, Default)]
pub struct QueueStats {
    remaining: AtomicUsize,
    processing: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    batches: AtomicUsize,
    retried: AtomicUsize,
}

/// Point-in-time view of the queue counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStatsSnapshot {
    /// Tasks queued but not yet started.
    pub remaining: usize,
    /// Tasks started but not yet terminal.
    pub processing: usize,
    /// Tasks that reached `finished`.
    pub total_completed: usize,
    /// Tasks that reached `failed`.
    pub total_failed: usize,
    /// Batches fully processed.
    pub total_batches: usize,
    /// Retry attempts made across all tasks.
    pub total_retried: usize,
}

impl QueueStats {
    /// Creates a stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a consistent-enough snapshot for display and logging.
    #[must_use]
    pub fn snapshot(&self) -> QueueStatsSnapshot {
        QueueStatsSnapshot {
            remaining: self.remaining.load(Ordering::SeqCst),
            processing: self.processing.load(Ordering::SeqCst),
            total_completed: self.completed.load(Ordering::SeqCst),
            total_failed: self.failed.load(Ordering::SeqCst),
            total_batches: self.batches.load(Ordering::SeqCst),
            total_retried: self.retried.load(Ordering::SeqCst),
        }
    }

    /// A task entered the queue.
    pub(crate) fn on_queued(&self) {
        self.remaining.fetch_add(1, Ordering::SeqCst);
    }

    /// A task left the wait queue and a worker picked it up.
    pub(crate) fn on_started(&self) {
        self.remaining.fetch_sub(1, Ordering::SeqCst);
        self.processing.fetch_add(1, Ordering::SeqCst);
    }

    /// A task reached `finished`.
    pub(crate) fn on_finished(&self) {
        self.processing.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    /// A task reached `failed`.
    pub(crate) fn on_failed(&self) {
        self.processing.fetch_sub(1, Ordering::SeqCst);
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    /// A batch finished processing all its tasks.
    pub(crate) fn on_batch_finished(&self) {
        self.batches.fetch_add(1, Ordering::SeqCst);
    }

    /// A failed attempt is about to be retried.
    pub(crate) fn on_retry(&self) {
        self.retried.fetch_add(1, Ordering::SeqCst);
    }
}
