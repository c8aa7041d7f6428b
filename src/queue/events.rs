//! Per-task lifecycle events emitted by the queue.
//!
//! For every task the observed sequence is a subsequence of
//! `queued → accepted → started → (finished | failed)`, with the
//! terminal event occurring exactly once. Batch-level events
//! (`progress`, `batch_finished`) interleave with task events.

use std::path::PathBuf;

use uuid::Uuid;

/// A lifecycle event for a task or batch.
#[derive(Debug, Clone)]
pub enum TaskEvent {
    /// Task passed admission and entered the queue.
    Queued {
        /// The task this event belongs to.
        task_id: Uuid,
    },
    /// Task was accepted for batching.
    Accepted {
        /// The task this event belongs to.
        task_id: Uuid,
    },
    /// A worker began processing the task.
    Started {
        /// The task this event belongs to.
        task_id: Uuid,
    },
    /// Position of a task's completion within its batch.
    Progress {
        /// The task that just reached a terminal state.
        task_id: Uuid,
        /// Tasks of this batch processed so far.
        current: usize,
        /// Total tasks in this batch.
        total: usize,
    },
    /// Artifact and metadata row durably written.
    Finished {
        /// The task this event belongs to.
        task_id: Uuid,
        /// Absolute path of the stored artifact.
        path: PathBuf,
    },
    /// Retries exhausted; carries the last failure.
    Failed {
        /// The task this event belongs to.
        task_id: Uuid,
        /// Rendered last error.
        error: String,
    },
    /// A batch finished processing all its tasks.
    BatchFinished {
        /// Number of tasks the batch contained.
        tasks: usize,
    },
}

impl TaskEvent {
    /// Short status tag used by the structured data log.
    #[must_use]
    pub fn status(&self) -> &'static str {
        match self {
            Self::Queued { .. } => "queued",
            Self::Accepted { .. } => "accepted",
            Self::Started { .. } => "started",
            Self::Progress { .. } => "progress",
            Self::Finished { .. } => "finished",
            Self::Failed { .. } => "failed",
            Self::BatchFinished { .. } => "batch_finished",
        }
    }

    /// The task this event belongs to, if it is task-scoped.
    #[must_use]
    pub fn task_id(&self) -> Option<Uuid> {
        match self {
            Self::Queued { task_id }
            | Self::Accepted { task_id }
            | Self::Started { task_id }
            | Self::Progress { task_id, .. }
            | Self::Finished { task_id, .. }
            | Self::Failed { task_id, .. } => Some(*task_id),
            Self::BatchFinished { .. } => None,
        }
    }

    /// Whether this is a terminal task event.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished { .. } | Self::Failed { .. })
    }
}
