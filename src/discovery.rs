//! Discovery loop: periodically samples random catalog pages and feeds
//! the task queue.
//!
//! Each tick draws `PAGES_PER_TICK` independent page indices uniformly
//! in `[0, pages_to_load)`, with replacement, so the same page (and
//! the same descriptors) will be fetched again across ticks. That is
//! expected: the admission filter and the idempotent writes downstream
//! absorb the duplicates. A failed page fetch is logged and dropped for
//! that tick; retry responsibility lives entirely in the task queue.

use std::sync::Arc;

use futures_util::future::join_all;
use rand::Rng;
use tracing::{debug, instrument, trace, warn};

use crate::catalog::CatalogClient;
use crate::queue::{PushOutcome, TaskQueue};

/// Pages sampled per discovery tick.
pub const PAGES_PER_TICK: usize = 4;

/// Periodic driver pushing discovered descriptors into the queue.
#[derive(Debug)]
pub struct Discovery {
    catalog: CatalogClient,
    queue: Arc<TaskQueue>,
    pages_to_load: u32,
}

impl Discovery {
    /// Creates a discovery driver sampling pages in `[0, pages_to_load)`.
    #[must_use]
    pub fn new(catalog: CatalogClient, queue: Arc<TaskQueue>, pages_to_load: u32) -> Self {
        Self {
            catalog,
            queue,
            pages_to_load: pages_to_load.max(1),
        }
    }

    /// Runs one tick: samples page indices and fetches them concurrently.
    ///
    /// Page fetches are independent; one failure does not affect the
    /// others or future ticks.
    #[instrument(skip(self))]
    pub async fn tick(&self) {
        let indices: Vec<u32> = {
            let mut rng = rand::thread_rng();
            (0..PAGES_PER_TICK)
                .map(|_| rng.gen_range(0..self.pages_to_load))
                .collect()
        };

        join_all(indices.into_iter().map(|index| self.load_page(index))).await;
    }

    /// Fetches one catalog page and pushes every descriptor it returned.
    async fn load_page(&self, index: u32) {
        debug!(index, "requesting catalog page");

        let skins = match self.catalog.page(index).await {
            Ok(skins) => skins,
            Err(error) => {
                warn!(index, %error, "catalog page fetch failed");
                return;
            }
        };

        trace!(index, count = skins.len(), "catalog page fetched");
        for descriptor in skins {
            match self.queue.push(descriptor).await {
                Ok(PushOutcome::Queued(task_id)) => {
                    trace!(task_id = %task_id, "descriptor queued");
                }
                Ok(PushOutcome::Rejected(reason)) => {
                    trace!(%reason, "descriptor rejected");
                }
                Err(error) => {
                    warn!(%error, "queue refused descriptor");
                }
            }
        }
    }
}
