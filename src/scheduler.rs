//! Scheduler for the crawler's periodic jobs.
//!
//! The discovery loop and the stats reporter run as explicit scheduled
//! tasks owned by one [`Scheduler`], each independently cancellable,
//! instead of ambient free-running timers. Jobs do not fire before
//! their first full period has elapsed (the crawler's warm-up), and a
//! job that overruns its period simply delays the next firing.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, trace, warn};

/// One scheduled periodic job.
#[derive(Debug)]
struct PeriodicTask {
    name: &'static str,
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Owns every periodic job in the process.
#[derive(Debug, Default)]
pub struct Scheduler {
    tasks: Vec<PeriodicTask>,
}

impl Scheduler {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `job` to run every `period`, starting one period from
    /// now.
    ///
    /// The job runs to completion before the stop signal is observed,
    /// so cancellation never interrupts a tick midway.
    pub fn spawn_periodic<F, Fut>(&mut self, name: &'static str, period: Duration, mut job: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stop, mut stopped) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        trace!(name, "periodic job tick");
                        job().await;
                    }
                    _ = stopped.changed() => break,
                }
            }
            debug!(name, "periodic job stopped");
        });

        debug!(name, period_ms = period.as_millis(), "periodic job scheduled");
        self.tasks.push(PeriodicTask { name, stop, handle });
    }

    /// Cancels one job by name. Returns whether a job was found.
    pub async fn stop(&mut self, name: &str) -> bool {
        let Some(index) = self.tasks.iter().position(|task| task.name == name) else {
            return false;
        };
        let task = self.tasks.swap_remove(index);
        stop_task(task).await;
        true
    }

    /// Cancels every job and waits for each to wind down.
    pub async fn shutdown(self) {
        for task in self.tasks {
            stop_task(task).await;
        }
    }
}

async fn stop_task(task: PeriodicTask) {
    let _ = task.stop.send(true);
    if let Err(error) = task.handle.await {
        warn!(name = task.name, %error, "periodic job panicked");
    }
}
