//! Live counter display for the crawler.
//!
//! Renders the queue counters as a single updating terminal line. The
//! reporter is strictly read-only: it consumes [`QueueStatsSnapshot`]s
//! and never touches the queue itself.

use indicatif::{ProgressBar, ProgressStyle};

use crate::queue::QueueStatsSnapshot;

/// Single-line spinner showing queue counters.
#[derive(Debug, Clone)]
pub struct Reporter {
    spinner: ProgressBar,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter {
    /// Creates the spinner line.
    #[must_use]
    pub fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        Self { spinner }
    }

    /// Renders a snapshot onto the spinner line.
    pub fn render(&self, snapshot: &QueueStatsSnapshot) {
        self.spinner.tick();
        self.spinner.set_message(format_message(snapshot));
    }

    /// Clears the spinner line.
    pub fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

fn format_message(snapshot: &QueueStatsSnapshot) -> String {
    format!(
        "SKINS: {} stored / {} in-queue / {} processing / {} failed",
        snapshot.total_completed, snapshot.remaining, snapshot.processing, snapshot.total_failed
    )
}
