//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use skinvault::queue::{DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES};

/// Default page-sampling range.
const DEFAULT_PAGES: u32 = 500;

/// Default discovery tick delay in milliseconds.
const DEFAULT_LOAD_DELAY_MS: u64 = 500;

/// Default download directory when neither `--save-dir` nor `SAVE_DIR`
/// is set.
pub const DEFAULT_SAVE_DIR: &str = "skins";

/// Default metadata database file.
const DEFAULT_DB_PATH: &str = "skins.db";

/// Continuously harvest skin textures from a MineSkin-style catalog.
///
/// The crawler samples random catalog pages on a fixed cadence, skips
/// textures that are already on disk, and downloads the rest through a
/// bounded batch worker pool, recording provenance in SQLite.
#[derive(Parser, Debug)]
#[command(name = "skinvault")]
#[command(author, version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Number of catalog pages to sample random indices from
    #[arg(short = 'p', long, default_value_t = DEFAULT_PAGES, value_parser = clap::value_parser!(u32).range(1..))]
    pub pages: u32,

    /// Delay between discovery ticks in milliseconds
    #[arg(short = 'l', long, default_value_t = DEFAULT_LOAD_DELAY_MS)]
    pub load_delay: u64,

    /// Maximum retries per task (0-100)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_RETRIES, value_parser = clap::value_parser!(u32).range(0..=100))]
    pub retries: u32,

    /// Pause after a batch completes in milliseconds
    #[arg(short = 'a', long, default_value_t = 500)]
    pub process_delay: u64,

    /// Concurrent batch workers (1-100)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrent: u8,

    /// Pause before re-attempting a failed task in milliseconds
    #[arg(short = 'd', long, default_value_t = 2500)]
    pub retry_delay: u64,

    /// Tasks grouped per batch (1-1000)
    #[arg(short = 'b', long, default_value_t = DEFAULT_BATCH_SIZE as u16, value_parser = clap::value_parser!(u16).range(1..=1000))]
    pub batch_size: u16,

    /// Save directory for skins (falls back to SAVE_DIR, then "skins")
    #[arg(short = 's', long)]
    pub save_dir: Option<PathBuf>,

    /// Metadata database file
    #[arg(long, default_value = DEFAULT_DB_PATH)]
    pub db: PathBuf,

    /// Log directory; when set, logs go to rotating files instead of
    /// the terminal
    #[arg(short = 'o', long)]
    pub log_dir: Option<PathBuf>,

    /// Bearer authorization key for the catalog API (currently unused)
    #[arg(short = 'A', long)]
    pub api_key: Option<String>,
}

/// Secondary operations next to the default crawl.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that every stored texture has a matching metadata row
    Validate,
}
