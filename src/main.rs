//! CLI entry point for the skinvault crawler.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use skinvault::app::{self, RunSettings};
use skinvault::catalog::DEFAULT_CATALOG_BASE;
use skinvault::queue::{QueueConfig, TexturePrefix};
use tracing::{debug, info};

mod cli;

use cli::{Args, Command, DEFAULT_SAVE_DIR};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before parsing so SAVE_DIR can act as a default
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // With a log directory, logs go to rotating files and the terminal
    // stays free for the live counter line. The guard must outlive the
    // crawl so buffered records are flushed on exit.
    let _guard = match &args.log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir)?;
            let appender = tracing_appender::rolling::daily(log_dir, "skinvault.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    };

    debug!(?args, "CLI arguments parsed");

    let save_dir = args
        .save_dir
        .clone()
        .or_else(|| std::env::var("SAVE_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SAVE_DIR));

    match args.command {
        Some(Command::Validate) => {
            let report = app::validate(&save_dir, &args.db).await?;
            println!(
                "{} artifacts, {} indexed, {} missing a metadata row",
                report.artifacts,
                report.indexed,
                report.missing.len()
            );
            for key in &report.missing {
                println!("missing: {key}");
            }
            if !report.is_consistent() {
                std::process::exit(1);
            }
        }
        None => {
            info!("skinvault starting");
            println!(
                "Please wait {:.1} seconds while the process warms up...",
                args.load_delay as f64 / 1000.0
            );

            let settings = RunSettings {
                catalog_base: DEFAULT_CATALOG_BASE.to_string(),
                texture_prefix: TexturePrefix::default(),
                pages_to_load: args.pages,
                load_delay: Duration::from_millis(args.load_delay),
                queue: QueueConfig {
                    batch_size: usize::from(args.batch_size),
                    concurrency: usize::from(args.concurrent),
                    max_retries: args.retries,
                    retry_delay: Duration::from_millis(args.retry_delay),
                    after_process_delay: Duration::from_millis(args.process_delay),
                },
                download_dir: save_dir,
                db_path: args.db.clone(),
                show_progress: !args.quiet && std::io::stdout().is_terminal(),
            };

            app::run(settings).await?;
        }
    }

    Ok(())
}
