//! paksync: keeps a Ready Or Not `Paks` directory in step with a remote
//! manifest.
//!
//! Local `.pak` files are identified by SHA-256. Files whose content is not
//! in the manifest are removed, known content under the wrong name is
//! renamed, and anything missing is downloaded with digest verification
//! and retries on transient failures.

#![warn(clippy::all)]

mod baseline;
mod cli;
mod config;
mod download;
mod error;
mod execute;
mod hash;
mod manifest;
mod progress;
mod reconcile;
mod report;
pub mod retry;
mod scan;
mod shutdown;
mod sync;
#[cfg(test)]
mod testutil;
mod types;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use progress::TerminalObserver;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = config::Config::from_cli(cli)?;
    tracing::info!(
        directory = %config.sync.directory.display(),
        sync_maps = config.sync.include_optional,
        dry_run = config.sync.dry_run,
        "Starting paksync"
    );
    tracing::debug!(?config, "Resolved configuration");

    let shutdown = shutdown::install_signal_handler()?;
    let observer = TerminalObserver::new(config.no_progress_bar);

    let report = sync::run(&config.sync, &config.download, &observer, shutdown).await?;

    println!("{report}");

    if !report.is_complete() {
        anyhow::bail!(
            "{} install(s) failed and {} were skipped; run again to retry",
            report.failed.len(),
            report.skipped.len()
        );
    }
    Ok(())
}
