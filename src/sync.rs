//! One sync run: check directory, scan, fetch manifest, reconcile, execute.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::baseline::BaselineSet;
use crate::download::{self, DownloadConfig};
use crate::error::SyncError;
use crate::execute::Executor;
use crate::manifest::{self, ManifestEntry};
use crate::progress::SyncObserver;
use crate::reconcile::{self, ActionSet};
use crate::report::SyncReport;
use crate::scan;

/// Everything the core needs to know, resolved once at startup.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub directory: PathBuf,
    /// Install entries from the optional maps category.
    pub include_optional: bool,
    pub manifest_url: String,
    pub baseline: BaselineSet,
    pub hash_concurrency: usize,
    pub dry_run: bool,
}

/// The package directory must already exist; it is never created.
pub fn ensure_directory(path: &Path) -> Result<(), SyncError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(SyncError::Config {
            path: path.to_path_buf(),
            reason: "not a directory".to_string(),
        }),
        Err(e) => Err(SyncError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

/// Drop entries the scanner can never see: non-`.pak` names and stock game
/// files. Installing them would repeat on every run.
fn syncable_entries(manifest: Vec<ManifestEntry>, baseline: &BaselineSet) -> Vec<ManifestEntry> {
    manifest
        .into_iter()
        .filter(|entry| {
            let reason = if !scan::is_package_file(&entry.filename) {
                "not a .pak file"
            } else if baseline.contains(&entry.filename) {
                "a stock game file"
            } else {
                return true;
            };
            tracing::warn!(
                filename = %entry.filename,
                url = %entry.source_url,
                "Ignoring manifest entry: {}",
                reason
            );
            false
        })
        .collect()
}

fn log_plan(actions: &ActionSet) {
    if actions.is_empty() {
        tracing::info!("Local paks already match the manifest");
        return;
    }
    tracing::info!(
        total = actions.len(),
        remove = actions.to_remove.len(),
        rename = actions.to_rename.len(),
        install = actions.to_install.len(),
        "Reconciled local paks against manifest"
    );
}

pub async fn run(
    config: &SyncConfig,
    download_config: &DownloadConfig,
    observer: &dyn SyncObserver,
    shutdown: CancellationToken,
) -> Result<SyncReport, SyncError> {
    let started = Instant::now();
    ensure_directory(&config.directory)?;

    let local = scan::scan_directory(
        &config.directory,
        &config.baseline,
        config.hash_concurrency,
        observer,
    )
    .await?;
    tracing::info!(count = local.len(), "Hashed local pak files");

    let client = download::build_client(download_config)?;
    let manifest = manifest::fetch_manifest(&client, &config.manifest_url).await?;
    let manifest = syncable_entries(manifest, &config.baseline);

    let actions = reconcile::reconcile(&local, &manifest, config.include_optional);
    log_plan(&actions);

    if config.dry_run {
        return Ok(SyncReport::planned(&actions, started.elapsed()));
    }

    let executor = Executor::new(
        &config.directory,
        client,
        download_config.clone(),
        observer,
        shutdown,
    );
    let outcome = executor.apply(&local, &actions).await?;
    Ok(SyncReport::from_outcome(outcome, started.elapsed()))
}
