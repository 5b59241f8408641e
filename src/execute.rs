//! Applies an [`ActionSet`] to the package directory.
//!
//! Phases run strictly in the order remove, rename, install: removals free
//! names before renames claim them, and renames settle before any install
//! writes. Remove and rename failures abort the run; install failures are
//! recorded per entry and the remaining installs still run.

use std::path::{Path, PathBuf};

use futures_util::stream::{self, StreamExt};
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::download::error::DownloadError;
use crate::download::{self, DownloadConfig};
use crate::error::{IoOp, SyncError};
use crate::hash;
use crate::manifest::ManifestEntry;
use crate::progress::{Phase, SyncObserver};
use crate::reconcile::{self, ActionSet, RenameStep};
use crate::scan::LocalFile;

/// An install that did not complete.
#[derive(Debug)]
pub struct FailedInstall {
    pub entry: ManifestEntry,
    pub error: DownloadError,
}

/// What the executor actually did.
#[derive(Debug, Default)]
pub struct ExecutionOutcome {
    pub removed: Vec<String>,
    /// `(old, new)` pairs as scheduled by the reconciler.
    pub renamed: Vec<(String, String)>,
    /// Redundant copies deleted during the rename phase.
    pub discarded: Vec<String>,
    pub installed: Vec<ManifestEntry>,
    pub failed: Vec<FailedInstall>,
    /// Installs never started because shutdown was requested.
    pub skipped: Vec<ManifestEntry>,
    pub bytes_downloaded: u64,
}

pub struct Executor<'a> {
    base_dir: PathBuf,
    client: Client,
    config: DownloadConfig,
    observer: &'a dyn SyncObserver,
    shutdown: CancellationToken,
}

impl<'a> Executor<'a> {
    pub fn new(
        base_dir: impl Into<PathBuf>,
        client: Client,
        config: DownloadConfig,
        observer: &'a dyn SyncObserver,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            base_dir: base_dir.into(),
            client,
            config,
            observer,
            shutdown,
        }
    }

    /// Apply `actions`, which were computed from `local`.
    pub async fn apply(
        &self,
        local: &[LocalFile],
        actions: &ActionSet,
    ) -> Result<ExecutionOutcome, SyncError> {
        let mut outcome = ExecutionOutcome::default();

        self.sweep_leftovers().await;
        outcome.removed = self.remove_all(&actions.to_remove).await?;

        let steps = reconcile::plan_renames(local, actions);
        outcome.discarded = self.rename_all(&steps).await?;
        outcome.renamed = actions
            .to_rename
            .iter()
            .map(|r| (r.local.filename.clone(), r.entry.filename.clone()))
            .collect();

        self.install_all(&actions.to_install, &mut outcome).await;
        Ok(outcome)
    }

    /// Delete `.part` downloads and rename staging files left by a killed
    /// run. Must run before any install starts.
    async fn sweep_leftovers(&self) {
        let mut entries = match tokio::fs::read_dir(&self.base_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %self.base_dir.display(), "Skipping leftover sweep: {}", e);
                return;
            }
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if !is_leftover(&name) {
                continue;
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => tracing::info!(filename = %name, "Removed leftover from an interrupted run"),
                Err(e) => tracing::warn!(filename = %name, "Could not remove leftover: {}", e),
            }
        }
    }

    fn path(&self, filename: &str) -> PathBuf {
        self.base_dir.join(filename)
    }

    async fn remove_all(&self, files: &[LocalFile]) -> Result<Vec<String>, SyncError> {
        if files.is_empty() {
            return Ok(Vec::new());
        }
        self.observer.phase_started(Phase::Remove, files.len() as u64);
        let mut removed = Vec::with_capacity(files.len());
        for file in files {
            remove(&self.path(&file.filename)).await?;
            tracing::debug!(filename = %file.filename, "removed");
            self.observer.item_completed(Phase::Remove, &file.filename);
            removed.push(file.filename.clone());
        }
        self.observer.phase_finished(Phase::Remove);
        Ok(removed)
    }

    /// Run the rename plan. Returns the names of discarded duplicates.
    async fn rename_all(&self, steps: &[RenameStep]) -> Result<Vec<String>, SyncError> {
        if steps.is_empty() {
            return Ok(Vec::new());
        }
        self.observer.phase_started(Phase::Rename, steps.len() as u64);
        let mut discarded = Vec::new();
        for step in steps {
            match step {
                RenameStep::Move { from, to } => {
                    let (src, dst) = (self.path(from), self.path(to));
                    tokio::fs::rename(&src, &dst)
                        .await
                        .map_err(|e| SyncError::Rename {
                            from: src,
                            to: dst,
                            source: e,
                        })?;
                    tracing::debug!(from = %from, to = %to, "renamed");
                    self.observer.item_completed(Phase::Rename, to);
                }
                RenameStep::Discard { name, kept } => {
                    remove(&self.path(name)).await?;
                    tracing::info!("Removed {} (same content as {})", name, kept);
                    self.observer.item_completed(Phase::Rename, name);
                    discarded.push(name.clone());
                }
            }
        }
        self.observer.phase_finished(Phase::Rename);
        Ok(discarded)
    }

    async fn install_all(&self, entries: &[ManifestEntry], outcome: &mut ExecutionOutcome) {
        let count = entries.len();
        let concurrency = self.config.concurrent_downloads.max(1);

        let mut results = stream::iter(entries.iter().enumerate())
            .take_while(|_| std::future::ready(!self.shutdown.is_cancelled()))
            .map(|(i, entry)| async move {
                self.observer.install_started(&entry.filename, i + 1, count);
                let result = download::install_entry(
                    &self.client,
                    &self.base_dir,
                    entry,
                    &self.config,
                    self.observer,
                    &self.shutdown,
                )
                .await;
                self.observer
                    .install_finished(&entry.filename, result.as_ref().map(|_| ()));
                (i, result)
            })
            .buffer_unordered(concurrency);

        let mut finished = Vec::with_capacity(count);
        while let Some((i, result)) = results.next().await {
            let entry = &entries[i];
            match &result {
                Ok(bytes) => {
                    tracing::debug!(filename = %entry.filename, bytes, "installed");
                }
                Err(error) => {
                    self.observer.suspend(&mut || {
                        tracing::error!(
                            "Install failed: {} from {}: {}",
                            entry.filename,
                            entry.source_url,
                            error
                        );
                    });
                }
            }
            finished.push((i, result));
        }

        // Completion order depends on the network; report in manifest order.
        finished.sort_by_key(|(i, _)| *i);
        let mut attempted = vec![false; count];
        for (i, result) in finished {
            attempted[i] = true;
            let entry = entries[i].clone();
            match result {
                Ok(bytes) => {
                    outcome.bytes_downloaded += bytes;
                    outcome.installed.push(entry);
                }
                Err(error) => outcome.failed.push(FailedInstall { entry, error }),
            }
        }

        outcome.skipped = entries
            .iter()
            .zip(attempted)
            .filter(|(_, done)| !done)
            .map(|(entry, _)| entry.clone())
            .collect();
        if !outcome.skipped.is_empty() {
            tracing::info!(
                "Shutdown requested, {} installs not started",
                outcome.skipped.len()
            );
        }
    }
}

/// `<digest>.part` from an unfinished download, or `<name>.paksync-rename`
/// from an unfinished rename cycle.
fn is_leftover(name: &str) -> bool {
    if let Some(digest) = name.strip_suffix(".part") {
        return hash::is_valid_digest(digest);
    }
    name.ends_with(reconcile::RENAME_STAGING_SUFFIX)
}

async fn remove(path: &Path) -> Result<(), SyncError> {
    tokio::fs::remove_file(path)
        .await
        .map_err(|e| SyncError::io(IoOp::Remove, path, e))
}
