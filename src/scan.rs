//! Local inventory: which package files are on disk and what they contain.

use std::path::Path;

use futures_util::stream::{self, StreamExt};

use crate::baseline::BaselineSet;
use crate::error::{IoOp, SyncError};
use crate::hash;
use crate::progress::{Phase, SyncObserver};

/// Package file extension, matched case-insensitively.
pub const PACKAGE_EXTENSION: &str = "pak";

/// One package file found in the scanned directory. Built fresh every run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalFile {
    pub filename: String,
    pub digest: String,
}

impl LocalFile {
    pub fn new(filename: impl Into<String>, digest: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            digest: digest.into(),
        }
    }
}

/// Whether `filename` has the package extension.
pub fn is_package_file(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(PACKAGE_EXTENSION))
}

/// List the package files in `dir` that are not baseline files, sorted by
/// name so downstream output is stable.
pub fn list_candidates(dir: &Path, baseline: &BaselineSet) -> Result<Vec<String>, SyncError> {
    let entries = std::fs::read_dir(dir).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => SyncError::Config {
            path: dir.to_path_buf(),
            reason: "directory does not exist".to_string(),
        },
        _ => SyncError::io(IoOp::List, dir, e),
    })?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| SyncError::io(IoOp::List, dir, e))?;
        let Ok(name) = entry.file_name().into_string() else {
            tracing::warn!(path = %entry.path().display(), "Skipping non-UTF-8 filename");
            continue;
        };
        if !is_package_file(&name) || baseline.contains(&name) {
            continue;
        }
        // Follows symlinks: a linked pak is still a pak.
        let is_file = std::fs::metadata(entry.path())
            .map(|m| m.is_file())
            .map_err(|e| SyncError::io(IoOp::List, &entry.path(), e))?;
        if is_file {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Hash every candidate in `dir` with up to `concurrency` files in flight.
///
/// The first hashing failure aborts the scan. The result is sorted by
/// filename.
pub async fn scan_directory(
    dir: &Path,
    baseline: &BaselineSet,
    concurrency: usize,
    observer: &dyn SyncObserver,
) -> Result<Vec<LocalFile>, SyncError> {
    let names = list_candidates(dir, baseline)?;
    tracing::debug!(count = names.len(), dir = %dir.display(), "Hashing local pak files");
    observer.phase_started(Phase::Hash, names.len() as u64);

    let mut hashed = stream::iter(names)
        .map(|name| {
            let path = dir.join(&name);
            async move {
                let digest = tokio::task::spawn_blocking(move || hash::hash_file(&path)).await??;
                Ok::<_, SyncError>(LocalFile::new(name, digest))
            }
        })
        .buffer_unordered(concurrency.max(1));

    let mut files = Vec::new();
    while let Some(result) = hashed.next().await {
        let file = result?;
        tracing::debug!(filename = %file.filename, digest = %file.digest, "hashed");
        observer.item_completed(Phase::Hash, &file.filename);
        files.push(file);
    }
    observer.phase_finished(Phase::Hash);

    files.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(files)
}
