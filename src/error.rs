//! Error types for the fatal phases of a sync run.
//!
//! Install failures are not represented here: they are per-entry
//! [`DownloadError`](crate::download::error::DownloadError)s that get
//! reported and never abort the run.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Filesystem operation that failed, used to name the phase in messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOp {
    List,
    Hash,
    Remove,
    Rename,
}

impl fmt::Display for IoOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IoOp::List => "list",
            IoOp::Hash => "hash",
            IoOp::Remove => "remove",
            IoOp::Rename => "rename",
        })
    }
}

/// Errors that terminate a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The package directory is missing or not a directory.
    #[error("Package directory {path} is not usable: {reason}")]
    Config { path: PathBuf, reason: String },

    /// The manifest could not be fetched or did not parse.
    #[error("Manifest unavailable: {0}")]
    ManifestUnavailable(String),

    /// A local filesystem operation failed.
    #[error("Failed to {op} {path}: {source}")]
    Io {
        op: IoOp,
        path: PathBuf,
        source: std::io::Error,
    },

    /// A rename failed. Carries both ends so the message is actionable.
    #[error("Failed to rename {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    /// The HTTP client could not be constructed.
    #[error("HTTP client setup failed: {0}")]
    Client(#[from] reqwest::Error),

    /// A blocking hash task panicked or was cancelled by the runtime.
    #[error("Hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl SyncError {
    pub fn io(op: IoOp, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn manifest(reason: impl Into<String>) -> Self {
        Self::ManifestUnavailable(reason.into())
    }
}
