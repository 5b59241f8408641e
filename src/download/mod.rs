//! Download engine: streams manifest entries to disk with digest
//! verification, retries and progress reporting.

pub mod error;
pub mod file;
pub mod rate;

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::manifest::ManifestEntry;
use crate::progress::SyncObserver;
use crate::retry::RetryConfig;

use error::DownloadError;

/// Subset of application config consumed by the download engine.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Connect and read-inactivity timeout. A transfer may take as long as
    /// it needs while bytes keep arriving.
    pub timeout: Duration,
    pub retry: RetryConfig,
    pub concurrent_downloads: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
            concurrent_downloads: 1,
        }
    }
}

/// HTTP client shared by the manifest fetch and every download.
pub fn build_client(config: &DownloadConfig) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(concat!("paksync/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(config.timeout)
        .read_timeout(config.timeout)
        .build()
}

/// Install one manifest entry into `base_dir`, forwarding byte progress to
/// `observer`. Returns the number of bytes written.
pub async fn install_entry(
    client: &Client,
    base_dir: &Path,
    entry: &ManifestEntry,
    config: &DownloadConfig,
    observer: &dyn SyncObserver,
    cancel: &CancellationToken,
) -> Result<u64, DownloadError> {
    let dest = base_dir.join(&entry.filename);
    tracing::debug!(
        filename = %entry.filename,
        url = %entry.source_url,
        "downloading",
    );
    let on_progress = |progress| observer.install_progress(&entry.filename, progress);
    file::download_file(
        client,
        &entry.source_url,
        &dest,
        &entry.digest,
        &config.retry,
        cancel,
        &on_progress,
    )
    .await
}
