use std::path::{Path, PathBuf};
use std::time::Instant;

use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use super::error::DownloadError;
use super::rate::RateMeter;
use crate::hash::ContentHasher;
use crate::progress::TransferProgress;
use crate::retry::{self, RetryAction, RetryConfig};

/// Temp path for an in-flight download, named after the expected digest so
/// concurrent downloads of different packages never share one, and so the
/// scanner (which only looks at `.pak`) never picks it up.
pub fn temp_download_path(download_path: &Path, digest: &str) -> PathBuf {
    let dir = download_path.parent().unwrap_or_else(|| Path::new("."));
    dir.join(format!("{digest}.part"))
}

/// Download `url` to `download_path`, verifying the SHA-256 of the streamed
/// bytes against `expected_digest`.
///
/// Bytes go to a `.part` file that is renamed over `download_path` only once
/// the whole body arrived and the digest matched, so `download_path` never
/// holds a partial package. Each attempt starts from scratch; transient
/// failures are retried with backoff. Returns the number of bytes written.
pub async fn download_file(
    client: &Client,
    url: &str,
    download_path: &Path,
    expected_digest: &str,
    retry_config: &RetryConfig,
    cancel: &CancellationToken,
    on_progress: &(dyn Fn(TransferProgress) + Send + Sync),
) -> Result<u64, DownloadError> {
    let part_path = temp_download_path(download_path, expected_digest);
    let part_path = part_path.as_path();

    let result = retry::retry_with_backoff(
        retry_config,
        cancel,
        |e: &DownloadError| {
            if e.is_retryable() {
                RetryAction::Retry
            } else {
                RetryAction::Abort
            }
        },
        |_| async move {
            let _ = fs::remove_file(part_path).await;
            let attempt = attempt_download(
                client,
                url,
                download_path,
                part_path,
                expected_digest,
                cancel,
                on_progress,
            )
            .await;
            if attempt.is_err() {
                let _ = fs::remove_file(part_path).await;
            }
            attempt
        },
    )
    .await;

    match result {
        Ok(bytes) => Ok(bytes),
        Err(_) if cancel.is_cancelled() => Err(DownloadError::Cancelled),
        Err(e) if e.is_retryable() && retry_config.max_retries > 0 => {
            Err(DownloadError::RetriesExhausted {
                retries: retry_config.max_retries,
                url: url.to_string(),
                last_error: e.to_string(),
            })
        }
        Err(e) => Err(e),
    }
}

/// One attempt: stream, hash, verify, move into place.
async fn attempt_download(
    client: &Client,
    url: &str,
    download_path: &Path,
    part_path: &Path,
    expected_digest: &str,
    cancel: &CancellationToken,
    on_progress: &(dyn Fn(TransferProgress) + Send + Sync),
) -> Result<u64, DownloadError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| DownloadError::Http {
            source: e,
            url: url.to_string(),
            bytes_written: 0,
        })?;

    if !response.status().is_success() {
        return Err(DownloadError::HttpStatus {
            status: response.status().as_u16(),
            url: url.to_string(),
        });
    }

    let total = response.content_length().unwrap_or(0);
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(part_path)
        .await?;

    let mut hasher = ContentHasher::new();
    let mut meter = RateMeter::default();
    let mut loaded: u64 = 0;
    on_progress(TransferProgress {
        loaded,
        total,
        bytes_per_sec: meter.record(Instant::now(), loaded),
    });

    let mut stream = response.bytes_stream();
    loop {
        let next = tokio::select! {
            chunk = stream.next() => chunk,
            _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
        };
        let Some(chunk) = next else {
            break;
        };
        let chunk = chunk.map_err(|e| {
            tracing::debug!(url, total, loaded, "Body error: {}", e);
            DownloadError::Http {
                source: e,
                url: url.to_string(),
                bytes_written: loaded,
            }
        })?;
        hasher.update(&chunk);
        file.write_all(&chunk).await?;
        loaded += chunk.len() as u64;
        on_progress(TransferProgress {
            loaded,
            total,
            bytes_per_sec: meter.record(Instant::now(), loaded),
        });
    }
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    let actual = hasher.finalize();
    if !actual.eq_ignore_ascii_case(expected_digest) {
        return Err(DownloadError::ChecksumMismatch {
            filename: download_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            expected: expected_digest.to_string(),
            actual,
        });
    }

    fs::rename(part_path, download_path).await?;
    Ok(loaded)
}
