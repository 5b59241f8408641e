use thiserror::Error;

/// Why one install failed. These never abort the run; the entry is
/// reported and retried on the next run because its digest is still
/// missing locally.
///
/// `is_retryable()` separates transient failures (server errors, rate
/// limits, dropped connections, truncated bodies) from permanent ones so
/// the retry loop can give up early.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP {status} downloading {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Transfer of {url} failed after {bytes_written} bytes: {source}")]
    Http {
        source: reqwest::Error,
        url: String,
        bytes_written: u64,
    },

    #[error("Digest mismatch for {filename}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        filename: String,
        expected: String,
        actual: String,
    },

    #[error("Disk error: {0}")]
    Disk(#[from] std::io::Error),

    #[error("Download cancelled")]
    Cancelled,

    #[error("Giving up on {url} after {retries} retries: {last_error}")]
    RetriesExhausted {
        retries: u32,
        url: String,
        last_error: String,
    },
}

impl DownloadError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// A digest mismatch is retried: it usually means a truncated transfer,
    /// not a bad manifest.
    pub fn is_retryable(&self) -> bool {
        match self {
            DownloadError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            DownloadError::Http { .. } => true,
            DownloadError::ChecksumMismatch { .. } => true,
            DownloadError::Disk(_) => false,
            DownloadError::Cancelled => false,
            DownloadError::RetriesExhausted { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16) -> DownloadError {
        DownloadError::HttpStatus {
            status,
            url: "https://x/a.pak".into(),
        }
    }

    #[test]
    fn test_client_errors_not_retryable() {
        for code in [400, 401, 403, 404, 410] {
            assert!(!status(code).is_retryable(), "{code}");
        }
    }

    #[test]
    fn test_rate_limit_and_server_errors_retryable() {
        for code in [429, 500, 502, 503, 504] {
            assert!(status(code).is_retryable(), "{code}");
        }
    }

    #[test]
    fn test_checksum_mismatch_retryable() {
        let e = DownloadError::ChecksumMismatch {
            filename: "a.pak".into(),
            expected: "aa".into(),
            actual: "bb".into(),
        };
        assert!(e.is_retryable());
        assert_eq!(e.to_string(), "Digest mismatch for a.pak: expected aa, got bb");
    }

    #[test]
    fn test_local_failures_not_retryable() {
        assert!(!DownloadError::Disk(std::io::Error::other("disk full")).is_retryable());
        assert!(!DownloadError::Cancelled.is_retryable());
    }

    #[tokio::test]
    async fn test_connection_error_retryable() {
        let err = reqwest::Client::new()
            .get("http://127.0.0.1:1")
            .send()
            .await
            .unwrap_err();
        let e = DownloadError::Http {
            source: err,
            url: "http://127.0.0.1:1".into(),
            bytes_written: 0,
        };
        assert!(e.is_retryable());
    }

    #[test]
    fn test_message_includes_url() {
        assert_eq!(status(404).to_string(), "HTTP 404 downloading https://x/a.pak");
    }
}
