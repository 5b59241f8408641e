//! Remote manifest: the authoritative list of desired packages.
//!
//! The manifest is a JSON array of `{ "hash", "filename", "url" }` objects.
//! It is fetched with a single GET and either parses completely or the run
//! stops; a partially understood manifest would schedule spurious removals.

use reqwest::Client;
use serde::Deserialize;

use crate::error::SyncError;
use crate::hash;

/// Where the manifest is published.
pub const DEFAULT_MANIFEST_URL: &str =
    "https://cloud.zro.gg/s/GAEqgrFQHMZxoQf/download?path=%2F&files=manifest.json";

/// One desired package.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ManifestEntry {
    /// Lowercase hex SHA-256 of the package bytes.
    pub digest: String,
    /// Desired on-disk name.
    pub filename: String,
    pub source_url: String,
    /// Entry lives under the optional "maps" folder.
    pub is_map_asset: bool,
}

impl ManifestEntry {
    pub fn new(
        digest: impl Into<String>,
        filename: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        let source_url = source_url.into();
        Self {
            digest: digest.into().to_ascii_lowercase(),
            filename: filename.into(),
            is_map_asset: is_map_url(&source_url),
            source_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    hash: Option<String>,
    filename: Option<String>,
    url: Option<String>,
}

/// Whether a download URL points into the `maps` folder. Share links carry
/// the folder in an escaped query parameter (`path=%2Fmaps%2F...`); plain
/// URLs carry it as a path segment.
pub fn is_map_url(url: &str) -> bool {
    // Percent-escape hex digits are case-insensitive; the folder name is not.
    url.replace("%2f", "%2F").contains("%2Fmaps%2F") || url.contains("/maps/")
}

fn validate_filename(filename: &str) -> Result<(), String> {
    if filename.is_empty() {
        return Err("empty filename".to_string());
    }
    if filename == "." || filename == ".." {
        return Err(format!("filename '{filename}' is not a file name"));
    }
    if filename.contains(['/', '\\']) {
        return Err(format!("filename '{filename}' contains a path separator"));
    }
    Ok(())
}

fn convert(index: usize, raw: RawEntry) -> Result<ManifestEntry, SyncError> {
    let missing = |field: &str| SyncError::manifest(format!("entry {index} is missing '{field}'"));

    let digest = raw.hash.filter(|h| !h.is_empty()).ok_or_else(|| missing("hash"))?;
    let filename = raw.filename.ok_or_else(|| missing("filename"))?;
    let url = raw.url.filter(|u| !u.is_empty()).ok_or_else(|| missing("url"))?;

    if !hash::is_valid_digest(&digest) {
        return Err(SyncError::manifest(format!(
            "entry {index} ({filename}) has malformed hash '{digest}'"
        )));
    }
    validate_filename(&filename)
        .map_err(|reason| SyncError::manifest(format!("entry {index}: {reason}")))?;

    Ok(ManifestEntry::new(digest, filename, url))
}

/// Parse a manifest body. Any malformed entry rejects the whole manifest.
pub fn parse_manifest(body: &[u8]) -> Result<Vec<ManifestEntry>, SyncError> {
    let raw: Vec<RawEntry> = serde_json::from_slice(body)
        .map_err(|e| SyncError::manifest(format!("invalid manifest JSON: {e}")))?;
    raw.into_iter()
        .enumerate()
        .map(|(i, entry)| convert(i, entry))
        .collect()
}

/// Fetch and parse the manifest at `url`. Only a 2xx response is accepted.
pub async fn fetch_manifest(client: &Client, url: &str) -> Result<Vec<ManifestEntry>, SyncError> {
    tracing::debug!(url, "Downloading manifest");
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| SyncError::manifest(format!("request to {url} failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(SyncError::manifest(format!("HTTP {status} from {url}")));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| SyncError::manifest(format!("reading body from {url} failed: {e}")))?;
    let entries = parse_manifest(&body)?;
    tracing::info!(entries = entries.len(), "Manifest downloaded");
    Ok(entries)
}
