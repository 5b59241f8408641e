//! Streaming SHA-256 content digests.
//!
//! A file's digest is its identity: two files with the same digest are the
//! same package no matter what they are called. Digests are lowercase hex.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{IoOp, SyncError};

/// Length of a hex-encoded SHA-256 digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// Read buffer size; bounds memory use regardless of file size.
const CHUNK_SIZE: usize = 64 * 1024;

/// Incremental digest: feed bytes with [`update`](Self::update), then
/// [`finalize`](Self::finalize) into a hex string.
#[derive(Clone, Default)]
pub struct ContentHasher {
    inner: Sha256,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    pub fn finalize(self) -> String {
        hex::encode(self.inner.finalize())
    }
}

/// Hash everything `reader` yields until EOF.
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = ContentHasher::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

/// Hash the file at `path`. Any read failure is fatal for the run: a digest
/// over a partial read would corrupt the diff.
pub fn hash_file(path: &Path) -> Result<String, SyncError> {
    let file = File::open(path).map_err(|e| SyncError::io(IoOp::Hash, path, e))?;
    hash_reader(file).map_err(|e| SyncError::io(IoOp::Hash, path, e))
}

/// Whether `s` looks like a digest this crate produces (case-insensitive).
pub fn is_valid_digest(s: &str) -> bool {
    s.len() == DIGEST_HEX_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}
