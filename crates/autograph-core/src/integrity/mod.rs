//! File-integrity gate.
//!
//! When a document is opened, its content fingerprint (streaming SHA-256)
//! is recorded as the trusted baseline. The gate re-verifies the live file
//! against that baseline on a timer and unconditionally before any sign
//! attempt. A detected mismatch is sticky: once the gate has seen the file
//! change it keeps reporting "not verified" even if the content flips back
//! to the original bytes, and only a fresh [`IntegrityGate::open`]
//! restores trust.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

/// Read chunk size for streaming fingerprint computation.
const FINGERPRINT_CHUNK: usize = 64 * 1024;

/// Errors from integrity operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IntegrityError {
    /// The file could not be opened or read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The file that failed to read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// No document has been opened yet.
    #[error("no document is open")]
    NoBaseline,
}

/// The trusted baseline for the currently open document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIntegrityRecord {
    /// Path of the opened document.
    pub path: PathBuf,
    /// Hex-encoded SHA-256 fingerprint computed at open time.
    pub fingerprint: String,
}

/// Computes the streaming SHA-256 fingerprint of a file.
///
/// The file is read in chunks and never loaded wholly into memory. The
/// digest is returned as 64 lowercase hex characters; identical bytes
/// always yield the identical digest.
///
/// # Errors
///
/// Returns [`IntegrityError::Read`] if the file cannot be opened or read.
pub async fn fingerprint_file(path: &Path) -> Result<String, IntegrityError> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|source| IntegrityError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; FINGERPRINT_CHUNK];
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|source| IntegrityError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(&hasher.finalize()))
}

/// Single-slot integrity gate for the currently open document.
#[derive(Debug, Default)]
pub struct IntegrityGate {
    baseline: Option<FileIntegrityRecord>,
    verified: bool,
}

impl IntegrityGate {
    /// Creates a gate with no document open.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fingerprints `path` and records it as the new trusted baseline,
    /// discarding any previous baseline and clearing a sticky mismatch.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrityError::Read`] if the file cannot be read; the
    /// previous baseline is left untouched in that case.
    pub async fn open(&mut self, path: &Path) -> Result<&FileIntegrityRecord, IntegrityError> {
        let fingerprint = fingerprint_file(path).await?;
        debug!(path = %path.display(), %fingerprint, "document opened, baseline recorded");
        self.verified = true;
        Ok(self.baseline.insert(FileIntegrityRecord {
            path: path.to_path_buf(),
            fingerprint,
        }))
    }

    /// Recomputes the live fingerprint and compares it to the baseline.
    ///
    /// Returns the "still verified" flag. A failed comparison (mismatch,
    /// or the file becoming unreadable) is sticky: subsequent calls keep
    /// returning `false` until a fresh [`Self::open`], even if the file
    /// content flips back to the original bytes.
    pub async fn verify(&mut self) -> bool {
        let Some(baseline) = &self.baseline else {
            return false;
        };
        if !self.verified {
            // Sticky mismatch: do not let a passing recheck restore trust.
            return false;
        }
        match fingerprint_file(&baseline.path).await {
            Ok(live) if live == baseline.fingerprint => true,
            Ok(live) => {
                warn!(
                    path = %baseline.path.display(),
                    expected = %baseline.fingerprint,
                    actual = %live,
                    "document changed after open; sign attempts are blocked until re-open"
                );
                self.verified = false;
                false
            }
            Err(error) => {
                warn!(
                    path = %baseline.path.display(),
                    %error,
                    "document became unreadable; sign attempts are blocked until re-open"
                );
                self.verified = false;
                false
            }
        }
    }

    /// The current baseline, if a document is open.
    #[must_use]
    pub fn baseline(&self) -> Option<&FileIntegrityRecord> {
        self.baseline.as_ref()
    }

    /// Last known verification state, without re-reading the file.
    #[must_use]
    pub const fn is_verified(&self) -> bool {
        self.verified
    }
}

/// Hex encoding for digests.
mod hex {
    use std::fmt::Write;

    pub fn encode(bytes: &[u8]) -> String {
        bytes
            .iter()
            .fold(String::with_capacity(bytes.len() * 2), |mut acc, b| {
                let _ = write!(acc, "{b:02x}");
                acc
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// SHA-256 of empty input.
    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[tokio::test]
    async fn empty_file_has_the_well_known_digest() {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        let digest = fingerprint_file(file.path()).await.expect("fingerprint");
        assert_eq!(digest, EMPTY_SHA256);
    }

    #[tokio::test]
    async fn fingerprint_is_deterministic_and_content_addressed() {
        let dir = tempfile::tempdir().expect("temp dir");
        let a = dir.path().join("a.pdf");
        let b = dir.path().join("b.pdf");
        tokio::fs::write(&a, b"%PDF-1.7 content").await.unwrap();
        tokio::fs::write(&b, b"%PDF-1.7 content").await.unwrap();

        let digest_a = fingerprint_file(&a).await.expect("fingerprint a");
        let digest_a2 = fingerprint_file(&a).await.expect("fingerprint a again");
        let digest_b = fingerprint_file(&b).await.expect("fingerprint b");

        assert_eq!(digest_a, digest_a2);
        assert_eq!(digest_a, digest_b, "identical bytes, identical digest");
        assert_eq!(digest_a.len(), 64);
    }

    #[tokio::test]
    async fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let result = fingerprint_file(&dir.path().join("absent.pdf")).await;
        assert!(matches!(result, Err(IntegrityError::Read { .. })));
    }

    #[tokio::test]
    async fn verify_tracks_the_live_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("doc.pdf");
        tokio::fs::write(&path, b"original").await.unwrap();

        let mut gate = IntegrityGate::new();
        gate.open(&path).await.expect("open");
        assert!(gate.verify().await);

        tokio::fs::write(&path, b"original plus").await.unwrap();
        assert!(!gate.verify().await);
    }

    #[tokio::test]
    async fn mismatch_is_sticky_until_reopen() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("doc.pdf");
        tokio::fs::write(&path, b"original").await.unwrap();

        let mut gate = IntegrityGate::new();
        gate.open(&path).await.expect("open");

        tokio::fs::write(&path, b"tampered").await.unwrap();
        assert!(!gate.verify().await);

        // Flip the content back: the gate must not be fooled.
        tokio::fs::write(&path, b"original").await.unwrap();
        assert!(!gate.verify().await);
        assert!(!gate.is_verified());

        // Only a fresh open restores trust.
        gate.open(&path).await.expect("re-open");
        assert!(gate.verify().await);
    }

    #[tokio::test]
    async fn verify_without_baseline_is_false() {
        let mut gate = IntegrityGate::new();
        assert!(!gate.verify().await);
    }

    #[tokio::test]
    async fn open_replaces_the_previous_baseline() {
        let dir = tempfile::tempdir().expect("temp dir");
        let first = dir.path().join("first.pdf");
        let second = dir.path().join("second.pdf");
        tokio::fs::write(&first, b"first").await.unwrap();
        tokio::fs::write(&second, b"second").await.unwrap();

        let mut gate = IntegrityGate::new();
        gate.open(&first).await.expect("open first");
        gate.open(&second).await.expect("open second");

        assert_eq!(gate.baseline().unwrap().path, second);
        assert!(gate.verify().await);
    }
}
