//! Wire protocol of the external signer process.
//!
//! One JSON object is written to the signer's standard input, and exactly
//! one JSON object is expected on its standard output at exit. Exit code
//! zero is required for the response to be considered well-formed at all;
//! the response is parsed only after the process has exited.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The request object written to the signer's stdin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignerRequest {
    /// Source document path.
    pub pdf_path: PathBuf,
    /// Where the signer must write the signed document.
    pub output_path: PathBuf,
    /// Hex SHA-256 fingerprint of the source document, verified again by
    /// the signer before embedding the signature.
    pub file_hash: String,
    /// Zero-based page index for the signature placement.
    pub page: u32,
    /// Placement rectangle in document points.
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Whether to render a visible signature appearance.
    pub visible: bool,
    /// Signing reason embedded in the signature dictionary.
    pub reason: String,
    /// Signing location embedded in the signature dictionary.
    pub location: String,
}

/// The response object read from the signer's stdout.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SignerResponse {
    /// Whether the signer reports success.
    pub success: bool,
    /// Path of the signed output, present on success.
    #[serde(default)]
    pub output_path: Option<PathBuf>,
    /// Human-readable success message.
    #[serde(default)]
    pub message: Option<String>,
    /// Failure description, present when `success` is false.
    #[serde(default)]
    pub error: Option<String>,
    /// Signer-side stack trace for diagnostics.
    #[serde(default)]
    pub traceback: Option<String>,
}
