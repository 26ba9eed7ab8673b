//! External signer orchestration.
//!
//! The cryptographic signing itself is delegated to an opaque external
//! process. [`SigningOrchestrator`] resolves the signer executable, spawns
//! it, writes one JSON request to its standard input, accumulates its
//! standard output and standard error separately until it exits, and only
//! then interprets the result. This is a batch protocol, not a streaming
//! one.
//!
//! # Outcome classification
//!
//! - exit 0 with a parseable response object: resolved — a reported
//!   failure (`success: false`) is a well-formed [`SignResult::Failure`],
//!   not a transport error
//! - exit 0 with unparseable stdout: [`SignerError::OutputParse`],
//!   carrying the raw text for diagnostics
//! - non-zero exit: [`SignerError::NonZeroExit`] with the exit code and
//!   accumulated stderr
//! - spawn failure: [`SignerError::NotFound`] for a missing executable,
//!   [`SignerError::Spawn`] for any other OS-level error
//!
//! No timeout is imposed: the contract is "no response without an
//! eventual exit or spawn error". A second sign call while one is in
//! flight is rejected with [`SignerError::Busy`] instead of queueing.

use std::path::PathBuf;
use std::process::Stdio;

use autograph_core::config::SignerConfig;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::events::EventBus;

pub mod protocol;

use protocol::{SignerRequest, SignerResponse};

/// Default reason embedded in the signature when the request omits one.
const DEFAULT_REASON: &str = "Document approval";

/// Default location embedded in the signature when the request omits one.
const DEFAULT_LOCATION: &str = "Belgium";

/// A request to sign one document.
///
/// The fingerprint must be the one computed when the document was opened;
/// the caller's integrity gate has already vouched for it, but the
/// orchestrator still refuses a request without one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRequest {
    /// Source document path.
    pub document_path: PathBuf,
    /// Hex SHA-256 fingerprint recorded at document-open time.
    #[serde(default)]
    pub fingerprint: String,
    /// Zero-based page index.
    #[serde(default)]
    pub page: u32,
    /// Placement rectangle in document points.
    #[serde(default = "default_x")]
    pub x: f64,
    #[serde(default = "default_y")]
    pub y: f64,
    #[serde(default = "default_width")]
    pub width: f64,
    #[serde(default = "default_height")]
    pub height: f64,
    /// Whether to render a visible signature appearance.
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Signing reason; defaulted if absent.
    #[serde(default)]
    pub reason: Option<String>,
    /// Signing location; defaulted if absent.
    #[serde(default)]
    pub location: Option<String>,
}

const fn default_x() -> f64 {
    100.0
}

const fn default_y() -> f64 {
    100.0
}

const fn default_width() -> f64 {
    200.0
}

const fn default_height() -> f64 {
    60.0
}

const fn default_visible() -> bool {
    true
}

/// Outcome of a completed signer exchange.
///
/// A reported failure is a resolved outcome, distinct from the transport
/// errors in [`SignerError`]: the user sees "document could not be
/// signed" rather than "signing tool unavailable".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignResult {
    /// The signer produced a signed document.
    Success {
        /// Path of the signed output.
        output_path: PathBuf,
        /// Signer-provided success message.
        message: Option<String>,
    },
    /// The signer ran to completion but reported a failure.
    Failure {
        /// Failure description.
        error: String,
        /// Signer-side stack trace for diagnostics.
        traceback: Option<String>,
    },
}

/// Transport-level signing errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SignerError {
    /// The request carries no fingerprint.
    #[error("signing request carries no document fingerprint")]
    MissingFingerprint,

    /// Another signing operation is already in flight.
    #[error("a signing operation is already in flight")]
    Busy,

    /// The signer executable does not exist.
    #[error("signer executable not found at {path}")]
    NotFound {
        /// The path that was probed or spawned.
        path: PathBuf,
    },

    /// The signer process could not be spawned for another OS-level
    /// reason.
    #[error("failed to spawn signer: {source}")]
    Spawn {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The request could not be encoded as JSON.
    #[error("failed to encode signer request: {message}")]
    RequestEncode {
        /// Description of the encoding failure.
        message: String,
    },

    /// The signer exited with a non-zero code.
    #[error("signer exited with code {code}: {stderr}")]
    NonZeroExit {
        /// The exit code (`-1` when terminated by a signal).
        code: i32,
        /// Accumulated standard error text.
        stderr: String,
    },

    /// The signer exited zero but its stdout was not one JSON object.
    #[error("failed to parse signer output: {message}; raw output: {raw}")]
    OutputParse {
        /// Description of the parse failure.
        message: String,
        /// The raw stdout text, kept for diagnostics.
        raw: String,
    },
}

/// Resolved signer invocation: program, arguments, working directory.
#[derive(Debug, Clone)]
struct SignerInvocation {
    program: PathBuf,
    args: Vec<String>,
    cwd: Option<PathBuf>,
}

/// Drives the external signer process, one request at a time.
pub struct SigningOrchestrator {
    config: SignerConfig,
    events: EventBus,
    in_flight: Semaphore,
}

impl SigningOrchestrator {
    /// Creates an orchestrator publishing progress on `events`.
    #[must_use]
    pub fn new(config: SignerConfig, events: EventBus) -> Self {
        Self {
            config,
            events,
            in_flight: Semaphore::new(1),
        }
    }

    /// Signs a document via the external signer.
    ///
    /// The caller must already have confirmed integrity-gate approval for
    /// `request.fingerprint`; this method does not re-verify the file, it
    /// only refuses a request with no fingerprint at all.
    ///
    /// # Errors
    ///
    /// Any [`SignerError`]. Note that a signer-reported failure resolves
    /// to `Ok(SignResult::Failure { .. })`, not an error.
    pub async fn sign(&self, request: &SignRequest) -> Result<SignResult, SignerError> {
        if request.fingerprint.trim().is_empty() {
            return Err(SignerError::MissingFingerprint);
        }
        let _permit = self
            .in_flight
            .try_acquire()
            .map_err(|_| SignerError::Busy)?;

        let output_path = signed_output_path();
        let wire = SignerRequest {
            pdf_path: request.document_path.clone(),
            output_path: output_path.clone(),
            file_hash: request.fingerprint.clone(),
            page: request.page,
            x: request.x,
            y: request.y,
            width: request.width,
            height: request.height,
            visible: request.visible,
            reason: request
                .reason
                .clone()
                .unwrap_or_else(|| DEFAULT_REASON.to_string()),
            location: request
                .location
                .clone()
                .unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
        };
        let payload = serde_json::to_vec(&wire).map_err(|e| SignerError::RequestEncode {
            message: e.to_string(),
        })?;

        let invocation = self.locate_signer()?;
        debug!(
            program = %invocation.program.display(),
            document = %request.document_path.display(),
            "spawning signer"
        );

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);
        if let Some(cwd) = &invocation.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                SignerError::NotFound {
                    path: invocation.program.clone(),
                }
            } else {
                SignerError::Spawn { source }
            }
        })?;

        // Best-effort progress side channel, independent of the eventual
        // resolution.
        self.events
            .progress("started", "Initializing signature process...");

        if let Some(mut stdin) = child.stdin.take() {
            // A write failure here means the signer already exited; the
            // exit-code classification below is authoritative.
            if let Err(error) = stdin.write_all(&payload).await {
                warn!(%error, "failed to write signer request");
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| SignerError::Spawn { source })?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(SignerError::NonZeroExit {
                code: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        let response: SignerResponse =
            serde_json::from_str(stdout.trim()).map_err(|e| SignerError::OutputParse {
                message: e.to_string(),
                raw: stdout.clone(),
            })?;

        if response.success {
            let output_path = response.output_path.unwrap_or(output_path);
            info!(output = %output_path.display(), "document signed");
            self.events.complete(&output_path);
            Ok(SignResult::Success {
                output_path,
                message: response.message,
            })
        } else {
            let error = response
                .error
                .unwrap_or_else(|| "signer reported an unspecified failure".to_string());
            warn!(%error, "signer reported failure");
            self.events.error(error.clone());
            Ok(SignResult::Failure {
                error,
                traceback: response.traceback,
            })
        }
    }

    /// Resolves the signer executable: the prebuilt binary when present,
    /// else the interpreter-based development runner when enabled. A
    /// missing binary without the development fallback is fatal.
    fn locate_signer(&self) -> Result<SignerInvocation, SignerError> {
        let binary = &self.config.binary_path;
        if binary.exists() {
            return Ok(SignerInvocation {
                program: binary.clone(),
                args: Vec::new(),
                cwd: None,
            });
        }
        if self.config.dev_fallback {
            let mut parts = self.config.dev_command.iter().cloned();
            let program = parts.next().ok_or_else(|| SignerError::NotFound {
                path: binary.clone(),
            })?;
            debug!(%program, "prebuilt signer missing, using development runner");
            return Ok(SignerInvocation {
                program: PathBuf::from(program),
                args: parts.collect(),
                cwd: self.config.dev_working_dir.clone(),
            });
        }
        Err(SignerError::NotFound {
            path: binary.clone(),
        })
    }
}

/// A fresh, timestamp-qualified output path in the system temp directory.
fn signed_output_path() -> PathBuf {
    std::env::temp_dir().join(format!(
        "autograph_signed_{}.pdf",
        Utc::now().timestamp_millis()
    ))
}
