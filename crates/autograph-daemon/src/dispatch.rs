//! Command surface consumed by the UI shell.
//!
//! [`Daemon`] is the single service object behind the UI boundary. It
//! owns the card manager, the integrity gate, and the signing
//! orchestrator, and exposes one typed operation per UI command. Card
//! operations return structured response objects rather than raising
//! across the boundary; file and signing operations return results the
//! shell maps onto its own error presentation.
//!
//! The sign path is where the integrity invariant is enforced: a request
//! is honored only if its fingerprint matches the baseline recorded at
//! open time *and* the live file still matches that baseline at the
//! moment of signing. The live check runs unconditionally here, even if
//! the periodic timer verified the document seconds earlier.

use std::path::{Path, PathBuf};

use autograph_core::config::AutographConfig;
use autograph_core::identity::CardIdentityRecord;
use autograph_core::integrity::{IntegrityError, IntegrityGate};
use autograph_core::token::TokenMiddleware;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::card::{CardManager, CardStatus, PollOutcome};
use crate::events::{EventBus, SigningEvent};
use crate::signing::{SignRequest, SignResult, SignerError, SigningOrchestrator};

/// Response of the card-module initialization command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardInitResponse {
    pub success: bool,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response of the identity-record command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<CardIdentityRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response of the photo command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response of the card-module cleanup command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Errors from the sign-document command.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SignDocumentError {
    /// No document has been opened.
    #[error("no document is open")]
    NoDocument,

    /// The document failed integrity verification, or the request does
    /// not carry the fingerprint recorded at open time. Sticky until the
    /// document is re-opened.
    #[error("document failed integrity verification; re-open it to sign")]
    IntegrityMismatch,

    /// Transport-level signer failure.
    #[error(transparent)]
    Signer(#[from] SignerError),
}

/// Errors from the save-signed-output command.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SaveError {
    /// Copying the signed document to its destination failed.
    #[error("failed to save signed document: {0}")]
    Io(#[from] std::io::Error),
}

/// The service object behind the UI boundary.
pub struct Daemon {
    card: CardManager,
    gate: IntegrityGate,
    orchestrator: SigningOrchestrator,
    events: EventBus,
}

impl Daemon {
    /// Builds the service from configuration and a middleware backend.
    #[must_use]
    pub fn new(config: &AutographConfig, middleware: Box<dyn TokenMiddleware>) -> Self {
        let events = EventBus::new();
        Self {
            card: CardManager::new(middleware),
            gate: IntegrityGate::new(),
            orchestrator: SigningOrchestrator::new(config.signer.clone(), events.clone()),
            events,
        }
    }

    /// Subscribes to signing progress notifications.
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<SigningEvent> {
        self.events.subscribe()
    }

    // --- card commands -----------------------------------------------------

    /// Initializes the card middleware (idempotent).
    pub fn initialize_card(&mut self) -> CardInitResponse {
        match self.card.initialize() {
            Ok(connected) => CardInitResponse {
                success: true,
                connected,
                error: None,
            },
            Err(error) => CardInitResponse {
                success: false,
                connected: false,
                error: Some(error.to_string()),
            },
        }
    }

    /// Live reader/card presence.
    pub fn card_status(&mut self) -> CardStatus {
        self.card.status()
    }

    /// Reads the identity record from the inserted card.
    pub fn card_identity(&mut self) -> IdentityResponse {
        match self.card.identity() {
            Ok(data) => IdentityResponse {
                success: true,
                data: Some(data),
                error: None,
            },
            Err(error) => IdentityResponse {
                success: false,
                data: None,
                error: Some(error.to_string()),
            },
        }
    }

    /// Reads the photo from the inserted card as a data URI.
    pub fn card_photo(&mut self) -> PhotoResponse {
        match self.card.photo() {
            Ok(photo) => PhotoResponse {
                success: true,
                photo: Some(photo),
                error: None,
            },
            Err(error) => PhotoResponse {
                success: false,
                photo: None,
                error: Some(error.to_string()),
            },
        }
    }

    /// Finalizes the card middleware. Also runs on application shutdown.
    pub fn cleanup_card(&mut self) -> CleanupResponse {
        self.card.cleanup();
        CleanupResponse {
            success: true,
            error: None,
        }
    }

    /// One card poll tick, driven by the main loop timer.
    pub fn poll_card(&mut self) -> PollOutcome {
        self.card.poll_tick()
    }

    /// The card manager, for state inspection.
    #[must_use]
    pub const fn card(&self) -> &CardManager {
        &self.card
    }

    // --- file commands -----------------------------------------------------

    /// Opens a document: fingerprints it and records the trusted
    /// baseline, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrityError::Read`] if the file cannot be read.
    pub async fn open_document(&mut self, path: &Path) -> Result<String, IntegrityError> {
        let record = self.gate.open(path).await?;
        Ok(record.fingerprint.clone())
    }

    /// Computes the fingerprint of an arbitrary file, without touching
    /// the baseline.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrityError::Read`] if the file cannot be read.
    pub async fn fingerprint(&self, path: &Path) -> Result<String, IntegrityError> {
        autograph_core::integrity::fingerprint_file(path).await
    }

    /// Reads a document's raw bytes for the rendering collaborator.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    pub async fn read_document_bytes(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    /// Whether a document is currently open.
    #[must_use]
    pub fn document_open(&self) -> bool {
        self.gate.baseline().is_some()
    }

    /// Re-verifies the open document against its baseline. Driven by the
    /// periodic timer and by the sign path.
    pub async fn verify_document(&mut self) -> bool {
        self.gate.verify().await
    }

    // --- signing commands --------------------------------------------------

    /// Signs the open document via the external signer.
    ///
    /// Enforces the core trust invariant before any process is spawned:
    /// the request fingerprint must equal the open-time baseline, and the
    /// live file must still match it. A mismatch is sticky and blocks
    /// signing until the document is re-opened.
    ///
    /// # Errors
    ///
    /// [`SignDocumentError::NoDocument`] with no baseline,
    /// [`SignDocumentError::IntegrityMismatch`] on any fingerprint
    /// disagreement, or a transport-level [`SignerError`]. A
    /// signer-reported failure resolves to `Ok(SignResult::Failure)`.
    pub async fn sign_document(
        &mut self,
        request: &SignRequest,
    ) -> Result<SignResult, SignDocumentError> {
        if request.fingerprint.trim().is_empty() {
            return Err(SignerError::MissingFingerprint.into());
        }
        let Some(baseline) = self.gate.baseline() else {
            return Err(SignDocumentError::NoDocument);
        };
        if request.document_path != baseline.path
            || request.fingerprint != baseline.fingerprint
        {
            warn!(
                document = %request.document_path.display(),
                "sign request does not match the opened document"
            );
            return Err(SignDocumentError::IntegrityMismatch);
        }

        // Final check immediately before delegating: closes the window
        // between the UI's last periodic verification and the signing
        // action itself.
        if !self.gate.verify().await {
            return Err(SignDocumentError::IntegrityMismatch);
        }

        info!(document = %request.document_path.display(), "signing document");
        Ok(self.orchestrator.sign(request).await?)
    }

    /// Moves the signed output from its temporary path to `destination`.
    /// The temporary file is deleted best-effort afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`SaveError::Io`] if the copy fails; a failed temp-file
    /// deletion is logged and swallowed.
    pub async fn save_signed_output(
        &self,
        temp_path: &Path,
        destination: &Path,
    ) -> Result<PathBuf, SaveError> {
        tokio::fs::copy(temp_path, destination).await?;
        if let Err(error) = tokio::fs::remove_file(temp_path).await {
            warn!(%error, temp = %temp_path.display(), "could not delete temporary signed file");
        }
        info!(destination = %destination.display(), "signed document saved");
        Ok(destination.to_path_buf())
    }
}
