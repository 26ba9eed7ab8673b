//! Hardware-token middleware abstraction.
//!
//! The card reader and card contents are exposed by a vendor-supplied
//! native module (a PKCS#11 library). That module is a fixed external
//! capability: this crate does not reimplement its protocol, it defines
//! the seam the rest of the pipeline talks through.
//!
//! # Architecture
//!
//! [`TokenMiddleware`] models the loaded module: explicit `initialize` /
//! `finalize` lifecycle, slot enumeration, and session opening.
//! [`TokenSession`] models one open session against a card and yields the
//! card's labeled [`DataObject`]s. The design keeps at most one session
//! open at a time; opening a new session retires the old one.
//!
//! Backends:
//! - [`memory::MemoryMiddleware`]: scriptable in-memory middleware for
//!   tests and development
//! - `pkcs11::CryptokiMiddleware` (feature `pkcs11`): the vendor library
//!   via `cryptoki`

use std::path::PathBuf;

use thiserror::Error;

pub mod memory;
#[cfg(feature = "pkcs11")]
pub mod pkcs11;

/// Label of the composite address data object.
pub const ADDRESS_FILE_LABEL: &str = "ADDRESS_FILE";

/// Label of the JPEG photo data object.
pub const PHOTO_FILE_LABEL: &str = "PHOTO_FILE";

/// Errors surfaced by the token middleware boundary.
///
/// Session-level failures are non-fatal to the session manager: a card
/// pulled mid-read surfaces as [`TokenError::Session`] and is retried on
/// the next poll.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TokenError {
    /// The vendor middleware library is not installed on this host.
    #[error("card middleware not found at {path}: {hint}")]
    ModuleNotFound {
        /// Path that was probed for the vendor library.
        path: PathBuf,
        /// Operator-facing installation hint.
        hint: String,
    },

    /// The middleware loaded but failed to initialize.
    #[error("card middleware initialization failed: {message}")]
    InitFailure {
        /// Description of the underlying failure.
        message: String,
    },

    /// No card reader is connected.
    #[error("no card reader connected")]
    NoReader,

    /// A reader is connected but holds no card.
    #[error("no card inserted")]
    NoCard,

    /// A card-side operation failed (card removed mid-read, transmission
    /// error, missing object). Retried on the next poll.
    #[error("card session error: {message}")]
    Session {
        /// Description of the underlying failure.
        message: String,
    },
}

impl TokenError {
    /// Wraps an arbitrary card-side failure as a session error.
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
        }
    }
}

/// One labeled unit of card content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataObject {
    /// The middleware-assigned label (e.g. `"surname"`, `"ADDRESS_FILE"`).
    pub label: String,
    /// The raw object bytes.
    pub value: Vec<u8>,
}

impl DataObject {
    /// Convenience constructor.
    pub fn new(label: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// An open session against the card in a reader slot.
///
/// Sessions are invariantly replaced rather than reused: callers close the
/// previous session (ignoring close errors) before opening a new one, so
/// "current session" is always the most recent successful open.
pub trait TokenSession: Send {
    /// Enumerates and reads all DATA-class objects on the card.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Session`] if the card disappeared mid-read or
    /// the middleware reports a transmission failure.
    fn data_objects(&mut self) -> Result<Vec<DataObject>, TokenError>;

    /// Closes the session.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Session`] on middleware close failure. Callers
    /// on the replace-session path ignore this error by design.
    fn close(self: Box<Self>) -> Result<(), TokenError>;
}

/// The loaded vendor middleware module.
///
/// At most one instance exists per process; the session manager owns it
/// and drives its lifecycle explicitly (`initialize` on startup or first
/// poll, `finalize` on cleanup and application exit).
pub trait TokenMiddleware: Send {
    /// Loads and initializes the middleware module.
    ///
    /// Implementations must be idempotent: initializing an already
    /// initialized module is a no-op success.
    ///
    /// # Errors
    ///
    /// - [`TokenError::ModuleNotFound`] if the vendor library is absent
    /// - [`TokenError::InitFailure`] on any lower-level error
    fn initialize(&mut self) -> Result<(), TokenError>;

    /// Finalizes the module and releases its resources. Best-effort;
    /// errors are swallowed by implementations.
    fn finalize(&mut self);

    /// Number of reader slots visible to the middleware, with or without
    /// a card present.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InitFailure`] if the module is not
    /// initialized, or [`TokenError::Session`] on enumeration failure.
    fn slot_count(&self, with_card: bool) -> Result<usize, TokenError>;

    /// Opens a session against the first slot holding a card.
    ///
    /// # Errors
    ///
    /// - [`TokenError::NoCard`] if no slot holds a card
    /// - [`TokenError::Session`] on open failure
    fn open_session(&mut self) -> Result<Box<dyn TokenSession>, TokenError>;
}
