//! Card session management.
//!
//! [`CardManager`] owns the vendor middleware instance and the single open
//! card session. It is driven two ways: a fixed-cadence poll tick that
//! tracks reader and card presence (self-healing initialization included),
//! and on-demand identity/photo fetches from the command surface.
//!
//! # Design
//!
//! Polling rather than event subscription: the middleware exposes no
//! reliable insertion/removal callback. Any read failure after a
//! successful slot enumeration is a session error, non-fatal to the
//! manager, and is retried on a later insertion.
//!
//! Sessions are never reused across fetches: each identity or photo read
//! closes the previous session (close errors ignored) and opens a fresh
//! one, so the current session is always the most recent successful open.

use autograph_core::identity::CardIdentityRecord;
use autograph_core::identity::decoder::decode_card_data;
use autograph_core::identity::photo::photo_data_uri;
use autograph_core::token::{PHOTO_FILE_LABEL, TokenError, TokenMiddleware, TokenSession};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

/// Lifecycle state of the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardState {
    /// Middleware not yet loaded.
    Uninitialized,
    /// Middleware load in progress.
    Initializing,
    /// Middleware loaded; no reader connected.
    NoReader,
    /// Reader connected; no card inserted.
    ReaderNoCard,
    /// Card inserted.
    CardPresent,
    /// Middleware load failed; retried on the next poll.
    Error,
    /// Middleware finalized by cleanup. Re-initialization is allowed.
    Finalized,
}

/// Live reader/card presence snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardStatus {
    /// Whether a reader is connected (and the middleware is loaded).
    pub connected: bool,
    /// Whether a card is inserted.
    pub has_card: bool,
}

/// What one poll tick observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A previous tick is still running; this one did nothing.
    Skipped,
    /// Middleware was initialized by this tick.
    Initialized,
    /// No presence change.
    NoChange,
    /// The reader disappeared; caches cleared.
    ReaderLost,
    /// A card was inserted; identity and photo were fetched once.
    CardInserted,
    /// The card was removed; caches cleared.
    CardRemoved,
}

/// Owns the middleware lifecycle, the current session, and the cached
/// identity/photo for the currently inserted card.
pub struct CardManager {
    middleware: Box<dyn TokenMiddleware>,
    state: CardState,
    session: Option<Box<dyn TokenSession>>,
    cached_identity: Option<CardIdentityRecord>,
    cached_photo: Option<String>,
    had_card: bool,
    poll_busy: bool,
}

impl CardManager {
    /// Creates a manager over the given middleware. Nothing is loaded
    /// until [`Self::initialize`] or the first poll tick.
    #[must_use]
    pub fn new(middleware: Box<dyn TokenMiddleware>) -> Self {
        Self {
            middleware,
            state: CardState::Uninitialized,
            session: None,
            cached_identity: None,
            cached_photo: None,
            had_card: false,
            poll_busy: false,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> CardState {
        self.state
    }

    /// Identity cached by the insertion-time fetch, if a card is present.
    #[must_use]
    pub const fn cached_identity(&self) -> Option<&CardIdentityRecord> {
        self.cached_identity.as_ref()
    }

    /// Photo data URI cached by the insertion-time fetch.
    #[must_use]
    pub fn cached_photo(&self) -> Option<&str> {
        self.cached_photo.as_deref()
    }

    const fn is_initialized(&self) -> bool {
        matches!(
            self.state,
            CardState::NoReader | CardState::ReaderNoCard | CardState::CardPresent
        )
    }

    /// Loads and initializes the middleware module, exactly once.
    ///
    /// Idempotent: if already initialized, reports the current reader
    /// presence without touching the middleware lifecycle.
    ///
    /// # Errors
    ///
    /// - [`TokenError::ModuleNotFound`] if the vendor library is absent
    /// - [`TokenError::InitFailure`] on any lower-level error
    pub fn initialize(&mut self) -> Result<bool, TokenError> {
        if self.is_initialized() {
            return Ok(!matches!(self.state, CardState::NoReader));
        }

        self.state = CardState::Initializing;
        if let Err(error) = self.middleware.initialize() {
            self.state = CardState::Error;
            return Err(error);
        }

        let readers = self.middleware.slot_count(false).map_err(|e| {
            self.state = CardState::Error;
            TokenError::InitFailure {
                message: format!("reader enumeration failed: {e}"),
            }
        })?;

        if readers == 0 {
            self.state = CardState::NoReader;
            info!("card middleware initialized, no reader connected");
            return Ok(false);
        }

        let cards = self.middleware.slot_count(true).map_err(|e| {
            self.state = CardState::Error;
            TokenError::InitFailure {
                message: format!("card enumeration failed: {e}"),
            }
        })?;
        self.state = if cards > 0 {
            CardState::CardPresent
        } else {
            CardState::ReaderNoCard
        };
        info!(readers, cards, "card middleware initialized");
        Ok(true)
    }

    /// Live reader/card presence. Safe to call in any state.
    pub fn status(&mut self) -> CardStatus {
        if !self.is_initialized() {
            return CardStatus {
                connected: false,
                has_card: false,
            };
        }
        let readers = self.middleware.slot_count(false).unwrap_or(0);
        let cards = self.middleware.slot_count(true).unwrap_or(0);
        CardStatus {
            connected: readers > 0,
            has_card: cards > 0,
        }
    }

    /// One poll tick: self-healing initialization, presence tracking, and
    /// the exactly-once identity/photo fetch on card insertion.
    ///
    /// Ticks are single-flight: if a previous tick is somehow still in
    /// progress, this one returns [`PollOutcome::Skipped`] instead of
    /// interleaving.
    pub fn poll_tick(&mut self) -> PollOutcome {
        if self.poll_busy {
            trace!("poll tick skipped, previous tick still in progress");
            return PollOutcome::Skipped;
        }
        self.poll_busy = true;
        let outcome = self.poll_inner();
        self.poll_busy = false;
        outcome
    }

    fn poll_inner(&mut self) -> PollOutcome {
        if !self.is_initialized() {
            return match self.initialize() {
                Ok(connected) => {
                    debug!(connected, "middleware initialized from poll tick");
                    PollOutcome::Initialized
                }
                Err(error) => {
                    trace!(%error, "middleware initialization still failing");
                    PollOutcome::NoChange
                }
            };
        }

        let readers = match self.middleware.slot_count(false) {
            Ok(n) => n,
            Err(error) => {
                warn!(%error, "reader enumeration failed");
                return PollOutcome::NoChange;
            }
        };

        if readers == 0 {
            let lost = !matches!(self.state, CardState::NoReader);
            self.state = CardState::NoReader;
            if lost {
                info!("card reader disconnected");
                self.clear_card_data();
                return PollOutcome::ReaderLost;
            }
            return PollOutcome::NoChange;
        }

        let cards = match self.middleware.slot_count(true) {
            Ok(n) => n,
            Err(error) => {
                warn!(%error, "card enumeration failed");
                return PollOutcome::NoChange;
            }
        };

        if cards == 0 {
            self.state = CardState::ReaderNoCard;
            if self.had_card {
                info!("card removed");
                self.clear_card_data();
                return PollOutcome::CardRemoved;
            }
            return PollOutcome::NoChange;
        }

        self.state = CardState::CardPresent;
        if self.had_card {
            return PollOutcome::NoChange;
        }

        // Exactly one fetch of each per insertion. A failed read here is
        // a session error, not fatal to the manager.
        self.had_card = true;
        info!("card inserted, reading identity and photo");
        if let Err(error) = self.identity() {
            warn!(%error, "identity read failed");
        }
        if let Err(error) = self.photo() {
            warn!(%error, "photo read failed");
        }
        PollOutcome::CardInserted
    }

    /// Reads and decodes the identity record from the card, re-opening
    /// the session. Safe to call with no session open.
    ///
    /// # Errors
    ///
    /// - [`TokenError::InitFailure`] if the middleware is not initialized
    /// - [`TokenError::NoReader`] / [`TokenError::NoCard`] on absence
    /// - [`TokenError::Session`] if the card disappeared mid-read
    pub fn identity(&mut self) -> Result<CardIdentityRecord, TokenError> {
        self.require_card()?;
        let session = self.reopen_session()?;
        let objects = session.data_objects()?;
        let record = decode_card_data(&objects);
        self.cached_identity = Some(record.clone());
        Ok(record)
    }

    /// Reads the photo from the card as a data URI, re-opening the
    /// session. Safe to call with no session open.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`Self::identity`]; a card without a photo object
    /// is a [`TokenError::Session`].
    pub fn photo(&mut self) -> Result<String, TokenError> {
        self.require_card()?;
        let session = self.reopen_session()?;
        let objects = session.data_objects()?;
        let photo = objects
            .into_iter()
            .find(|object| object.label == PHOTO_FILE_LABEL)
            .ok_or_else(|| TokenError::session("photo object not found on card"))?;
        let uri = photo_data_uri(&photo.value);
        self.cached_photo = Some(uri.clone());
        Ok(uri)
    }

    /// Closes any open session (best-effort) and finalizes the module.
    ///
    /// Runs on explicit request and on application shutdown. The manager
    /// may be re-initialized afterwards.
    pub fn cleanup(&mut self) {
        if let Some(session) = self.session.take() {
            let _ = session.close();
        }
        self.middleware.finalize();
        self.clear_card_data();
        self.state = CardState::Finalized;
        info!("card middleware finalized");
    }

    fn clear_card_data(&mut self) {
        if let Some(session) = self.session.take() {
            let _ = session.close();
        }
        self.cached_identity = None;
        self.cached_photo = None;
        self.had_card = false;
    }

    fn require_card(&mut self) -> Result<(), TokenError> {
        if !self.is_initialized() {
            return Err(TokenError::InitFailure {
                message: "middleware not initialized".to_string(),
            });
        }
        if self.middleware.slot_count(false)? == 0 {
            return Err(TokenError::NoReader);
        }
        if self.middleware.slot_count(true)? == 0 {
            return Err(TokenError::NoCard);
        }
        Ok(())
    }

    /// Replaces the current session: the previous one is closed with
    /// errors ignored, then a fresh session is opened.
    fn reopen_session(&mut self) -> Result<&mut (dyn TokenSession + '_), TokenError> {
        if let Some(previous) = self.session.take() {
            let _ = previous.close();
        }
        let fresh = self.middleware.open_session()?;
        Ok(self.session.insert(fresh).as_mut())
    }
}
