//! In-memory token middleware for tests and development.
//!
//! [`MemoryMiddleware`] implements the [`TokenMiddleware`] seam against a
//! shared in-memory state that a [`MemoryTokenHandle`] can mutate from the
//! outside: connect or disconnect the reader, insert or remove a card,
//! and inject failures. Counters record how many sessions were opened and
//! how many object reads were performed, so lifecycle tests can assert
//! exact fetch counts.

use std::sync::{Arc, Mutex};

use super::{DataObject, TokenError, TokenMiddleware, TokenSession};

#[derive(Debug, Default)]
struct MemoryTokenState {
    initialized: bool,
    reader_connected: bool,
    card: Option<Vec<DataObject>>,
    fail_initialize: bool,
    fail_reads: bool,
    sessions_opened: usize,
    sessions_closed: usize,
    object_reads: usize,
}

/// Scriptable in-memory middleware.
///
/// Construct one, keep a [`MemoryTokenHandle`] via [`Self::handle`], and
/// hand the middleware itself to the session manager.
#[derive(Debug, Default)]
pub struct MemoryMiddleware {
    state: Arc<Mutex<MemoryTokenState>>,
}

impl MemoryMiddleware {
    /// Creates a middleware with no reader connected.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a middleware with a reader already connected.
    #[must_use]
    pub fn with_reader() -> Self {
        let middleware = Self::default();
        middleware.handle().connect_reader();
        middleware
    }

    /// Returns a control handle sharing this middleware's state.
    #[must_use]
    pub fn handle(&self) -> MemoryTokenHandle {
        MemoryTokenHandle {
            state: Arc::clone(&self.state),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryTokenState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// External control handle for a [`MemoryMiddleware`].
#[derive(Debug, Clone)]
pub struct MemoryTokenHandle {
    state: Arc<Mutex<MemoryTokenState>>,
}

impl MemoryTokenHandle {
    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryTokenState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Simulates plugging in the card reader.
    pub fn connect_reader(&self) {
        self.lock().reader_connected = true;
    }

    /// Simulates unplugging the card reader (any card goes with it).
    pub fn disconnect_reader(&self) {
        let mut state = self.lock();
        state.reader_connected = false;
        state.card = None;
    }

    /// Simulates inserting a card carrying the given data objects.
    pub fn insert_card(&self, objects: Vec<DataObject>) {
        self.lock().card = Some(objects);
    }

    /// Simulates removing the card.
    pub fn remove_card(&self) {
        self.lock().card = None;
    }

    /// Makes the next `initialize` call fail.
    pub fn fail_initialize(&self, fail: bool) {
        self.lock().fail_initialize = fail;
    }

    /// Makes object reads fail, as if the card were pulled mid-read.
    pub fn fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    /// Whether the middleware has been initialized.
    #[must_use]
    pub fn initialized(&self) -> bool {
        self.lock().initialized
    }

    /// Number of sessions opened so far.
    #[must_use]
    pub fn sessions_opened(&self) -> usize {
        self.lock().sessions_opened
    }

    /// Number of sessions closed so far.
    #[must_use]
    pub fn sessions_closed(&self) -> usize {
        self.lock().sessions_closed
    }

    /// Number of `data_objects` reads performed across all sessions.
    #[must_use]
    pub fn object_reads(&self) -> usize {
        self.lock().object_reads
    }
}

impl TokenMiddleware for MemoryMiddleware {
    fn initialize(&mut self) -> Result<(), TokenError> {
        let mut state = self.lock();
        if state.initialized {
            return Ok(());
        }
        if state.fail_initialize {
            return Err(TokenError::InitFailure {
                message: "injected initialization failure".to_string(),
            });
        }
        state.initialized = true;
        Ok(())
    }

    fn finalize(&mut self) {
        let mut state = self.lock();
        state.initialized = false;
    }

    fn slot_count(&self, with_card: bool) -> Result<usize, TokenError> {
        let state = self.lock();
        if !state.initialized {
            return Err(TokenError::InitFailure {
                message: "middleware not initialized".to_string(),
            });
        }
        if !state.reader_connected {
            return Ok(0);
        }
        if with_card {
            Ok(usize::from(state.card.is_some()))
        } else {
            Ok(1)
        }
    }

    fn open_session(&mut self) -> Result<Box<dyn TokenSession>, TokenError> {
        let mut state = self.lock();
        if !state.initialized {
            return Err(TokenError::InitFailure {
                message: "middleware not initialized".to_string(),
            });
        }
        if !state.reader_connected {
            return Err(TokenError::NoReader);
        }
        if state.card.is_none() {
            return Err(TokenError::NoCard);
        }
        state.sessions_opened += 1;
        Ok(Box::new(MemorySession {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MemorySession {
    state: Arc<Mutex<MemoryTokenState>>,
}

impl TokenSession for MemorySession {
    fn data_objects(&mut self) -> Result<Vec<DataObject>, TokenError> {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        state.object_reads += 1;
        if state.fail_reads {
            return Err(TokenError::session("injected read failure"));
        }
        state
            .card
            .clone()
            .ok_or(TokenError::NoCard)
    }

    fn close(self: Box<Self>) -> Result<(), TokenError> {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        state.sessions_closed += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_is_idempotent() {
        let mut middleware = MemoryMiddleware::with_reader();
        middleware.initialize().expect("first initialize");
        middleware.initialize().expect("second initialize is a no-op");
        assert!(middleware.handle().initialized());
    }

    #[test]
    fn slot_counts_follow_reader_and_card() {
        let mut middleware = MemoryMiddleware::new();
        let handle = middleware.handle();
        middleware.initialize().expect("initialize");

        assert_eq!(middleware.slot_count(false).unwrap(), 0);

        handle.connect_reader();
        assert_eq!(middleware.slot_count(false).unwrap(), 1);
        assert_eq!(middleware.slot_count(true).unwrap(), 0);

        handle.insert_card(vec![DataObject::new("surname", b"Doe".to_vec())]);
        assert_eq!(middleware.slot_count(true).unwrap(), 1);
    }

    #[test]
    fn open_session_requires_card() {
        let mut middleware = MemoryMiddleware::with_reader();
        middleware.initialize().expect("initialize");

        assert!(matches!(
            middleware.open_session(),
            Err(TokenError::NoCard)
        ));

        middleware
            .handle()
            .insert_card(vec![DataObject::new("surname", b"Doe".to_vec())]);
        let mut session = middleware.open_session().expect("open session");
        let objects = session.data_objects().expect("read objects");
        assert_eq!(objects.len(), 1);
        session.close().expect("close");

        let handle = middleware.handle();
        assert_eq!(handle.sessions_opened(), 1);
        assert_eq!(handle.sessions_closed(), 1);
    }

    #[test]
    fn read_failure_surfaces_as_session_error() {
        let mut middleware = MemoryMiddleware::with_reader();
        let handle = middleware.handle();
        middleware.initialize().expect("initialize");
        handle.insert_card(vec![DataObject::new("surname", b"Doe".to_vec())]);
        handle.fail_reads(true);

        let mut session = middleware.open_session().expect("open session");
        assert!(matches!(
            session.data_objects(),
            Err(TokenError::Session { .. })
        ));
    }
}
