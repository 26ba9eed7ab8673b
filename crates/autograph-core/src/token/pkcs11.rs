//! Vendor middleware adapter over `cryptoki`.
//!
//! Wraps the vendor-supplied PKCS#11 library behind the
//! [`TokenMiddleware`] seam. Only the small surface the pipeline needs is
//! exposed: slot enumeration, read-only session open, and DATA-class
//! object reads by label. Signing keys on the card are never touched here;
//! the external signer process does its own PKCS#11 login.

use std::path::{Path, PathBuf};

use cryptoki::context::{CInitializeArgs, Pkcs11};
use cryptoki::object::{Attribute, AttributeType, ObjectClass};
use cryptoki::session::Session;
use tracing::debug;

use super::{DataObject, TokenError, TokenMiddleware, TokenSession};

/// Install hint shown when the vendor library is absent.
const INSTALL_HINT: &str = "install the eID middleware from https://eid.belgium.be";

/// [`TokenMiddleware`] backed by the vendor PKCS#11 library.
pub struct CryptokiMiddleware {
    library_path: PathBuf,
    context: Option<Pkcs11>,
}

impl CryptokiMiddleware {
    /// Creates an adapter for the library at `library_path`. The library
    /// is not loaded until [`TokenMiddleware::initialize`] is called.
    #[must_use]
    pub fn new(library_path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: library_path.into(),
            context: None,
        }
    }

    /// The configured vendor library path.
    #[must_use]
    pub fn library_path(&self) -> &Path {
        &self.library_path
    }

    fn context(&self) -> Result<&Pkcs11, TokenError> {
        self.context.as_ref().ok_or_else(|| TokenError::InitFailure {
            message: "middleware not initialized".to_string(),
        })
    }
}

impl TokenMiddleware for CryptokiMiddleware {
    fn initialize(&mut self) -> Result<(), TokenError> {
        if self.context.is_some() {
            return Ok(());
        }
        if !self.library_path.exists() {
            return Err(TokenError::ModuleNotFound {
                path: self.library_path.clone(),
                hint: INSTALL_HINT.to_string(),
            });
        }
        let context = Pkcs11::new(&self.library_path).map_err(|e| TokenError::InitFailure {
            message: format!("failed to load {}: {e}", self.library_path.display()),
        })?;
        context
            .initialize(CInitializeArgs::OsThreads)
            .map_err(|e| TokenError::InitFailure {
                message: format!("C_Initialize failed: {e}"),
            })?;
        debug!(path = %self.library_path.display(), "card middleware initialized");
        self.context = Some(context);
        Ok(())
    }

    fn finalize(&mut self) {
        if let Some(context) = self.context.take() {
            context.finalize();
            debug!("card middleware finalized");
        }
    }

    fn slot_count(&self, with_card: bool) -> Result<usize, TokenError> {
        let context = self.context()?;
        let slots = if with_card {
            context.get_slots_with_token()
        } else {
            context.get_all_slots()
        };
        slots
            .map(|slots| slots.len())
            .map_err(|e| TokenError::session(format!("slot enumeration failed: {e}")))
    }

    fn open_session(&mut self) -> Result<Box<dyn TokenSession>, TokenError> {
        let context = self.context()?;
        let slots = context
            .get_slots_with_token()
            .map_err(|e| TokenError::session(format!("slot enumeration failed: {e}")))?;
        let slot = *slots.first().ok_or(TokenError::NoCard)?;
        let session = context
            .open_ro_session(slot)
            .map_err(|e| TokenError::session(format!("session open failed: {e}")))?;
        Ok(Box::new(CryptokiSession { session }))
    }
}

struct CryptokiSession {
    session: Session,
}

impl TokenSession for CryptokiSession {
    fn data_objects(&mut self) -> Result<Vec<DataObject>, TokenError> {
        let handles = self
            .session
            .find_objects(&[Attribute::Class(ObjectClass::DATA)])
            .map_err(|e| TokenError::session(format!("object enumeration failed: {e}")))?;

        let mut objects = Vec::with_capacity(handles.len());
        for handle in handles {
            let attributes = self
                .session
                .get_attributes(handle, &[AttributeType::Label, AttributeType::Value])
                .map_err(|e| TokenError::session(format!("attribute read failed: {e}")))?;

            let mut label = None;
            let mut value = None;
            for attribute in attributes {
                match attribute {
                    Attribute::Label(bytes) => {
                        label = Some(String::from_utf8_lossy(&bytes).into_owned());
                    }
                    Attribute::Value(bytes) => value = Some(bytes),
                    _ => {}
                }
            }
            // Objects without both a label and a value carry nothing the
            // decoder can use.
            if let (Some(label), Some(value)) = (label, value) {
                objects.push(DataObject { label, value });
            }
        }
        Ok(objects)
    }

    fn close(self: Box<Self>) -> Result<(), TokenError> {
        drop(self.session);
        Ok(())
    }
}
