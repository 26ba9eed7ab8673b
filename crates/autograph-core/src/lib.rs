//! autograph-core - Core primitives for the Autograph signing pipeline.
//!
//! This crate holds the pure, reusable parts of the signing pipeline:
//!
//! - [`token`]: the hardware-token middleware abstraction. The vendor
//!   PKCS#11 library is an external capability; this crate defines the
//!   trait seam ([`token::TokenMiddleware`] / [`token::TokenSession`]),
//!   ships an in-memory fake for tests and development, and provides an
//!   optional `cryptoki`-backed adapter behind the `pkcs11` feature.
//! - [`identity`]: the binary decoder that turns raw labeled card data
//!   objects into a structured identity record, including the composite
//!   address blob parser and the photo data-URI encoder.
//! - [`integrity`]: the file-integrity gate. Computes a streaming SHA-256
//!   fingerprint of an opened document and re-verifies it against that
//!   baseline; a detected mismatch is sticky until a fresh open.
//! - [`config`]: TOML configuration for the middleware library path, the
//!   external signer location, and the polling cadences.
//!
//! Stateful orchestration (the card session manager, the signer process
//! driver, the command surface) lives in `autograph-daemon`.

pub mod config;
pub mod identity;
pub mod integrity;
pub mod token;
