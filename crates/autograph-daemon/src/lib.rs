//! autograph-daemon - Autograph signing service library.
//!
//! Stateful orchestration on top of `autograph-core`:
//!
//! - [`card`]: the card session manager. Owns the middleware lifecycle,
//!   polls for reader/card presence on a fixed cadence, and feeds decoded
//!   identity and photo data to the command surface.
//! - [`signing`]: the signing orchestrator. Spawns the external signer
//!   process, exchanges one JSON request/response over its standard
//!   streams, and classifies the outcome.
//! - [`events`]: the fire-and-forget signing progress channel, decoupled
//!   from the request/response call.
//! - [`dispatch`]: the typed command surface consumed by the UI shell,
//!   including the integrity gate consultation on the sign path.
//!
//! # Runtime Requirements
//!
//! The service is designed for a **current-thread** tokio runtime: all
//! card polling and integrity re-checks run on independent timers in a
//! single control flow, suspending at I/O boundaries. Nothing here spawns
//! parallel worker threads, and correctness of the shared card/session
//! state relies on that serialization.

pub mod card;
pub mod dispatch;
pub mod events;
pub mod signing;
