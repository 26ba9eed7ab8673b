//! Fire-and-forget signing notifications.
//!
//! Progress notifications are a side channel decoupled from the
//! request/response result of a sign call: delivery is at-most-effort,
//! with no ordering guarantee relative to the final result, and a send
//! with no subscribers is not an error.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::sync::broadcast;

/// Default capacity of the notification channel.
const DEFAULT_CAPACITY: usize = 32;

/// A signing progress notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum SigningEvent {
    /// The signer process was spawned.
    #[serde(rename = "signing-progress")]
    Progress {
        /// Coarse stage identifier (e.g. `"started"`).
        stage: String,
        /// Human-readable progress message.
        message: String,
    },
    /// The signer completed successfully.
    #[serde(rename = "signing-complete")]
    Complete {
        /// Path of the signed output document.
        #[serde(rename = "outputPath")]
        output_path: PathBuf,
    },
    /// The signer reported a failure.
    #[serde(rename = "signing-error")]
    Error {
        /// Failure description.
        error: String,
    },
}

/// Broadcast bus for [`SigningEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SigningEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Creates a bus with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(DEFAULT_CAPACITY);
        Self { tx }
    }

    /// Subscribes to subsequent events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SigningEvent> {
        self.tx.subscribe()
    }

    /// Emits an event. Having no subscribers is fine.
    pub fn emit(&self, event: SigningEvent) {
        let _ = self.tx.send(event);
    }

    /// Emits a progress notification.
    pub fn progress(&self, stage: impl Into<String>, message: impl Into<String>) {
        self.emit(SigningEvent::Progress {
            stage: stage.into(),
            message: message.into(),
        });
    }

    /// Emits a completion notification.
    pub fn complete(&self, output_path: &Path) {
        self.emit(SigningEvent::Complete {
            output_path: output_path.to_path_buf(),
        });
    }

    /// Emits an error notification.
    pub fn error(&self, error: impl Into<String>) {
        self.emit(SigningEvent::Error {
            error: error.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_emitted_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.progress("started", "Initializing signature process...");
        bus.complete(Path::new("/tmp/out.pdf"));

        assert_eq!(
            rx.recv().await.unwrap(),
            SigningEvent::Progress {
                stage: "started".to_string(),
                message: "Initializing signature process...".to_string(),
            }
        );
        assert!(matches!(
            rx.recv().await.unwrap(),
            SigningEvent::Complete { .. }
        ));
    }

    #[test]
    fn emit_without_subscribers_does_not_fail() {
        let bus = EventBus::new();
        bus.error("nobody listening");
    }

    #[test]
    fn events_serialize_with_their_wire_names() {
        let event = SigningEvent::Complete {
            output_path: PathBuf::from("/tmp/out.pdf"),
        };
        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(value["event"], "signing-complete");
        assert_eq!(value["outputPath"], "/tmp/out.pdf");
    }
}
