//! End-to-end tests of the dispatch surface: integrity gating around the
//! sign path, card command responses, and signed-output saving.

use std::path::{Path, PathBuf};

use autograph_core::config::{AutographConfig, SignerConfig};
use autograph_core::token::memory::MemoryMiddleware;
use autograph_core::token::DataObject;
use autograph_daemon::dispatch::{Daemon, SignDocumentError};
use autograph_daemon::signing::{SignRequest, SignResult, SignerError};

/// Writes an executable stub signer that records each spawn in a marker
/// file, then reports success.
fn marker_signer(dir: &Path) -> (PathBuf, PathBuf) {
    use std::os::unix::fs::PermissionsExt;

    let marker = dir.join("spawned.marker");
    let path = dir.join("signer.sh");
    std::fs::write(
        &path,
        format!(
            "#!/bin/sh\ncat > /dev/null\ntouch {}\nprintf '%s' '{{\"success\": true, \"output_path\": \"/tmp/signed.pdf\"}}'\n",
            marker.display()
        ),
    )
    .expect("write stub signer");
    let mut perms = std::fs::metadata(&path).expect("stat stub").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod stub");
    (path, marker)
}

fn daemon_with_signer(binary: PathBuf) -> Daemon {
    let config = AutographConfig {
        signer: SignerConfig {
            binary_path: binary,
            ..SignerConfig::default()
        },
        ..AutographConfig::default()
    };
    Daemon::new(&config, Box::new(MemoryMiddleware::new()))
}

fn sign_request(path: &Path, fingerprint: &str) -> SignRequest {
    SignRequest {
        document_path: path.to_path_buf(),
        fingerprint: fingerprint.to_string(),
        page: 0,
        x: 120.0,
        y: 80.0,
        width: 200.0,
        height: 60.0,
        visible: true,
        reason: None,
        location: None,
    }
}

#[tokio::test]
async fn tampered_document_is_rejected_before_any_signer_spawn() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (signer, marker) = marker_signer(dir.path());
    let mut daemon = daemon_with_signer(signer);

    let document = dir.path().join("doc.pdf");
    tokio::fs::write(&document, b"%PDF-1.7 original").await.unwrap();

    let fingerprint = daemon.open_document(&document).await.expect("open");
    assert!(daemon.verify_document().await, "fresh document verifies");

    // External modification after the user reviewed the document.
    tokio::fs::write(&document, b"%PDF-1.7 original, tampered").await.unwrap();
    assert!(!daemon.verify_document().await, "periodic check sees the change");

    let error = daemon
        .sign_document(&sign_request(&document, &fingerprint))
        .await
        .expect_err("sign must be rejected");
    assert!(matches!(error, SignDocumentError::IntegrityMismatch));
    assert!(!marker.exists(), "no signer process may be spawned");

    // Flipping the content back does not restore trust.
    tokio::fs::write(&document, b"%PDF-1.7 original").await.unwrap();
    let error = daemon
        .sign_document(&sign_request(&document, &fingerprint))
        .await
        .expect_err("mismatch is sticky");
    assert!(matches!(error, SignDocumentError::IntegrityMismatch));
    assert!(!marker.exists());

    // Only a fresh open clears the gate.
    let fingerprint = daemon.open_document(&document).await.expect("re-open");
    let result = daemon
        .sign_document(&sign_request(&document, &fingerprint))
        .await
        .expect("sign after re-open");
    assert!(matches!(result, SignResult::Success { .. }));
    assert!(marker.exists(), "signer ran exactly when permitted");
}

#[tokio::test]
async fn sign_with_the_wrong_fingerprint_is_rejected() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (signer, marker) = marker_signer(dir.path());
    let mut daemon = daemon_with_signer(signer);

    let document = dir.path().join("doc.pdf");
    tokio::fs::write(&document, b"content").await.unwrap();
    daemon.open_document(&document).await.expect("open");

    let error = daemon
        .sign_document(&sign_request(&document, &"ab".repeat(32)))
        .await
        .expect_err("stale fingerprint must be rejected");
    assert!(matches!(error, SignDocumentError::IntegrityMismatch));
    assert!(!marker.exists());
}

#[tokio::test]
async fn sign_without_an_open_document_is_rejected() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (signer, _marker) = marker_signer(dir.path());
    let mut daemon = daemon_with_signer(signer);

    let error = daemon
        .sign_document(&sign_request(Path::new("/tmp/doc.pdf"), &"cd".repeat(32)))
        .await
        .expect_err("no baseline");
    assert!(matches!(error, SignDocumentError::NoDocument));
}

#[tokio::test]
async fn sign_without_a_fingerprint_is_a_client_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (signer, _marker) = marker_signer(dir.path());
    let mut daemon = daemon_with_signer(signer);

    let document = dir.path().join("doc.pdf");
    tokio::fs::write(&document, b"content").await.unwrap();
    daemon.open_document(&document).await.expect("open");

    let error = daemon
        .sign_document(&sign_request(&document, ""))
        .await
        .expect_err("empty fingerprint");
    assert!(matches!(
        error,
        SignDocumentError::Signer(SignerError::MissingFingerprint)
    ));
}

#[tokio::test]
async fn open_document_returns_the_content_fingerprint() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (signer, _marker) = marker_signer(dir.path());
    let mut daemon = daemon_with_signer(signer);

    let document = dir.path().join("empty.pdf");
    tokio::fs::write(&document, b"").await.unwrap();

    let fingerprint = daemon.open_document(&document).await.expect("open");
    assert_eq!(
        fingerprint,
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
        "empty file hashes to the SHA-256 of empty input"
    );
    assert_eq!(daemon.fingerprint(&document).await.expect("stateless"), fingerprint);
}

#[tokio::test]
async fn save_signed_output_copies_and_removes_the_temp_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (signer, _marker) = marker_signer(dir.path());
    let daemon = daemon_with_signer(signer);

    let temp = dir.path().join("autograph_signed_123.pdf");
    let destination = dir.path().join("final.pdf");
    tokio::fs::write(&temp, b"signed content").await.unwrap();

    let saved = daemon
        .save_signed_output(&temp, &destination)
        .await
        .expect("save");
    assert_eq!(saved, destination);
    assert_eq!(
        tokio::fs::read(&destination).await.unwrap(),
        b"signed content"
    );
    assert!(!temp.exists(), "temp file is cleaned up");
}

#[tokio::test]
async fn read_document_bytes_returns_the_raw_content() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (signer, _marker) = marker_signer(dir.path());
    let daemon = daemon_with_signer(signer);

    let document = dir.path().join("doc.pdf");
    tokio::fs::write(&document, b"%PDF-1.7 raw").await.unwrap();

    let bytes = daemon.read_document_bytes(&document).await.expect("read");
    assert_eq!(bytes, b"%PDF-1.7 raw");
}

#[tokio::test]
async fn card_commands_return_structured_responses() {
    let middleware = MemoryMiddleware::with_reader();
    let handle = middleware.handle();
    let mut daemon = Daemon::new(&AutographConfig::default(), Box::new(middleware));

    let init = daemon.initialize_card();
    assert!(init.success);
    assert!(init.connected);

    let status = daemon.card_status();
    assert!(status.connected);
    assert!(!status.has_card);

    // No card: structured failure, not a panic.
    let identity = daemon.card_identity();
    assert!(!identity.success);
    assert!(identity.error.is_some());

    handle.insert_card(vec![
        DataObject::new("surname", b"Peeters".to_vec()),
        DataObject::new("PHOTO_FILE", vec![0xFF, 0xD8, 0xFF]),
    ]);

    let identity = daemon.card_identity();
    assert!(identity.success);
    assert_eq!(identity.data.unwrap().surname.as_deref(), Some("Peeters"));

    let photo = daemon.card_photo();
    assert!(photo.success);
    assert!(photo.photo.unwrap().starts_with("data:image/jpeg;base64,"));

    let cleanup = daemon.cleanup_card();
    assert!(cleanup.success);
    assert!(!handle.initialized());
}
