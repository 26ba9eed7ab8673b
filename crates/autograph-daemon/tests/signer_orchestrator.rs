//! Integration tests for the signing orchestrator against stub signer
//! processes.
//!
//! Each stub is a small shell script standing in for the external signer:
//! it drains stdin, then produces whatever stdout/stderr/exit-code
//! combination the scenario needs.

use std::path::{Path, PathBuf};

use autograph_core::config::SignerConfig;
use autograph_daemon::events::{EventBus, SigningEvent};
use autograph_daemon::signing::{SignRequest, SignResult, SignerError, SigningOrchestrator};

/// Writes an executable stub signer script into `dir`.
fn stub_signer(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\ncat > /dev/null\n{body}\n"))
        .expect("write stub signer");
    let mut perms = std::fs::metadata(&path).expect("stat stub").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod stub");
    path
}

fn orchestrator_for(binary: PathBuf) -> (SigningOrchestrator, EventBus) {
    let events = EventBus::new();
    let config = SignerConfig {
        binary_path: binary,
        dev_fallback: false,
        ..SignerConfig::default()
    };
    (SigningOrchestrator::new(config, events.clone()), events)
}

fn request() -> SignRequest {
    SignRequest {
        document_path: PathBuf::from("/tmp/document.pdf"),
        fingerprint: "0f".repeat(32),
        page: 0,
        x: 100.0,
        y: 100.0,
        width: 200.0,
        height: 60.0,
        visible: true,
        reason: None,
        location: None,
    }
}

#[tokio::test]
async fn successful_signer_resolves_a_success_result() {
    let dir = tempfile::tempdir().expect("temp dir");
    let stub = stub_signer(
        dir.path(),
        "ok.sh",
        r#"printf '%s' '{"success": true, "output_path": "/tmp/x.pdf", "message": "signed"}'"#,
    );
    let (orchestrator, events) = orchestrator_for(stub);
    let mut rx = events.subscribe();

    let result = orchestrator.sign(&request()).await.expect("sign");
    assert_eq!(
        result,
        SignResult::Success {
            output_path: PathBuf::from("/tmp/x.pdf"),
            message: Some("signed".to_string()),
        }
    );

    // Progress on spawn, completion on success.
    assert!(matches!(
        rx.recv().await.expect("progress event"),
        SigningEvent::Progress { ref stage, .. } if stage == "started"
    ));
    assert!(matches!(
        rx.recv().await.expect("complete event"),
        SigningEvent::Complete { ref output_path } if output_path == Path::new("/tmp/x.pdf")
    ));
}

#[tokio::test]
async fn reported_failure_resolves_not_rejects() {
    let dir = tempfile::tempdir().expect("temp dir");
    let stub = stub_signer(
        dir.path(),
        "fail.sh",
        r#"printf '%s' '{"success": false, "error": "card locked", "traceback": "Traceback..."}'"#,
    );
    let (orchestrator, events) = orchestrator_for(stub);
    let mut rx = events.subscribe();

    let result = orchestrator.sign(&request()).await.expect("well-formed failure resolves");
    assert_eq!(
        result,
        SignResult::Failure {
            error: "card locked".to_string(),
            traceback: Some("Traceback...".to_string()),
        }
    );

    // Progress first, then the error notification.
    assert!(matches!(
        rx.recv().await.expect("progress event"),
        SigningEvent::Progress { .. }
    ));
    assert!(matches!(
        rx.recv().await.expect("error event"),
        SigningEvent::Error { ref error } if error == "card locked"
    ));
}

#[tokio::test]
async fn non_zero_exit_carries_code_and_stderr() {
    let dir = tempfile::tempdir().expect("temp dir");
    let stub = stub_signer(dir.path(), "boom.sh", "echo boom >&2\nexit 1");
    let (orchestrator, _events) = orchestrator_for(stub);

    let error = orchestrator.sign(&request()).await.expect_err("must fail");
    match error {
        SignerError::NonZeroExit { code, stderr } => {
            assert_eq!(code, 1);
            assert!(stderr.contains("boom"), "stderr was: {stderr}");
        }
        other => panic!("expected NonZeroExit, got {other:?}"),
    }
}

#[tokio::test]
async fn non_json_stdout_is_a_parse_error_with_the_raw_text() {
    let dir = tempfile::tempdir().expect("temp dir");
    let stub = stub_signer(dir.path(), "garbage.sh", "printf 'not json at all'");
    let (orchestrator, _events) = orchestrator_for(stub);

    let error = orchestrator.sign(&request()).await.expect_err("must fail");
    match error {
        SignerError::OutputParse { raw, .. } => {
            assert!(raw.contains("not json at all"), "raw was: {raw}");
        }
        other => panic!("expected OutputParse, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_binary_without_fallback_is_signer_not_found() {
    let (orchestrator, _events) = orchestrator_for(PathBuf::from("/nonexistent/signer-binary"));

    let error = orchestrator.sign(&request()).await.expect_err("must fail");
    assert!(matches!(error, SignerError::NotFound { .. }));
}

#[tokio::test]
async fn dev_fallback_runs_the_interpreter_command() {
    let dir = tempfile::tempdir().expect("temp dir");
    let script = stub_signer(
        dir.path(),
        "dev-runner.sh",
        r#"printf '%s' '{"success": true, "output_path": "/tmp/dev.pdf"}'"#,
    );

    let events = EventBus::new();
    let config = SignerConfig {
        binary_path: PathBuf::from("/nonexistent/prebuilt"),
        dev_fallback: true,
        dev_command: vec!["sh".to_string(), script.display().to_string()],
        dev_working_dir: Some(dir.path().to_path_buf()),
    };
    let orchestrator = SigningOrchestrator::new(config, events);

    let result = orchestrator.sign(&request()).await.expect("sign via dev runner");
    assert!(matches!(result, SignResult::Success { .. }));
}

#[tokio::test]
async fn overlapping_sign_requests_are_rejected_busy() {
    let dir = tempfile::tempdir().expect("temp dir");
    let stub = stub_signer(
        dir.path(),
        "slow.sh",
        r#"sleep 1
printf '%s' '{"success": true, "output_path": "/tmp/slow.pdf"}'"#,
    );
    let (orchestrator, _events) = orchestrator_for(stub);
    let req = request();

    let (first, second) = tokio::join!(orchestrator.sign(&req), orchestrator.sign(&req));

    assert!(matches!(first, Ok(SignResult::Success { .. })));
    assert!(matches!(second, Err(SignerError::Busy)));
}

#[tokio::test]
async fn missing_fingerprint_fails_before_spawning() {
    let dir = tempfile::tempdir().expect("temp dir");
    let marker = dir.path().join("spawned.marker");
    let stub = stub_signer(
        dir.path(),
        "marker.sh",
        &format!("touch {}\nprintf '{{}}'", marker.display()),
    );
    let (orchestrator, _events) = orchestrator_for(stub);

    let mut req = request();
    req.fingerprint = String::new();
    let error = orchestrator.sign(&req).await.expect_err("must fail");
    assert!(matches!(error, SignerError::MissingFingerprint));
    assert!(!marker.exists(), "no signer process may be spawned");
}
