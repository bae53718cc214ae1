// ABOUTME: Integration tests for the deploy coordinator with mock transports.
// ABOUTME: Covers stage attribution, partial-upload cleanup, and the end-to-end scenario.

mod support;

use parking_lot::Mutex;
use skiff::deploy::{DeployCoordinator, DeployRequest, Stage};
use skiff::credential::{Credential, StaticCredential};
use skiff::transport::TransferProgress;
use std::path::Path;
use std::sync::Arc;
use support::{MockConnector, MockTransport, Recorded, scenario_config};

fn credentials() -> StaticCredential {
    StaticCredential::new(Credential::Password("secret".to_string()))
}

fn write_artifact(dir: &Path, contents: &[u8]) -> std::path::PathBuf {
    static NEXT: std::sync::atomic::AtomicU32 = std::sync::atomic::AtomicU32::new(0);
    let n = NEXT.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    let path = dir.join(format!("bin-x-{n}"));
    std::fs::write(&path, contents).unwrap();
    path
}

fn coordinator() -> DeployCoordinator {
    DeployCoordinator::new(scenario_config()).unwrap()
}

/// Test: Connect failure is attributed to the connect stage.
/// Expected: DeployError{stage=connect}, no upload or swap attempted.
#[tokio::test]
async fn connect_failure_attributes_connect_stage() {
    let temp = tempfile::tempdir().unwrap();
    let artifact = write_artifact(temp.path(), b"binary");

    let connector = MockConnector::refusing();
    let mut on_progress = |_: TransferProgress| {};

    let err = coordinator()
        .deploy(
            &connector,
            &credentials(),
            DeployRequest {
                build_id: "abc123",
                artifact: &artifact,
                cleanup_artifact: false,
            },
            &mut on_progress,
        )
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::Connect);
}

/// Test: An invalid build id fails during release naming, before any
/// connection is made.
#[tokio::test]
async fn invalid_build_id_fails_before_connecting() {
    let temp = tempfile::tempdir().unwrap();
    let artifact = write_artifact(temp.path(), b"binary");

    let log = Arc::new(Mutex::new(Vec::new()));
    let connector = MockConnector::new(MockTransport::new(log.clone()));
    let mut on_progress = |_: TransferProgress| {};

    let err = coordinator()
        .deploy(
            &connector,
            &credentials(),
            DeployRequest {
                build_id: "abc; rm -rf /",
                artifact: &artifact,
                cleanup_artifact: false,
            },
            &mut on_progress,
        )
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::Name);
    assert!(log.lock().is_empty(), "no transport call may happen");
}

/// Test: Interrupted upload triggers a best-effort remote delete.
/// Expected: DeployError{stage=upload}, an `rm -f` of the partial path,
/// and the session still closed.
#[tokio::test]
async fn interrupted_upload_is_cleaned_up_and_attributed() {
    let temp = tempfile::tempdir().unwrap();
    let artifact = write_artifact(temp.path(), b"0123456789abcdef");

    let log = Arc::new(Mutex::new(Vec::new()));
    let mut transport = MockTransport::new(log.clone());
    transport.interrupt_upload = true;
    let connector = MockConnector::new(transport);
    let mut on_progress = |_: TransferProgress| {};

    let err = coordinator()
        .deploy(
            &connector,
            &credentials(),
            DeployRequest {
                build_id: "abc123",
                artifact: &artifact,
                cleanup_artifact: false,
            },
            &mut on_progress,
        )
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::Upload);

    let calls = log.lock().clone();
    let remote = match &calls[0] {
        Recorded::Upload { remote } => remote.clone(),
        other => panic!("expected upload first, got {other:?}"),
    };
    assert!(
        calls.contains(&Recorded::Exec(format!("rm '-f' '{remote}'"))),
        "partial upload should be deleted, calls: {calls:?}"
    );
    assert_eq!(calls.last(), Some(&Recorded::Close));
    assert!(
        !calls.iter().any(
            |c| matches!(c, Recorded::Exec(cmd) if cmd.contains("nohup") || cmd.starts_with("lsof"))
        ),
        "swap must not run after a failed upload"
    );
}

/// Test: Swap with nothing listening on the port.
/// Expected: no kill command, launch still issued, deploy succeeds.
#[tokio::test]
async fn free_port_skips_kill_but_launches() {
    let temp = tempfile::tempdir().unwrap();
    let artifact = write_artifact(temp.path(), b"binary");

    let log = Arc::new(Mutex::new(Vec::new()));
    let connector = MockConnector::new(MockTransport::new(log.clone()));
    let mut on_progress = |_: TransferProgress| {};

    coordinator()
        .deploy(
            &connector,
            &credentials(),
            DeployRequest {
                build_id: "abc123",
                artifact: &artifact,
                cleanup_artifact: false,
            },
            &mut on_progress,
        )
        .await
        .unwrap();

    let calls = log.lock().clone();
    assert!(
        !calls
            .iter()
            .any(|c| matches!(c, Recorded::Exec(cmd) if cmd.starts_with("kill"))),
        "no kill when the port is free, calls: {calls:?}"
    );
    assert!(
        calls
            .iter()
            .any(|c| matches!(c, Recorded::Exec(cmd) if cmd.contains("nohup"))),
        "launch must still be issued"
    );
}

/// Test: Old processes on the port are killed before launch.
/// Expected: one kill command naming every pid from the lookup.
#[tokio::test]
async fn old_processes_are_killed_before_launch() {
    let temp = tempfile::tempdir().unwrap();
    let artifact = write_artifact(temp.path(), b"binary");

    let log = Arc::new(Mutex::new(Vec::new()));
    let mut transport = MockTransport::new(log.clone());
    transport.lsof_stdout = "4242\n5151\n".to_string();
    let connector = MockConnector::new(transport);
    let mut on_progress = |_: TransferProgress| {};

    coordinator()
        .deploy(
            &connector,
            &credentials(),
            DeployRequest {
                build_id: "abc123",
                artifact: &artifact,
                cleanup_artifact: false,
            },
            &mut on_progress,
        )
        .await
        .unwrap();

    let calls = log.lock().clone();
    assert!(
        calls.contains(&Recorded::Exec("kill '4242' '5151'".to_string())),
        "kill should name both pids, calls: {calls:?}"
    );
}

/// Test: A failed kill does not abort the swap.
/// Expected: deploy still succeeds; the launch is issued.
#[tokio::test]
async fn failed_kill_does_not_abort_swap() {
    let temp = tempfile::tempdir().unwrap();
    let artifact = write_artifact(temp.path(), b"binary");

    let log = Arc::new(Mutex::new(Vec::new()));
    let mut transport = MockTransport::new(log.clone());
    transport.lsof_stdout = "4242\n".to_string();
    transport.kill_exit_code = 1;
    let connector = MockConnector::new(transport);
    let mut on_progress = |_: TransferProgress| {};

    coordinator()
        .deploy(
            &connector,
            &credentials(),
            DeployRequest {
                build_id: "abc123",
                artifact: &artifact,
                cleanup_artifact: false,
            },
            &mut on_progress,
        )
        .await
        .unwrap();

    let calls = log.lock().clone();
    assert!(
        calls
            .iter()
            .any(|c| matches!(c, Recorded::Exec(cmd) if cmd.contains("nohup"))),
        "launch must still run after a failed kill"
    );
}

/// Test: A rejected launch is attributed to the swap stage.
#[tokio::test]
async fn rejected_launch_attributes_swap_stage() {
    let temp = tempfile::tempdir().unwrap();
    let artifact = write_artifact(temp.path(), b"binary");

    let log = Arc::new(Mutex::new(Vec::new()));
    let mut transport = MockTransport::new(log.clone());
    transport.launch_exit_code = 127;
    let connector = MockConnector::new(transport);
    let mut on_progress = |_: TransferProgress| {};

    let err = coordinator()
        .deploy(
            &connector,
            &credentials(),
            DeployRequest {
                build_id: "abc123",
                artifact: &artifact,
                cleanup_artifact: false,
            },
            &mut on_progress,
        )
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::Swap);
    assert_eq!(log.lock().last(), Some(&Recorded::Close));
}

/// Test: End-to-end scenario — buildId "abc123", directory "/srv/app".
/// Expected: release id matches bin-x-abc123-*, upload goes to
/// /srv/app/{releaseId}, the port lookup precedes a launch naming the
/// release path, and progress is monotonic with a terminal callback.
#[tokio::test]
async fn end_to_end_deploy_succeeds() {
    let temp = tempfile::tempdir().unwrap();
    let artifact = write_artifact(temp.path(), b"0123456789abcdefghij");

    let log = Arc::new(Mutex::new(Vec::new()));
    let connector = MockConnector::new(MockTransport::new(log.clone()));

    let mut seen: Vec<TransferProgress> = Vec::new();
    let mut on_progress = |p: TransferProgress| seen.push(p);

    let outcome = coordinator()
        .deploy(
            &connector,
            &credentials(),
            DeployRequest {
                build_id: "abc123",
                artifact: &artifact,
                cleanup_artifact: true,
            },
            &mut on_progress,
        )
        .await
        .unwrap();

    // Release naming
    let release = outcome.release_id.as_str();
    assert!(release.starts_with("bin-x-abc123-"), "got {release}");
    assert_eq!(outcome.remote_path, format!("/srv/app/{release}"));

    // Call ordering and exact command text
    let calls = log.lock().clone();
    assert_eq!(
        calls[0],
        Recorded::Upload {
            remote: outcome.remote_path.clone()
        }
    );
    assert_eq!(
        calls[1],
        Recorded::Exec("lsof '-t' '-i' 'tcp:8080'".to_string())
    );
    let launch = match &calls[2] {
        Recorded::Exec(cmd) => cmd.clone(),
        other => panic!("expected launch exec, got {other:?}"),
    };
    assert!(launch.starts_with("cd '/srv/app' && . ./.env && chmod '+x'"));
    assert!(launch.contains(&outcome.remote_path));
    assert!(launch.ends_with(">/dev/null 2>&1 &"));
    assert_eq!(calls[3], Recorded::Close);

    // Progress contract
    assert!(!seen.is_empty());
    for pair in seen.windows(2) {
        assert!(pair[0].sent <= pair[1].sent, "progress went backwards");
    }
    let last = seen.last().unwrap();
    assert_eq!(last.sent, last.total);
    assert_eq!(last.total, 20);

    // Local artifact removed on success
    assert!(!artifact.exists());
}

/// Test: Zero-byte artifact still gets a terminal progress callback.
#[tokio::test]
async fn zero_byte_artifact_reports_terminal_progress() {
    let temp = tempfile::tempdir().unwrap();
    let artifact = write_artifact(temp.path(), b"");

    let log = Arc::new(Mutex::new(Vec::new()));
    let connector = MockConnector::new(MockTransport::new(log.clone()));

    let mut seen: Vec<TransferProgress> = Vec::new();
    let mut on_progress = |p: TransferProgress| seen.push(p);

    coordinator()
        .deploy(
            &connector,
            &credentials(),
            DeployRequest {
                build_id: "abc123",
                artifact: &artifact,
                cleanup_artifact: false,
            },
            &mut on_progress,
        )
        .await
        .unwrap();

    assert_eq!(seen.len(), 1);
    assert_eq!((seen[0].sent, seen[0].total), (0, 0));
    assert!(seen[0].is_complete());
}

/// Test: The local artifact survives when cleanup is disabled, and is
/// removed even when the deploy fails partway.
#[tokio::test]
async fn artifact_cleanup_honors_request_flag() {
    let temp = tempfile::tempdir().unwrap();

    // Kept on success when cleanup is off
    let artifact = write_artifact(temp.path(), b"binary");
    let connector = MockConnector::new(MockTransport::new(Arc::new(Mutex::new(Vec::new()))));
    let mut on_progress = |_: TransferProgress| {};
    coordinator()
        .deploy(
            &connector,
            &credentials(),
            DeployRequest {
                build_id: "abc123",
                artifact: &artifact,
                cleanup_artifact: false,
            },
            &mut on_progress,
        )
        .await
        .unwrap();
    assert!(artifact.exists());

    // Removed on failure when cleanup is on
    let doomed = write_artifact(temp.path(), b"binary2");
    let connector = MockConnector::refusing();
    let mut on_progress = |_: TransferProgress| {};
    coordinator()
        .deploy(
            &connector,
            &credentials(),
            DeployRequest {
                build_id: "abc123",
                artifact: &doomed,
                cleanup_artifact: true,
            },
            &mut on_progress,
        )
        .await
        .unwrap_err();
    assert!(!doomed.exists());
}
