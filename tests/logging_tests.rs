//! Checks that conditions the user is never told about still leave a trace
//! in the log.
#![cfg(unix)]

use portal_chooser::app::host::{HostCall, JournalHost};
use portal_chooser::app::{ActionOutcome, ChooserAction, UserEvent};
use portal_chooser::config::CancelPolicy;
use portal_chooser::core::invoker::HelperCommand;
use portal_chooser::core::policy::SandboxPathRejection;
use portal_chooser::core::profile::ActionProfile;
use portal_chooser::core::StateStore;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

fn action_replying(root: &Path, reply: &str, state_dir: PathBuf) -> ChooserAction {
    let script = root.join("helper.sh");
    fs::write(&script, format!("cat <<'EOF'\n{}\nEOF\n", reply)).unwrap();
    ChooserAction::new(
        ActionProfile::save_project(),
        StateStore::new(state_dir),
        HelperCommand {
            program: script,
            interpreter: Some(PathBuf::from("/bin/sh")),
        },
        Some(Duration::from_secs(10)),
        SandboxPathRejection::new(SandboxPathRejection::DEFAULT_PATTERN).unwrap(),
        CancelPolicy::Silent,
    )
}

#[tokio::test]
#[traced_test]
async fn test_state_write_failure_is_logged_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file where the state directory should be.
    let state_dir = dir.path().join("state");
    fs::write(&state_dir, "").unwrap();
    let picked = dir.path().join("song.RPP");
    let reply = format!(r#"{{"path": "{}"}}"#, picked.display());
    let action = action_replying(dir.path(), &reply, state_dir);
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<UserEvent>();
    let mut host = JournalHost::new(None);

    let outcome = action
        .run(&mut host, &event_tx, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, ActionOutcome::Completed { path: picked.clone() });
    assert_eq!(host.calls, vec![HostCall::SaveDocument { path: picked }]);
    assert!(event_rx.try_recv().is_err(), "No message for a state write failure");
    assert!(logs_contain("Could not write state file"));
}

#[tokio::test]
#[traced_test]
async fn test_unsupported_reply_version_is_logged() {
    let dir = tempfile::tempdir().unwrap();
    let action = action_replying(
        dir.path(),
        r#"{"version": 7, "path": "/tmp/song.RPP"}"#,
        dir.path().join("state"),
    );
    let (event_tx, _event_rx) = mpsc::unbounded_channel::<UserEvent>();

    let outcome = action
        .run(&mut JournalHost::new(None), &event_tx, &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(outcome, ActionOutcome::Aborted { .. }));
    assert!(logs_contain("Discarding helper reply"));
    assert!(logs_contain("unsupported schema version 7"));
}
