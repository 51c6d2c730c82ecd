//! Integration tests for process groups
//!
//! These tests run real child processes through a group.

use drover_api::{ConfigOption, EnvMode, Process, ProcessState, SharedBuffer, Signal};
use drover_core::ProcessGroup;
use drover_util::DroverError;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_group_runs_all_members() {
    let stdout = SharedBuffer::new();
    let group = ProcessGroup::new(
        CancellationToken::new(),
        [
            ConfigOption::Stdout(stdout.sink()),
            ConfigOption::Stderr(stdout.sink()),
        ],
    )
    .unwrap();

    let server = group.new_process("server", "ls -al").unwrap();
    server.add_env("PORT", ":6773").unwrap();
    group.new_process("worker", "ls -al").unwrap();

    group.run().await.unwrap();

    let out = stdout.contents();
    assert!(out.lines().any(|l| l.starts_with("server: ")));
    assert!(out.lines().any(|l| l.starts_with("worker: ")));
    assert_eq!(server.state(), Some(ProcessState::Completed));
}

#[tokio::test]
async fn test_group_environment_reaches_children() {
    let stdout = SharedBuffer::new();
    let group = ProcessGroup::new(
        CancellationToken::new(),
        [
            ConfigOption::Stdout(stdout.sink()),
            ConfigOption::Env(vec!["FOO=BAR".into()]),
        ],
    )
    .unwrap();

    group.new_process("env1", "/usr/bin/env").unwrap();
    group.run().await.unwrap();

    assert_eq!(stdout.contents(), "env1: FOO=BAR\n");
}

#[tokio::test]
async fn test_group_merge_environment() {
    let stdout = SharedBuffer::new();
    let group = ProcessGroup::new(
        CancellationToken::new(),
        [
            ConfigOption::Stdout(stdout.sink()),
            ConfigOption::EnvMode(EnvMode::Merge),
            ConfigOption::Env(vec!["FOO=BAR".into()]),
        ],
    )
    .unwrap();

    group.new_process("env1", "/usr/bin/env").unwrap();
    group.run().await.unwrap();

    let out = stdout.contents();
    assert!(out.lines().any(|l| l == "env1: FOO=BAR"));
    assert!(out.lines().any(|l| l.starts_with("env1: PATH=")));
}

#[tokio::test]
async fn test_stderr_is_labelled_separately() {
    let stdout = SharedBuffer::new();
    let stderr = SharedBuffer::new();
    let group = ProcessGroup::new(
        CancellationToken::new(),
        [
            ConfigOption::Stdout(stdout.sink()),
            ConfigOption::Stderr(stderr.sink()),
        ],
    )
    .unwrap();

    group
        .new_process("missing", "ls /nonexistent-drover-path")
        .unwrap();

    assert!(group.run().await.is_err());
    assert!(stdout.is_empty());
    assert!(stderr.contents().starts_with("missing: "));
}

#[tokio::test]
async fn test_stderr_falls_back_to_stdout() {
    let stdout = SharedBuffer::new();
    let group = ProcessGroup::new(
        CancellationToken::new(),
        [ConfigOption::Stdout(stdout.sink())],
    )
    .unwrap();

    group
        .new_process("missing", "ls /nonexistent-drover-path")
        .unwrap();

    assert!(group.run().await.is_err());
    assert!(stdout.contents().starts_with("missing: "));
}

#[tokio::test]
async fn test_one_failure_fails_the_group() {
    let group = ProcessGroup::new(CancellationToken::new(), []).unwrap();
    let ok = group.new_process("ok", "true").unwrap();
    let bad = group.new_process("bad", "false").unwrap();

    let err = group.run().await.unwrap_err();

    assert!(matches!(err, DroverError::Exited { .. }));
    assert_eq!(ok.state(), Some(ProcessState::Completed));
    assert_eq!(bad.state(), Some(ProcessState::Failed));
}

#[tokio::test]
async fn test_cancellation_kills_every_member() {
    let cancel = CancellationToken::new();
    let group = ProcessGroup::new(cancel.clone(), []).unwrap();
    let a = group.new_process("a", "sleep 30").unwrap();
    let b = group.new_process("b", "sleep 30").unwrap();

    let deadline = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        deadline.cancel();
    });

    let started = Instant::now();
    group.run().await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(a.state(), Some(ProcessState::Killed));
    assert_eq!(b.state(), Some(ProcessState::Killed));
}

#[tokio::test]
async fn test_process_created_after_cancel_never_starts() {
    let cancel = CancellationToken::new();
    let group = ProcessGroup::new(cancel.clone(), []).unwrap();
    cancel.cancel();

    let late = group.new_process("late", "sleep 30").unwrap();

    assert!(matches!(group.run().await, Err(DroverError::Cancelled)));
    assert_eq!(late.state(), Some(ProcessState::Killed));
}

#[tokio::test]
async fn test_signal_fans_out_to_running_members() {
    let group = ProcessGroup::new(CancellationToken::new(), []).unwrap();
    let a = group.new_process("a", "sleep 30").unwrap();
    let b = group.new_process("b", "sleep 30").unwrap();

    let started = Instant::now();
    let (run, _) = tokio::join!(group.run(), async {
        while a.pid().is_none() || b.pid().is_none() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        group.signal(Signal::SIGTERM).await.unwrap();
    });

    assert!(matches!(run, Err(DroverError::Exited { .. })));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(a.state(), Some(ProcessState::Failed));
    assert_eq!(b.state(), Some(ProcessState::Failed));
}
