//! Cancellation tests against real process trees

use drover_api::{ConfigOption, Process, ProcessState, SharedBuffer};
use drover_host_unix::ManagedProcess;
use std::io::Write;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

/// Prints, starts a grandchild in the same process group, then waits on it
const SCRIPT: &str = r#"
echo "started"
sleep 30 &
echo "child $!"
wait
"#;

fn write_script() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(SCRIPT.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn command_for(script: &NamedTempFile) -> String {
    format!("sh {}", script.path().display())
}

#[cfg(target_os = "linux")]
fn is_gone(pid: i32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        // Reparented zombies are dead even if nobody reaped them yet
        Ok(stat) => stat
            .rsplit(')')
            .next()
            .map(|rest| rest.trim_start().starts_with('Z'))
            .unwrap_or(false),
        Err(_) => true,
    }
}

#[tokio::test]
async fn deadline_kills_process_and_keeps_output() {
    let script = write_script();
    let cancel = CancellationToken::new();
    let stdout = SharedBuffer::new();

    let proc = ManagedProcess::new(
        cancel.clone(),
        &command_for(&script),
        [ConfigOption::Stdout(stdout.sink())],
    )
    .unwrap();

    let deadline = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        deadline.cancel();
    });

    let started = Instant::now();
    proc.run().await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(proc.state(), Some(ProcessState::Killed));
    assert!(stdout.contents().contains("started"), "stdout should not be empty");
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn cancellation_reaches_grandchildren() {
    let script = write_script();
    let cancel = CancellationToken::new();
    let stdout = SharedBuffer::new();

    let proc = ManagedProcess::new(
        cancel.clone(),
        &command_for(&script),
        [ConfigOption::Stdout(stdout.sink())],
    )
    .unwrap();

    let deadline = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        deadline.cancel();
    });

    proc.run().await.unwrap();

    let output = stdout.contents();
    let grandchild: i32 = output
        .lines()
        .find_map(|line| line.strip_prefix("child "))
        .and_then(|pid| pid.trim().parse().ok())
        .expect("script should report its background child");

    let mut gone = false;
    for _ in 0..50 {
        if is_gone(grandchild) {
            gone = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(gone, "grandchild {} survived group kill", grandchild);
}
