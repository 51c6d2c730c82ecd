//! Process management utilities

use async_trait::async_trait;
use drover_api::{ConfigOption, Configuration, EnvMode, Process, ProcessState, Signal, Sink};
use drover_util::{CommandLine, DroverError, Result, host_environment, split_env_entry};
use nix::errno::Errno;
use nix::sys::signal;
use nix::unistd::Pid;
use std::io::{self, Write};
use std::os::unix::process::CommandExt;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How long to keep forwarding output once the process is gone
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Managed child process with its own process group.
///
/// `ManagedProcess::default()` is an unconfigured value: its accessors
/// return empty values and discarding sinks, and every action fails with
/// [`DroverError::NotConfigured`].
#[derive(Debug, Default)]
pub struct ManagedProcess {
    inner: Option<Inner>,
}

#[derive(Debug)]
struct Inner {
    name: Option<String>,
    command: CommandLine,
    cancel: CancellationToken,
    config: Mutex<Configuration>,
    /// Set when a non-empty environment was configured in replace mode
    replace_env: bool,
    started: AtomicBool,
    state: Mutex<ProcessState>,
}

impl ManagedProcess {
    /// Create a process from a whitespace-separated command line.
    ///
    /// Options are applied in order and the first failure is returned.
    /// Nothing is started until [`Process::run`].
    pub fn new(
        cancel: CancellationToken,
        command_line: &str,
        options: impl IntoIterator<Item = ConfigOption>,
    ) -> Result<Self> {
        let command = CommandLine::parse(command_line)?;
        let config = Configuration::from_options(options)?;
        let replace_env = config.env_mode() == EnvMode::Replace && !config.env().is_empty();

        Ok(Self {
            inner: Some(Inner {
                name: None,
                command,
                cancel,
                config: Mutex::new(config),
                replace_env,
                started: AtomicBool::new(false),
                state: Mutex::new(ProcessState::Created),
            }),
        })
    }

    /// Attach a display name used in log fields
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        if let Some(inner) = self.inner.as_mut() {
            inner.name = Some(name.into());
        }
        self
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.as_ref().and_then(|i| i.name.as_deref())
    }

    pub fn program(&self) -> Option<&str> {
        self.inner.as_ref().map(|i| i.command.program.as_str())
    }

    pub fn args(&self) -> &[String] {
        self.inner.as_ref().map(|i| i.command.args.as_slice()).unwrap_or(&[])
    }

    /// Configured and added environment entries
    pub fn env(&self) -> Vec<String> {
        self.inner
            .as_ref()
            .map(|i| lock(&i.config).env().to_vec())
            .unwrap_or_default()
    }

    /// The environment the child will be started with
    pub fn child_environment(&self) -> Vec<String> {
        self.inner
            .as_ref()
            .map(Inner::child_environment)
            .unwrap_or_default()
    }

    pub fn stdout(&self) -> Sink {
        self.inner
            .as_ref()
            .map(|i| lock(&i.config).stdout())
            .unwrap_or_else(Sink::discard)
    }

    pub fn stderr(&self) -> Sink {
        self.inner
            .as_ref()
            .map(|i| lock(&i.config).stderr())
            .unwrap_or_else(Sink::discard)
    }

    /// Current lifecycle state, `None` when unconfigured
    pub fn state(&self) -> Option<ProcessState> {
        self.inner.as_ref().map(Inner::state)
    }

    /// OS pid while running; it doubles as the process group id
    pub fn pid(&self) -> Option<u32> {
        self.state().and_then(|s| s.pid())
    }

    fn inner(&self) -> Result<&Inner> {
        self.inner.as_ref().ok_or(DroverError::NotConfigured)
    }
}

#[async_trait]
impl Process for ManagedProcess {
    async fn run(&self) -> Result<()> {
        self.inner()?.run().await
    }

    fn add_env(&self, key: &str, value: &str) -> Result<()> {
        let inner = self.inner()?;
        lock(&inner.config).push_env(key, value);
        Ok(())
    }

    fn signal(&self, signal: Signal) -> Result<()> {
        self.inner()?.signal(signal)
    }

    fn kill(&self) -> Result<()> {
        self.inner()?.kill()
    }
}

impl Inner {
    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.command.program)
    }

    fn state(&self) -> ProcessState {
        *lock(&self.state)
    }

    fn set_state(&self, state: ProcessState) {
        *lock(&self.state) = state;
    }

    /// Unicode view of the child environment; the child itself also gets
    /// host variables that are not valid unicode
    fn child_environment(&self) -> Vec<String> {
        let config = lock(&self.config);
        let mut env = if self.replace_env {
            Vec::new()
        } else {
            host_environment()
        };
        env.extend(config.env().iter().cloned());
        env
    }

    /// Build and start the OS process, returning it with its output sinks
    fn spawn(&self) -> Result<(Child, Sink, Sink)> {
        let (stdout, stderr) = {
            let config = lock(&self.config);
            (config.stdout(), config.stderr())
        };

        let mut std_cmd = std::process::Command::new(&self.command.program);
        std_cmd.args(&self.command.args);
        // Outside replace mode the host environment is inherited as raw bytes
        if self.replace_env {
            std_cmd.env_clear();
        }
        let entries = lock(&self.config).env().to_vec();
        for entry in entries {
            match split_env_entry(&entry) {
                Some((key, value)) => {
                    std_cmd.env(key, value);
                }
                None => warn!(name = %self.label(), entry = %entry, "Skipping malformed environment entry"),
            }
        }
        // The child leads a new process group, so pid == pgid
        std_cmd.process_group(0);

        let mut cmd = Command::from(std_cmd);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| DroverError::Spawn {
            program: self.command.program.clone(),
            source,
        })?;

        Ok((child, stdout, stderr))
    }

    async fn run(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(DroverError::AlreadyStarted);
        }

        if self.cancel.is_cancelled() {
            debug!(name = %self.label(), "Cancelled before start");
            self.set_state(ProcessState::Killed);
            return Err(DroverError::Cancelled);
        }

        let (mut child, stdout, stderr) = match self.spawn() {
            Ok(spawned) => spawned,
            Err(e) => {
                warn!(name = %self.label(), error = %e, "Process failed to start");
                self.set_state(ProcessState::Failed);
                return Err(e);
            }
        };

        let Some(pid) = child.id() else {
            self.set_state(ProcessState::Failed);
            return Err(DroverError::internal("Spawned child did not have a PID"));
        };
        self.set_state(ProcessState::Running { pid });

        debug!(
            name = %self.label(),
            pid = pid,
            pgid = pid,
            program = %self.command.program,
            "Process spawned"
        );

        let pumps: Vec<JoinHandle<()>> = [
            pump(child.stdout.take(), stdout),
            pump(child.stderr.take(), stderr),
        ]
        .into_iter()
        .flatten()
        .collect();

        let exited = tokio::select! {
            biased;
            status = child.wait() => Some(status),
            _ = self.cancel.cancelled() => None,
        };

        let result = match exited {
            Some(Ok(status)) if status.success() => {
                debug!(name = %self.label(), pid = pid, "Process exited");
                self.set_state(ProcessState::Completed);
                Ok(())
            }
            Some(Ok(status)) => {
                debug!(name = %self.label(), pid = pid, status = %status, "Process failed");
                self.set_state(ProcessState::Failed);
                Err(DroverError::Exited {
                    program: self.command.program.clone(),
                    status,
                })
            }
            Some(Err(e)) => {
                self.set_state(ProcessState::Failed);
                Err(DroverError::Wait(e))
            }
            None => {
                debug!(name = %self.label(), pgid = pid, "Cancelled, killing process group");
                let killed = self.kill();
                if let Err(e) = child.wait().await {
                    warn!(name = %self.label(), pid = pid, error = %e, "Failed to reap killed process");
                }
                self.set_state(ProcessState::Killed);
                killed
            }
        };

        drain(self.label(), pumps).await;
        result
    }

    fn signal(&self, signal: Signal) -> Result<()> {
        let pid = self.state().pid().ok_or(DroverError::NotRunning)?;
        let raw = pid as i32;

        signal::kill(Pid::from_raw(raw), signal).map_err(|source| DroverError::Signal {
            pid: raw,
            signal,
            source,
        })?;

        debug!(name = %self.label(), pid = pid, signal = %signal, "Sent signal");
        Ok(())
    }

    /// Send SIGKILL to the process group
    fn kill(&self) -> Result<()> {
        let pgid = self.state().pid().ok_or(DroverError::NotRunning)?;
        kill_process_group(pgid)?;
        debug!(name = %self.label(), pgid = pgid, "Sent SIGKILL to process group");
        Ok(())
    }
}

/// SIGKILL every process in a group; a group that is already gone is not an error
fn kill_process_group(pgid: u32) -> Result<()> {
    let target = -(pgid as i32); // Negative for process group

    match signal::kill(Pid::from_raw(target), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(source) => Err(DroverError::Signal {
            pid: target,
            signal: Signal::SIGKILL,
            source,
        }),
    }
}

/// Copy a child pipe into a sink until EOF.
///
/// Sink writes are blocking, so they run on the blocking pool and a stalled
/// terminal cannot hold up a runtime worker.
fn pump<R>(reader: Option<R>, sink: Sink) -> Option<JoinHandle<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut reader = reader?;

    Some(tokio::spawn(async move {
        let mut buf = [0u8; 8192];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    let chunk = buf[..n].to_vec();
                    if let Err(e) = forward(&sink, move |s| s.write_all(&chunk)).await {
                        warn!(error = %e, "Failed to forward process output");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read process output");
                    break;
                }
            }
        }
        if let Err(e) = forward(&sink, |s| s.flush()).await {
            warn!(error = %e, "Failed to flush process output");
        }
    }))
}

async fn forward<F>(sink: &Sink, op: F) -> io::Result<()>
where
    F: FnOnce(&mut Sink) -> io::Result<()> + Send + 'static,
{
    let mut sink = sink.clone();
    tokio::task::spawn_blocking(move || op(&mut sink))
        .await
        .map_err(io::Error::other)?
}

/// Wait for output forwarding to finish, detaching pipes held open by
/// processes that left the group
async fn drain(label: &str, pumps: Vec<JoinHandle<()>>) {
    for mut pump in pumps {
        if tokio::time::timeout(DRAIN_TIMEOUT, &mut pump).await.is_err() {
            warn!(name = %label, "Output still open after exit, detaching");
            pump.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
