//! Process group: shared cancellation and fan-out over members

use drover_api::{ConfigOption, Configuration, Process, Signal, Sink};
use drover_host_unix::ManagedProcess;
use drover_util::{DroverError, Result};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::LineLogger;

/// A set of processes run, signalled and cancelled as one unit.
///
/// Members are appended by [`ProcessGroup::new_process`] or
/// [`ProcessGroup::add_process`] and never removed. `ProcessGroup::default()`
/// is unconfigured: it has no cancellation token and every action fails
/// with [`DroverError::NotConfigured`].
#[derive(Default)]
pub struct ProcessGroup {
    cancel: Option<CancellationToken>,
    config: Configuration,
    timestamps: bool,
    processes: Mutex<Vec<Arc<dyn Process>>>,
}

impl ProcessGroup {
    /// Create a group bound to a cancellation token.
    ///
    /// Options are applied in order and the first failure is returned.
    pub fn new(
        cancel: CancellationToken,
        options: impl IntoIterator<Item = ConfigOption>,
    ) -> Result<Self> {
        Ok(Self {
            cancel: Some(cancel),
            config: Configuration::from_options(options)?,
            timestamps: false,
            processes: Mutex::new(Vec::new()),
        })
    }

    /// Stamp each labelled output line with the local time
    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.cancel.is_some()
    }

    /// Fire the shared token, killing every running member's process group
    pub fn cancel(&self) {
        if let Some(cancel) = &self.cancel {
            info!("Cancelling process group");
            cancel.cancel();
        }
    }

    pub fn stdout(&self) -> Sink {
        self.config.stdout()
    }

    pub fn stderr(&self) -> Sink {
        self.config.stderr()
    }

    pub fn env(&self) -> &[String] {
        self.config.env()
    }

    pub fn len(&self) -> usize {
        self.members().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members().is_empty()
    }

    /// Per-process options: labelled stdout/stderr and the group environment.
    ///
    /// Without a group stderr sink, child stderr is labelled onto stdout.
    fn process_options(&self, name: &str) -> Vec<ConfigOption> {
        let stdout = LineLogger::new(name, self.config.stdout()).with_timestamps(self.timestamps);
        let stderr = LineLogger::new(name, self.config.stderr_or_stdout())
            .with_timestamps(self.timestamps);

        let mut options = vec![
            ConfigOption::Stdout(stdout.into_sink()),
            ConfigOption::Stderr(stderr.into_sink()),
            ConfigOption::EnvMode(self.config.env_mode()),
        ];

        if !self.config.env().is_empty() {
            options.push(ConfigOption::Env(self.config.env().to_vec()));
        }

        options
    }

    /// Create a named process from a command line and add it to the group.
    ///
    /// The returned handle can still receive [`Process::add_env`] calls
    /// before the group is run.
    pub fn new_process(&self, name: &str, command_line: &str) -> Result<Arc<ManagedProcess>> {
        let cancel = self.cancel.as_ref().ok_or(DroverError::NotConfigured)?;

        let process = ManagedProcess::new(cancel.clone(), command_line, self.process_options(name))?
            .with_name(name);
        let process = Arc::new(process);

        self.members().push(process.clone());
        debug!(name = %name, command = %command_line, "Process added to group");

        Ok(process)
    }

    /// Add an already constructed process
    pub fn add_process(&self, process: Arc<dyn Process>) -> Result<()> {
        if self.cancel.is_none() {
            return Err(DroverError::NotConfigured);
        }
        self.members().push(process);
        Ok(())
    }

    /// Run every member concurrently and wait for all of them.
    ///
    /// A failing member does not stop its siblings. When several fail, the
    /// first failure observed is returned.
    pub async fn run(&self) -> Result<()> {
        let members = self.snapshot()?;
        info!(members = members.len(), "Running process group");

        let mut tasks = JoinSet::new();
        for member in members {
            tasks.spawn(async move { member.run().await });
        }

        let result = first_error(tasks).await;
        match &result {
            Ok(()) => info!("Process group finished"),
            Err(e) => warn!(error = %e, "Process group finished with error"),
        }
        result
    }

    /// Deliver a signal to every member concurrently.
    ///
    /// Delivery is attempted on all members even when some fail; the first
    /// failure observed is returned.
    pub async fn signal(&self, signal: Signal) -> Result<()> {
        let members = self.snapshot()?;
        debug!(members = members.len(), signal = %signal, "Signalling process group");

        let mut tasks = JoinSet::new();
        for member in members {
            tasks.spawn_blocking(move || member.signal(signal));
        }

        first_error(tasks).await
    }

    fn members(&self) -> MutexGuard<'_, Vec<Arc<dyn Process>>> {
        self.processes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stable copy of the members for fan-out; an empty group is an error
    fn snapshot(&self) -> Result<Vec<Arc<dyn Process>>> {
        let members = self.members().clone();
        if members.is_empty() {
            return Err(DroverError::NotConfigured);
        }
        Ok(members)
    }
}

impl fmt::Debug for ProcessGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessGroup")
            .field("configured", &self.is_configured())
            .field("config", &self.config)
            .field("timestamps", &self.timestamps)
            .field("members", &self.len())
            .finish()
    }
}

/// Wait for every task, keeping the first error
async fn first_error(mut tasks: JoinSet<Result<()>>) -> Result<()> {
    let mut first = None;

    while let Some(joined) = tasks.join_next().await {
        let outcome = joined
            .map_err(|e| DroverError::internal(format!("Member task failed: {}", e)))
            .and_then(|result| result);

        if let Err(e) = outcome {
            if first.is_none() {
                first = Some(e);
            } else {
                debug!(error = %e, "Additional member failure");
            }
        }
    }

    match first {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
