//! drover - run a group of processes as one unit
//!
//! Wires a launch file to a process group:
//! - Labelled stdout/stderr for every process
//! - SIGHUP forwarded to all processes
//! - First SIGINT/SIGTERM forwards SIGTERM, the second kills every process group
//! - Optional overall timeout

use anyhow::{Context, Result};
use clap::Parser;
use drover_api::{ConfigOption, Process, Signal, Sink};
use drover_config::{LaunchConfig, load_config};
use drover_core::ProcessGroup;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// drover - run a group of processes as one unit
#[derive(Parser, Debug)]
#[command(name = "drover")]
#[command(about = "Run a group of processes as one unit", long_about = None)]
struct Args {
    /// Launch file path (or set DROVER_CONFIG env var)
    #[arg(short, long, env = "DROVER_CONFIG", default_value = "drover.toml")]
    config: PathBuf,

    /// Cancel the group after this many seconds, overriding the launch file (0 disables)
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Build a group from a launch file, writing labelled output to `stdout`/`stderr`
fn build_group(
    config: &LaunchConfig,
    cancel: CancellationToken,
    stdout: Sink,
    stderr: Sink,
) -> Result<ProcessGroup> {
    let mut options = vec![
        ConfigOption::Stdout(stdout),
        ConfigOption::Stderr(stderr),
        ConfigOption::EnvMode(config.group.env_mode),
    ];
    if !config.group.env.is_empty() {
        options.push(ConfigOption::Env(config.group.env.clone()));
    }

    let group = ProcessGroup::new(cancel, options)
        .context("Failed to configure process group")?
        .with_timestamps(config.group.timestamps);

    for entry in &config.processes {
        let process = group
            .new_process(&entry.name, &entry.command)
            .with_context(|| format!("Failed to create process '{}'", entry.name))?;

        for (key, value) in &entry.env {
            process
                .add_env(key, value)
                .with_context(|| format!("Failed to set {} for '{}'", key, entry.name))?;
        }
    }

    Ok(group)
}

/// The command-line timeout wins over the launch file; 0 disables the timeout
fn resolve_timeout(cli: Option<u64>, launch: Option<Duration>) -> Option<Duration> {
    match cli {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => launch,
    }
}

/// Handle a stop request: SIGTERM the first time, cancel the second
async fn request_stop(group: &ProcessGroup, stopping: &mut bool, source: &str) {
    if *stopping {
        warn!(signal = source, "Second stop request, killing process groups");
        group.cancel();
        return;
    }

    *stopping = true;
    info!(signal = source, "Stopping process group");
    if let Err(e) = group.signal(Signal::SIGTERM).await {
        warn!(error = %e, "Failed to deliver SIGTERM to every process");
    }
}

/// Run the group until it finishes, reacting to signals sent to drover
async fn supervise(group: Arc<ProcessGroup>) -> Result<()> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
    let mut sighup = signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

    let mut runner = {
        let group = group.clone();
        tokio::spawn(async move { group.run().await })
    };
    let mut stopping = false;

    loop {
        tokio::select! {
            joined = &mut runner => {
                return joined
                    .context("Process group task panicked")?
                    .context("Process group failed");
            }
            _ = sighup.recv() => {
                info!("Received SIGHUP, forwarding to process group");
                if let Err(e) = group.signal(Signal::SIGHUP).await {
                    warn!(error = %e, "Failed to deliver SIGHUP to every process");
                }
            }
            _ = sigint.recv() => request_stop(&group, &mut stopping, "SIGINT").await,
            _ = sigterm.recv() => request_stop(&group, &mut stopping, "SIGTERM").await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; stdout carries process output
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "drover starting");

    let config = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    info!(
        config_path = %args.config.display(),
        process_count = config.processes.len(),
        "Configuration loaded"
    );

    let cancel = CancellationToken::new();
    let group = Arc::new(build_group(
        &config,
        cancel.clone(),
        Sink::stdout(),
        Sink::stderr(),
    )?);

    if let Some(timeout) = resolve_timeout(args.timeout, config.group.timeout()) {
        info!(timeout_secs = timeout.as_secs(), "Group timeout armed");
        let deadline = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            warn!("Group timeout reached, killing process groups");
            deadline.cancel();
        });
    }

    supervise(group).await
}
