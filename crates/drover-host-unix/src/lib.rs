//! Unix process implementation for drover
//!
//! Provides:
//! - Process spawning in a fresh OS process group
//! - Exit observation raced against a cancellation token
//! - Signal delivery to the process and SIGKILL to its whole group
//! - stdout/stderr forwarding into configured sinks

mod process;

pub use process::*;
