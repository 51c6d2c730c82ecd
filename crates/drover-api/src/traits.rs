//! The process trait the group drives

use async_trait::async_trait;
use drover_util::Result;

pub use nix::sys::signal::Signal;

/// A single member of a process group.
///
/// Implementations use interior mutability: a group runs and signals the
/// same member concurrently through shared references.
#[async_trait]
pub trait Process: Send + Sync {
    /// Start the process and wait for it to finish or be cancelled
    async fn run(&self) -> Result<()>;

    /// Append one environment variable for the next start
    fn add_env(&self, key: &str, value: &str) -> Result<()>;

    /// Deliver a signal to the running process
    fn signal(&self, signal: Signal) -> Result<()>;

    /// Kill the process and everything in its OS process group
    fn kill(&self) -> Result<()>;
}
