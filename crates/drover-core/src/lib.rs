//! Process groups for drover
//!
//! A [`ProcessGroup`] owns an ordered set of processes that share one
//! cancellation token and one output configuration. Running or signalling
//! the group fans out to every member concurrently and reports the first
//! failure once all members are done.

mod group;
mod line_logger;

pub use group::*;
pub use line_logger::*;
