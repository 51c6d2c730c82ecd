//! Process seam for drover
//!
//! This crate defines the interface shared by the process implementation and
//! the group that drives it. It contains no platform code itself.

mod config;
mod mock;
mod sink;
mod state;
mod traits;

pub use config::*;
pub use mock::*;
pub use sink::*;
pub use state::*;
pub use traits::*;
