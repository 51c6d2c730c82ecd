//! Shared utilities for drover
//!
//! This crate provides:
//! - Error types shared by every drover crate
//! - Naive command line splitting
//! - Host environment enumeration and `KEY=VALUE` helpers

mod command;
mod env;
mod error;

pub use command::*;
pub use env::*;
pub use error::*;
