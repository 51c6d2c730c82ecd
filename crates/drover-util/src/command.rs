//! Command line splitting
//!
//! Commands are split on runs of whitespace. There is no quoting or escaping:
//! `sh -c 'echo hi'` yields four words.

use crate::{DroverError, Result};

/// A program name and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    /// Split a command line into program and arguments
    pub fn parse(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace().map(str::to_string);
        let program = words.next().ok_or(DroverError::EmptyCommand)?;

        Ok(Self {
            program,
            args: words.collect(),
        })
    }
}
