//! Error types for drover

use nix::errno::Errno;
use nix::sys::signal::Signal;
use std::fmt;
use thiserror::Error;

/// Once-only configuration fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigField {
    Environment,
    Stdout,
    Stderr,
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConfigField::Environment => "environment",
            ConfigField::Stdout => "stdout",
            ConfigField::Stderr => "stderr",
        };
        f.write_str(name)
    }
}

/// Core error type for process and group operations
#[derive(Debug, Error)]
pub enum DroverError {
    #[error("Process or group not configured")]
    NotConfigured,

    #[error("{0} already configured")]
    AlreadyConfigured(ConfigField),

    #[error("Empty command line")]
    EmptyCommand,

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} failed: {status}")]
    Exited {
        program: String,
        status: std::process::ExitStatus,
    },

    #[error("Wait failed: {0}")]
    Wait(#[source] std::io::Error),

    #[error("Process is not running")]
    NotRunning,

    #[error("Process already started")]
    AlreadyStarted,

    #[error("Failed to send {signal} to {pid}: {source}")]
    Signal {
        pid: i32,
        signal: Signal,
        #[source]
        source: Errno,
    },

    #[error("Cancelled before start")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DroverError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True for errors raised on an uninitialized entity or empty group
    pub fn is_not_configured(&self) -> bool {
        matches!(self, Self::NotConfigured)
    }

    pub fn is_already_configured(&self) -> bool {
        matches!(self, Self::AlreadyConfigured(_))
    }
}

pub type Result<T> = std::result::Result<T, DroverError>;
