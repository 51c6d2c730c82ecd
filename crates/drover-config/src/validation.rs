//! Launch file validation

use crate::schema::{RawConfig, RawProcess};
use drover_util::{CommandLine, split_env_entry};
use std::collections::HashSet;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Process '{name}': {message}")]
    ProcessError { name: String, message: String },

    #[error("Duplicate process name: {0}")]
    DuplicateName(String),

    #[error("Invalid group environment entry '{0}': expected KEY=VALUE")]
    InvalidGroupEnv(String),

    #[error("No processes configured")]
    NoProcesses,
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.processes.is_empty() {
        errors.push(ValidationError::NoProcesses);
    }

    for entry in &config.group.env {
        if split_env_entry(entry).is_none() {
            errors.push(ValidationError::InvalidGroupEnv(entry.clone()));
        }
    }

    let mut seen = HashSet::new();
    for process in &config.processes {
        if !seen.insert(&process.name) {
            errors.push(ValidationError::DuplicateName(process.name.clone()));
        }
    }

    for process in &config.processes {
        errors.extend(validate_process(process));
    }

    errors
}

fn validate_process(process: &RawProcess) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let error = |message: &str| ValidationError::ProcessError {
        name: process.name.clone(),
        message: message.to_string(),
    };

    if process.name.trim().is_empty() {
        errors.push(error("name must not be empty"));
    }

    if CommandLine::parse(&process.command).is_err() {
        errors.push(error("command must not be empty"));
    }

    for key in process.env.keys() {
        if key.is_empty() || key.contains('=') {
            errors.push(error(&format!("invalid environment variable name '{}'", key)));
        }
    }

    errors
}
