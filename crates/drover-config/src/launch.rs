//! Validated launch configuration

use crate::schema::{RawConfig, RawEnvMode, RawGroupConfig, RawProcess};
use drover_api::EnvMode;
use std::time::Duration;

/// Validated launch configuration ready to build a group from
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    pub group: GroupSettings,
    pub processes: Vec<ProcessEntry>,
}

impl LaunchConfig {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            group: GroupSettings::from_raw(raw.group),
            processes: raw.processes.into_iter().map(ProcessEntry::from_raw).collect(),
        }
    }

    pub fn get_process(&self, name: &str) -> Option<&ProcessEntry> {
        self.processes.iter().find(|p| p.name == name)
    }
}

/// Group-wide settings
#[derive(Debug, Clone, Default)]
pub struct GroupSettings {
    pub env: Vec<String>,
    pub env_mode: EnvMode,
    pub timestamps: bool,
    timeout: Option<Duration>,
}

impl GroupSettings {
    /// Overall group timeout; `None` means no timeout
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn from_raw(raw: RawGroupConfig) -> Self {
        Self {
            env: raw.env,
            env_mode: match raw.env_mode {
                RawEnvMode::Replace => EnvMode::Replace,
                RawEnvMode::Merge => EnvMode::Merge,
            },
            timestamps: raw.timestamps,
            // 0 means no timeout
            timeout: raw
                .timeout_seconds
                .filter(|&secs| secs > 0)
                .map(Duration::from_secs),
        }
    }
}

/// A process to launch
#[derive(Debug, Clone)]
pub struct ProcessEntry {
    pub name: String,
    pub command: String,
    /// Added with `add_env` after the process is created
    pub env: Vec<(String, String)>,
}

impl ProcessEntry {
    fn from_raw(raw: RawProcess) -> Self {
        Self {
            name: raw.name,
            command: raw.command,
            env: raw.env.into_iter().collect(),
        }
    }
}
