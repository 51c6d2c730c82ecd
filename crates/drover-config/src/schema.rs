//! Raw launch file schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Group-wide settings
    #[serde(default)]
    pub group: RawGroupConfig,

    /// Processes to launch, in order
    #[serde(default)]
    pub processes: Vec<RawProcess>,
}

/// Group-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawGroupConfig {
    /// `KEY=VALUE` entries handed to every process
    #[serde(default)]
    pub env: Vec<String>,

    /// How `env` combines with the launcher's own environment
    #[serde(default)]
    pub env_mode: RawEnvMode,

    /// Prefix output lines with a timestamp
    #[serde(default)]
    pub timestamps: bool,

    /// Cancel the whole group after this many seconds (0 = never)
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RawEnvMode {
    #[default]
    Replace,
    Merge,
}

/// Raw process definition
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawProcess {
    /// Label used to prefix this process's output
    pub name: String,

    /// Whitespace-separated command line
    pub command: String,

    /// Extra variables for this process only
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}
