//! Configuration shared by processes and groups

use drover_util::{ConfigField, DroverError, Result, env_entry};

use crate::Sink;

/// How a configured environment list is combined with the host environment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EnvMode {
    /// The configured list is the child's whole environment
    #[default]
    Replace,
    /// The configured list is layered over the host environment
    Merge,
}

/// A single configuration step, applied in order during construction
#[derive(Debug, Clone)]
pub enum ConfigOption {
    Stdout(Sink),
    Stderr(Sink),
    Env(Vec<String>),
    EnvMode(EnvMode),
}

/// Environment and output sinks.
///
/// The environment and both sinks can each be set once; later attempts fail
/// with [`DroverError::AlreadyConfigured`] and leave the first value in place.
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    env: Vec<String>,
    env_mode: EnvMode,
    stdout: Option<Sink>,
    stderr: Option<Sink>,
}

impl Configuration {
    /// Build a configuration from options, stopping at the first failure
    pub fn from_options(options: impl IntoIterator<Item = ConfigOption>) -> Result<Self> {
        let mut config = Self::default();
        config.apply(options)?;
        Ok(config)
    }

    pub fn apply(&mut self, options: impl IntoIterator<Item = ConfigOption>) -> Result<()> {
        for option in options {
            self.apply_one(option)?;
        }
        Ok(())
    }

    pub fn apply_one(&mut self, option: ConfigOption) -> Result<()> {
        match option {
            ConfigOption::Stdout(sink) => self.set_stdout(sink),
            ConfigOption::Stderr(sink) => self.set_stderr(sink),
            ConfigOption::Env(env) => self.set_env(env),
            ConfigOption::EnvMode(mode) => {
                self.set_env_mode(mode);
                Ok(())
            }
        }
    }

    /// Configured stdout, or a discarding sink
    pub fn stdout(&self) -> Sink {
        self.stdout.clone().unwrap_or_else(Sink::discard)
    }

    /// Configured stderr, or a discarding sink
    pub fn stderr(&self) -> Sink {
        self.stderr.clone().unwrap_or_else(Sink::discard)
    }

    /// Configured stderr, else configured stdout, else a discarding sink
    pub fn stderr_or_stdout(&self) -> Sink {
        self.stderr
            .clone()
            .or_else(|| self.stdout.clone())
            .unwrap_or_else(Sink::discard)
    }

    pub fn env(&self) -> &[String] {
        &self.env
    }

    pub fn env_mode(&self) -> EnvMode {
        self.env_mode
    }

    pub fn set_env(&mut self, env: Vec<String>) -> Result<()> {
        if !self.env.is_empty() {
            return Err(DroverError::AlreadyConfigured(ConfigField::Environment));
        }
        self.env = env;
        Ok(())
    }

    pub fn set_env_mode(&mut self, mode: EnvMode) {
        self.env_mode = mode;
    }

    pub fn set_stdout(&mut self, sink: Sink) -> Result<()> {
        if self.stdout.is_some() {
            return Err(DroverError::AlreadyConfigured(ConfigField::Stdout));
        }
        self.stdout = Some(sink);
        Ok(())
    }

    pub fn set_stderr(&mut self, sink: Sink) -> Result<()> {
        if self.stderr.is_some() {
            return Err(DroverError::AlreadyConfigured(ConfigField::Stderr));
        }
        self.stderr = Some(sink);
        Ok(())
    }

    /// Append one `key=value` entry, bypassing the once-only check
    pub fn push_env(&mut self, key: &str, value: &str) {
        self.env.push(env_entry(key, value));
    }
}
