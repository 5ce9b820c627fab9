//! Configuration parsing and validation.
//!
//! Every field has a default, so an empty TOML document (or no file at all)
//! yields a usable configuration.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Frame codec tuning.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct FramingConfig {
    /// Bytes handed to a single write before flushing.
    #[serde(default = "default_write_chunk_bytes")]
    pub write_chunk_bytes: usize,
    /// Upper bound on a single body read.
    #[serde(default = "default_read_chunk_bytes")]
    pub read_chunk_bytes: usize,
    /// Per-operation timeout; 0 means no timeout.
    #[serde(default)]
    pub timeout_seconds: u64,
}

fn default_write_chunk_bytes() -> usize {
    4096
}

fn default_read_chunk_bytes() -> usize {
    1024
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            write_chunk_bytes: default_write_chunk_bytes(),
            read_chunk_bytes: default_read_chunk_bytes(),
            timeout_seconds: 0,
        }
    }
}

impl FramingConfig {
    /// Configured timeout, or `None` when disabled.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }
}

/// Shell command runner defaults.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ShellConfig {
    /// How long to wait for output or exit before giving up.
    #[serde(default = "default_shell_timeout")]
    pub timeout_seconds: u64,
    /// Line reader buffer limit before falling back to `\r`.
    #[serde(default = "default_line_limit_bytes")]
    pub line_limit_bytes: usize,
    /// Capacity of the bounded output-line channel.
    #[serde(default = "default_output_queue")]
    pub output_queue: usize,
    /// Whether spawned commands inherit the current environment.
    #[serde(default = "default_true")]
    pub inherit_env: bool,
}

fn default_shell_timeout() -> u64 {
    3600
}

fn default_line_limit_bytes() -> usize {
    64 * 1024
}

fn default_output_queue() -> usize {
    256
}

fn default_true() -> bool {
    true
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_shell_timeout(),
            line_limit_bytes: default_line_limit_bytes(),
            output_queue: default_output_queue(),
            inherit_env: true,
        }
    }
}

impl ShellConfig {
    /// Configured command timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Background worker pool sizing.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct WorkersConfig {
    /// Maximum blocking jobs running at once.
    #[serde(default = "default_max_workers")]
    pub max_workers: u32,
}

fn default_max_workers() -> u32 {
    4
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
        }
    }
}

/// Top-level configuration parsed from `buildwire.toml`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct BuildwireConfig {
    /// Frame codec settings.
    #[serde(default)]
    pub framing: FramingConfig,
    /// Shell runner settings.
    #[serde(default)]
    pub shell: ShellConfig,
    /// Worker pool settings.
    #[serde(default)]
    pub workers: WorkersConfig,
}

impl BuildwireConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let checks = [
            ("framing.write_chunk_bytes", self.framing.write_chunk_bytes),
            ("framing.read_chunk_bytes", self.framing.read_chunk_bytes),
            ("shell.line_limit_bytes", self.shell.line_limit_bytes),
            ("shell.output_queue", self.shell.output_queue),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(AppError::Config(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        if self.workers.max_workers == 0 {
            return Err(AppError::Config(
                "workers.max_workers must be greater than zero".into(),
            ));
        }

        if self.shell.timeout_seconds == 0 {
            return Err(AppError::Config(
                "shell.timeout_seconds must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}
