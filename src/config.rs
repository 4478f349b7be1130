//! # Configuration Module
//!
//! Two layers:
//!
//! - [`RuntimeConfig`] reads tuning knobs from the environment.
//! - [`AppConfig`] is a YAML document for everything an application sets up
//!   front, with the environment layered on top by
//!   [`AppConfig::with_env_overrides`].
//!
//! ## Environment Variables
//!
//! ### `VIEW_DEV`
//!
//! `1`, `true` or `yes` enables development mode: server-error responses and
//! WebSocket 1006 closes carry the error text.
//!
//! ### `VIEW_TASK_POOL_SIZE`
//!
//! Number of finished request tasks kept for reuse. Decimal (`256`) or
//! hexadecimal (`0x100`). Default: `256`.
//!
//! ### `VIEW_MAP_CAPACITY`
//!
//! Initial capacity of each route table. Default: `8`.
//!
//! ## Example
//!
//! ```yaml
//! dev: true
//! task_pool_size: 512
//! log:
//!   level: debug
//!   format: pretty
//! ```

use crate::awaitable::DEFAULT_POOL_SIZE;
use crate::logging::{env_flag, LogConfig};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

/// Default initial route-table capacity.
pub const DEFAULT_MAP_CAPACITY: usize = 8;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Yaml(serde_yaml::Error),
    /// A numeric setting that must be positive was zero.
    Zero(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
            ConfigError::Yaml(e) => write!(f, "invalid application config: {e}"),
            ConfigError::Zero(key) => write!(f, "{key} must be greater than zero"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Yaml(e) => Some(e),
            ConfigError::Zero(_) => None,
        }
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

/// Settings read from environment variables. Unset or unparsable variables
/// are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub dev: Option<bool>,
    pub task_pool_size: Option<usize>,
    pub map_capacity: Option<usize>,
}

impl RuntimeConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            dev: env_flag("VIEW_DEV"),
            task_pool_size: env::var("VIEW_TASK_POOL_SIZE").ok().and_then(|v| parse_size(&v)),
            map_capacity: env::var("VIEW_MAP_CAPACITY").ok().and_then(|v| parse_size(&v)),
        }
    }
}

/// Parse a decimal or `0x`-prefixed hexadecimal size.
fn parse_size(value: &str) -> Option<usize> {
    let value = value.trim();
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub dev: bool,
    pub task_pool_size: usize,
    pub map_capacity: usize,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dev: false,
            task_pool_size: DEFAULT_POOL_SIZE,
            map_capacity: DEFAULT_MAP_CAPACITY,
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// Read and validate a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()
    }

    /// Apply environment settings on top of this config.
    #[must_use]
    pub fn with_env_overrides(self, runtime: RuntimeConfig) -> Self {
        Self {
            dev: runtime.dev.unwrap_or(self.dev),
            task_pool_size: runtime.task_pool_size.unwrap_or(self.task_pool_size),
            map_capacity: runtime
                .map_capacity
                .filter(|c| *c > 0)
                .unwrap_or(self.map_capacity),
            log: self.log,
        }
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.map_capacity == 0 {
            return Err(ConfigError::Zero("map_capacity"));
        }
        Ok(self)
    }
}
