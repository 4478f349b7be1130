//! Structured logging setup.
//!
//! Everything in the crate logs through `tracing`. A host that wants output
//! installs a subscriber once at startup, either its own or the one built by
//! [`init_logging_with_config`]:
//!
//! ```no_run
//! use viewcore::logging::{init_logging_with_config, LogConfig};
//!
//! init_logging_with_config(&LogConfig::from_env()).expect("logging");
//! ```
//!
//! Environment variables read by [`LogConfig::from_env`]:
//!
//! | Variable | Default |
//! |---|---|
//! | `VIEW_LOG_LEVEL` | `info` |
//! | `VIEW_LOG_FORMAT` (`json` or `pretty`) | `json` |
//! | `VIEW_LOG_ASYNC` | `true` |
//! | `VIEW_LOG_FILTER` (comma-separated directives) | none |
//! | `VIEW_LOG_LOCATION` | `false` |
//!
//! `RUST_LOG` takes precedence over `VIEW_LOG_LEVEL`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use tracing::{info, warn, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Target of the per-response route log.
pub const ROUTE_TARGET: &str = "viewcore::route";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

/// Logging configuration, from the environment or the `log` section of the
/// application config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// trace/debug/info/warn/error
    pub level: String,
    pub format: LogFormat,
    /// Write through a non-blocking background writer.
    pub async_logging: bool,
    /// Extra filter directives, comma-separated.
    pub target_filter: Option<String>,
    /// Include file and line in each event.
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::Json,
            async_logging: true,
            target_filter: None,
            include_location: false,
        }
    }
}

impl LogConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            level: env::var("VIEW_LOG_LEVEL").unwrap_or(defaults.level),
            format: env::var("VIEW_LOG_FORMAT")
                .map(|s| LogFormat::parse(&s))
                .unwrap_or(defaults.format),
            async_logging: env_flag("VIEW_LOG_ASYNC").unwrap_or(defaults.async_logging),
            target_filter: env::var("VIEW_LOG_FILTER").ok(),
            include_location: env_flag("VIEW_LOG_LOCATION").unwrap_or(defaults.include_location),
        }
    }

    /// Pretty, synchronous, debug-level output for local development.
    #[must_use]
    pub fn default_dev() -> Self {
        Self {
            level: "debug".to_owned(),
            format: LogFormat::Pretty,
            async_logging: false,
            target_filter: None,
            include_location: true,
        }
    }

    fn level(&self) -> Level {
        match self.level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level().as_str()));
        let directives = self.target_filter.as_deref().unwrap_or_default();
        for directive in directives.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            match directive.parse() {
                Ok(directive) => filter = filter.add_directive(directive),
                Err(e) => warn!(directive, error = %e, "ignoring invalid log filter directive"),
            }
        }
        filter
    }
}

/// `1`, `true` and `yes` are true; `0`, `false` and `no` are false.
pub(crate) fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

pub(crate) fn env_flag(name: &str) -> Option<bool> {
    env::var(name).ok().as_deref().and_then(parse_flag)
}

/// Install the global subscriber.
///
/// Fails if a global subscriber is already set.
pub fn init_logging_with_config(config: &LogConfig) -> Result<()> {
    let registry = tracing_subscriber::registry().with(config.env_filter());
    let location = config.include_location;

    if config.async_logging {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
        let fmt_layer = match config.format {
            LogFormat::Json => tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_target(true)
                .with_file(location)
                .with_line_number(location)
                .with_writer(writer)
                .boxed(),
            LogFormat::Pretty => tracing_subscriber::fmt::layer()
                .pretty()
                .with_target(true)
                .with_file(location)
                .with_line_number(location)
                .with_writer(writer)
                .boxed(),
        };
        registry
            .with(fmt_layer)
            .try_init()
            .context("failed to initialise async logging")?;
        // Flushes on drop; the writer lives for the whole process.
        std::mem::forget(guard);
    } else {
        let fmt_layer = match config.format {
            LogFormat::Json => tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_target(true)
                .with_file(location)
                .with_line_number(location)
                .boxed(),
            LogFormat::Pretty => tracing_subscriber::fmt::layer()
                .pretty()
                .with_target(true)
                .with_file(location)
                .with_line_number(location)
                .boxed(),
        };
        registry
            .with(fmt_layer)
            .try_init()
            .context("failed to initialise logging")?;
    }
    Ok(())
}

/// Record one emitted response.
pub fn route_log(status: u16, path: &str, method: &str) {
    info!(target: ROUTE_TARGET, status, path, method, "route");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("PRETTY"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("other"), LogFormat::Json);
    }

    #[test]
    fn test_level_fallback() {
        let config = LogConfig {
            level: "loud".into(),
            ..LogConfig::default()
        };
        assert_eq!(config.level(), Level::INFO);
        assert_eq!(LogConfig::default_dev().level(), Level::DEBUG);
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("YES"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_deserialize_partial_section() {
        let config: LogConfig = serde_yaml::from_str("format: pretty\nlevel: warn\n").unwrap();
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.level, "warn");
        assert!(config.async_logging);
    }
}
