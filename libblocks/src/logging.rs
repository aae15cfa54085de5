//! Logging setup for hosts embedding libblocks
//!
//! The library only emits `tracing` events; installing a subscriber is up to
//! the host. This module offers the usual one:
//! - `text` for terminals and pipes
//! - `json` with one object per line, render span fields included
//! - `pretty` for development
//!
//! # Examples
//!
//! ```no_run
//! use libblocks::logging::{LogFormat, LoggingConfig};
//!
//! LoggingConfig::new(LogFormat::Json, "libblocks=debug".to_string(), false).init();
//!
//! // Or honor BLOCKS_LOG_FORMAT / BLOCKS_LOG_LEVEL
//! libblocks::logging::init_default();
//! ```

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!(
                "Invalid log format: '{}'. Valid options: text, json, pretty",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}

/// Subscriber settings
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// An `EnvFilter` directive such as `info` or `libblocks=trace`
    pub level: String,
    /// Forces `debug` unless `RUST_LOG` is set
    pub verbose: bool,
}

impl LoggingConfig {
    pub fn new(format: LogFormat, level: String, verbose: bool) -> Self {
        Self {
            format,
            level,
            verbose,
        }
    }

    /// Build from the `[logging]` section of the config file.
    ///
    /// An unknown format falls back to text.
    pub fn from_settings(settings: &LoggingSettings, verbose: bool) -> Self {
        let format = settings.format.parse().unwrap_or(LogFormat::Text);
        Self::new(format, settings.level.clone(), verbose)
    }

    /// `RUST_LOG` wins over the configured level
    fn filter(&self) -> EnvFilter {
        let fallback = if self.verbose { "debug" } else { self.level.as_str() };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
    }

    /// Install the global subscriber, writing to stderr.
    ///
    /// Returns false if a subscriber was already installed.
    pub fn init(&self) -> bool {
        let filter = self.filter();
        match self.format {
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .with_span_list(false)
                .flatten_event(true)
                .with_target(true)
                .try_init()
                .is_ok(),
            LogFormat::Pretty => tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_line_number(true)
                .with_file(true)
                .try_init()
                .is_ok(),
            LogFormat::Text => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(false)
                .try_init()
                .is_ok(),
        }
    }
}

/// Install a subscriber from `BLOCKS_LOG_FORMAT` and `BLOCKS_LOG_LEVEL`,
/// defaulting to text at `info`.
///
/// ```bash
/// BLOCKS_LOG_FORMAT=json BLOCKS_LOG_LEVEL=debug blocks-host --request request.json
/// ```
pub fn init_default() -> bool {
    let format = std::env::var("BLOCKS_LOG_FORMAT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(LogFormat::Text);
    let level = std::env::var("BLOCKS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    LoggingConfig::new(format, level, false).init()
}
