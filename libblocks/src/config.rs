//! Configuration management for libblocks

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::logging::LogFormat;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub renderer: RendererConfig,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// What the registry does when hook call order changes between passes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionalHookPolicy {
    /// Later hooks in the affected component start from fresh state
    #[default]
    Reset,
    /// Fail the pass with a protocol error
    Strict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    #[serde(default)]
    pub conditional_hooks: ConditionalHookPolicy,
    /// How many interrupt/resume cycles the local host drives per request
    #[serde(default = "default_max_resume_cycles")]
    pub max_resume_cycles: u32,
    /// Upper bound on waiting for one pending hook, e.g. "5s"
    #[serde(default = "default_resume_timeout")]
    pub resume_timeout: String,
}

fn default_max_resume_cycles() -> u32 {
    8
}

fn default_resume_timeout() -> String {
    "10s".to_string()
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            conditional_hooks: ConditionalHookPolicy::default(),
            max_resume_cycles: default_max_resume_cycles(),
            resume_timeout: default_resume_timeout(),
        }
    }
}

impl RendererConfig {
    pub fn resume_timeout(&self) -> std::result::Result<Duration, ConfigError> {
        humantime::parse_duration(&self.resume_timeout).map_err(|e| ConfigError::InvalidValue {
            field: "renderer.resume_timeout".to_string(),
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load from the default location, falling back to defaults when no
    /// config file exists
    pub fn load_or_default() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if !config_path.exists() {
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.renderer.resume_timeout()?;
        self.logging
            .format
            .parse::<LogFormat>()
            .map_err(|reason| ConfigError::InvalidValue {
                field: "logging.format".to_string(),
                reason,
            })?;
        Ok(())
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("BLOCKS_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("blocks").join("config.toml"))
}
