//! Configuration management for Keyclass.

use serde::{Deserialize, Serialize};

use crate::error::{KeyclassError, Result};

/// Environment variable prefix for overrides, e.g. `KEYCLASS__LOGGING__LEVEL`.
pub const ENV_PREFIX: &str = "KEYCLASS";

/// Main configuration for the Keyclass binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyclassConfig {
    /// Path to the rule file
    #[serde(default)]
    pub rules_path: Option<String>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `keyclass=debug`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl KeyclassConfig {
    /// Load configuration from an optional file, then apply environment overrides.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }
        builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| KeyclassError::Config(e.to_string()))
    }
}
