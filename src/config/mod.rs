pub mod validation;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use self::validation::validate_config;

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

/// Stream translation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_pool_max_idle")]
    pub pool_max_idle: usize,
    #[serde(default)]
    pub model: Option<String>,
}

fn default_pool_max_idle() -> usize {
    64
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            pool_max_idle: default_pool_max_idle(),
            model: None,
        }
    }
}

/// Whole-message conversion settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Tool name reserved for structured-output emulation.
    #[serde(default)]
    pub structured_output_tool: Option<String>,
}

/// Top-level bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub conversion: ConversionConfig,
}

/// Load configuration from a YAML file and validate it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when reading the file fails, [`ConfigError::Yaml`]
/// when parsing fails, or [`ConfigError::Validation`] when semantic validation fails.
pub fn load_config(path: impl AsRef<Path>) -> Result<BridgeConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parse and validate configuration from YAML text.
///
/// # Errors
///
/// Returns [`ConfigError::Yaml`] when parsing fails, or [`ConfigError::Validation`]
/// when semantic validation fails.
pub fn parse_config(contents: &str) -> Result<BridgeConfig, ConfigError> {
    let config: BridgeConfig = serde_yaml::from_str(contents)?;
    validate_config(&config)?;
    Ok(config)
}
