use super::{BridgeConfig, ConfigError};

const MAX_POOL_IDLE: usize = 4096;

/// Validate the full bridge config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &BridgeConfig) -> Result<(), ConfigError> {
    validate_log_level(config)?;
    validate_stream_config(config)?;
    validate_conversion_config(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_log_level(config: &BridgeConfig) -> Result<(), ConfigError> {
    let valid_levels = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL", "DISABLED"];
    if !valid_levels.contains(&config.features.log_level.to_uppercase().as_str()) {
        return Err(validation_err(format!(
            "log_level must be one of {valid_levels:?}"
        )));
    }
    Ok(())
}

fn validate_stream_config(config: &BridgeConfig) -> Result<(), ConfigError> {
    if config.stream.pool_max_idle > MAX_POOL_IDLE {
        return Err(validation_err(format!(
            "stream.pool_max_idle must be at most {MAX_POOL_IDLE}"
        )));
    }
    if let Some(ref model) = config.stream.model {
        if model.trim().is_empty() {
            return Err(validation_err("stream.model cannot be blank when set"));
        }
    }
    Ok(())
}

fn validate_conversion_config(config: &BridgeConfig) -> Result<(), ConfigError> {
    if let Some(ref name) = config.conversion.structured_output_tool {
        if name.trim().is_empty() {
            return Err(validation_err(
                "conversion.structured_output_tool cannot be blank when set",
            ));
        }
    }
    Ok(())
}
