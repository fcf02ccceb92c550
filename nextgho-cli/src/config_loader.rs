//! Configuration loading for the nr-ho driver
//!
//! Reads a [`HandoverConfig`] from YAML, applies environment overrides once,
//! and validates the result. Nothing here runs after startup.
//!
//! # Environment overrides
//!
//! | Variable | Field |
//! |---|---|
//! | `HANDOVER_MODE` | `mode` |
//! | `ML_AUTO_ACTIVATION_THRESHOLD` | `ml_auto_activation_antenna_threshold` |
//! | `A3_HYSTERESIS_DB` | `a3.hysteresis_db` |
//! | `A3_TTT_S` | `a3.time_to_trigger_s` |
//! | `A3_MODE` | `a3.mode` |
//! | `MIN_HANDOVER_INTERVAL_S` | `pingpong.min_handover_interval_s` |
//! | `MAX_HANDOVERS_PER_MINUTE` | `pingpong.max_handovers_per_window` |
//! | `PINGPONG_WINDOW_S` | `pingpong.pingpong_window_s` |
//! | `PREDICTOR_TIMEOUT_MS` | `predictor.timeout_ms` |

use std::path::Path;
use std::str::FromStr;

use nextgho_common::{ConfigValidationError, HandoverConfig};
use thiserror::Error;
use tracing::info;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File read or YAML parse failure
    #[error("Failed to load configuration: {0}")]
    Load(#[from] nextgho_common::Error),

    /// Environment variable with an unusable value
    #[error("Invalid value for {name}: {value:?} ({reason})")]
    InvalidOverride {
        /// Variable name
        name: &'static str,
        /// Raw value
        value: String,
        /// Parse failure
        reason: String,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {0}")]
    Validation(#[from] ConfigValidationError),
}

/// Loads a handover configuration from a YAML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<HandoverConfig, ConfigError> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(nextgho_common::Error::from)?;
    load_config_from_str(&contents)
}

/// Loads a handover configuration from a YAML string.
///
/// An empty document yields the defaults.
pub fn load_config_from_str(yaml: &str) -> Result<HandoverConfig, ConfigError> {
    if yaml.trim().is_empty() {
        return Ok(HandoverConfig::default());
    }
    let config = serde_yaml::from_str(yaml).map_err(nextgho_common::Error::from)?;
    Ok(config)
}

fn parse_override<T>(name: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let parsed = value.trim().parse::<T>();
    parsed.map_err(|e| ConfigError::InvalidOverride {
        name,
        reason: e.to_string(),
        value,
    })
}

/// Applies overrides looked up through `lookup` (variable name to value).
pub fn apply_overrides<F>(config: &mut HandoverConfig, lookup: F) -> Result<usize, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut applied = 0;
    let mut get = |name: &'static str| {
        let value = lookup(name);
        if value.is_some() {
            applied += 1;
            info!("Configuration override from {}", name);
        }
        value.map(|v| (name, v))
    };

    if let Some((name, v)) = get("HANDOVER_MODE") {
        config.mode = parse_override(name, v)?;
    }
    if let Some((name, v)) = get("ML_AUTO_ACTIVATION_THRESHOLD") {
        config.ml_auto_activation_antenna_threshold = parse_override(name, v)?;
    }
    if let Some((name, v)) = get("A3_HYSTERESIS_DB") {
        config.a3.hysteresis_db = parse_override(name, v)?;
    }
    if let Some((name, v)) = get("A3_TTT_S") {
        config.a3.time_to_trigger_s = parse_override(name, v)?;
    }
    if let Some((name, v)) = get("A3_MODE") {
        config.a3.mode = parse_override(name, v)?;
    }
    if let Some((name, v)) = get("MIN_HANDOVER_INTERVAL_S") {
        config.pingpong.min_handover_interval_s = parse_override(name, v)?;
    }
    if let Some((name, v)) = get("MAX_HANDOVERS_PER_MINUTE") {
        config.pingpong.max_handovers_per_window = parse_override(name, v)?;
    }
    if let Some((name, v)) = get("PINGPONG_WINDOW_S") {
        config.pingpong.pingpong_window_s = parse_override(name, v)?;
    }
    if let Some((name, v)) = get("PREDICTOR_TIMEOUT_MS") {
        config.predictor.timeout_ms = parse_override(name, v)?;
    }
    Ok(applied)
}

/// Applies overrides from the process environment.
pub fn apply_env_overrides(config: &mut HandoverConfig) -> Result<usize, ConfigError> {
    apply_overrides(config, |name| std::env::var(name).ok())
}

/// Loads (or defaults), overrides from the environment, then validates.
pub fn load_and_validate_config<P: AsRef<Path>>(
    path: Option<P>,
) -> Result<HandoverConfig, ConfigError> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => HandoverConfig::default(),
    };
    apply_env_overrides(&mut config)?;
    config.validate()?;
    Ok(config)
}
