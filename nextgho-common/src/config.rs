//! Handover engine configuration
//!
//! A single immutable [`HandoverConfig`] is built once at startup (from YAML,
//! optionally overridden by environment variables in the CLI) and threaded
//! through every component constructor. Every field carries a serde default so
//! partial configuration files are accepted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Decision mode selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandoverMode {
    /// Always consult the antenna-selection predictor
    Ml,
    /// Always use the deterministic A3 rule
    Rule,
    /// Choose ML when the catalog is large enough, rule otherwise
    #[default]
    Auto,
}

impl fmt::Display for HandoverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandoverMode::Ml => write!(f, "ml"),
            HandoverMode::Rule => write!(f, "rule"),
            HandoverMode::Auto => write!(f, "auto"),
        }
    }
}

impl FromStr for HandoverMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ml" => Ok(HandoverMode::Ml),
            "rule" => Ok(HandoverMode::Rule),
            "auto" => Ok(HandoverMode::Auto),
            _ => Err(format!("unknown handover mode: {s}")),
        }
    }
}

/// Quantity compared by the A3 trigger condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum A3Mode {
    /// Compare RSRP
    #[default]
    RsrpBased,
    /// Compare RSRQ
    RsrqBased,
    /// Both RSRP and RSRQ must satisfy the margin
    Mixed,
}

impl fmt::Display for A3Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            A3Mode::RsrpBased => write!(f, "rsrp_based"),
            A3Mode::RsrqBased => write!(f, "rsrq_based"),
            A3Mode::Mixed => write!(f, "mixed"),
        }
    }
}

impl FromStr for A3Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rsrp_based" | "rsrp" => Ok(A3Mode::RsrpBased),
            "rsrq_based" | "rsrq" => Ok(A3Mode::RsrqBased),
            "mixed" => Ok(A3Mode::Mixed),
            _ => Err(format!("unknown A3 mode: {s}")),
        }
    }
}

/// Event A3 trigger parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct A3Config {
    /// Hysteresis margin (dB)
    pub hysteresis_db: f64,
    /// Time-to-trigger (seconds)
    pub time_to_trigger_s: f64,
    /// Compared quantity
    pub mode: A3Mode,
}

impl Default for A3Config {
    fn default() -> Self {
        Self {
            hysteresis_db: 2.0,
            time_to_trigger_s: 0.0,
            mode: A3Mode::RsrpBased,
        }
    }
}

impl A3Config {
    /// Time-to-trigger in milliseconds.
    pub fn time_to_trigger_ms(&self) -> u64 {
        seconds_to_ms(self.time_to_trigger_s)
    }
}

/// Ping-pong suppression parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PingPongConfig {
    /// Master switch for the oscillation guard
    pub enabled: bool,
    /// Minimum time between two handovers of one session (seconds)
    pub min_handover_interval_s: f64,
    /// Maximum handovers tolerated within the rate window
    pub max_handovers_per_window: u32,
    /// Rate window length (seconds)
    pub rate_window_s: f64,
    /// Immediate-return window (seconds)
    pub pingpong_window_s: f64,
    /// Confidence required once the rate limit is reached
    pub rate_confidence_floor: f64,
    /// Confidence required to return to a recently-visited cell
    pub pingpong_confidence_floor: f64,
    /// Capacity of the recent-cell ring buffer
    pub recent_cells_capacity: usize,
}

impl Default for PingPongConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_handover_interval_s: 2.0,
            max_handovers_per_window: 3,
            rate_window_s: 60.0,
            pingpong_window_s: 10.0,
            rate_confidence_floor: 0.90,
            pingpong_confidence_floor: 0.95,
            recent_cells_capacity: 10,
        }
    }
}

impl PingPongConfig {
    /// Minimum handover interval in milliseconds.
    pub fn min_handover_interval_ms(&self) -> u64 {
        seconds_to_ms(self.min_handover_interval_s)
    }

    /// Rate window in milliseconds.
    pub fn rate_window_ms(&self) -> u64 {
        seconds_to_ms(self.rate_window_s)
    }

    /// Immediate-return window in milliseconds.
    pub fn pingpong_window_ms(&self) -> u64 {
        seconds_to_ms(self.pingpong_window_s)
    }

    /// Longest window any layer looks back over.
    pub fn tracking_window_ms(&self) -> u64 {
        self.rate_window_ms()
            .max(self.pingpong_window_ms())
            .max(self.min_handover_interval_ms())
    }
}

/// Radio metric derivation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    /// Number of resource blocks (N in the RSRQ formula)
    pub resource_blocks: u32,
    /// Thermal noise floor (dBm)
    pub noise_floor_dbm: f64,
    /// Enable log-normal shadow fading
    pub shadowing_enabled: bool,
    /// Seed for the shadow fading generator (entropy when unset)
    pub shadowing_seed: Option<u64>,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            resource_blocks: 50,
            noise_floor_dbm: -104.0,
            shadowing_enabled: false,
            shadowing_seed: None,
        }
    }
}

/// External predictor call policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Timeout for a single predictor call (ms)
    pub timeout_ms: u64,
    /// Additional attempts after a failed call, if the cycle deadline allows
    pub max_retries: u32,
    /// Overall decision cycle deadline covering all predictor attempts (ms)
    pub cycle_deadline_ms: u64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 200,
            max_retries: 0,
            cycle_deadline_ms: 500,
        }
    }
}

/// QoS gate parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QosGateConfig {
    /// Master switch for confidence/QoS gating of predictor decisions
    pub enabled: bool,
    /// Relative tolerance applied to every QoS bound (0.1 = 10%)
    pub violation_tolerance: f64,
}

impl Default for QosGateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            violation_tolerance: 0.0,
        }
    }
}

/// Top-level handover configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandoverConfig {
    /// Decision mode
    pub mode: HandoverMode,
    /// Catalog size at which `auto` mode switches to ML
    pub ml_auto_activation_antenna_threshold: usize,
    /// Event A3 parameters
    pub a3: A3Config,
    /// Ping-pong suppression parameters
    pub pingpong: PingPongConfig,
    /// Radio metric derivation parameters
    pub radio: RadioConfig,
    /// Predictor call policy
    pub predictor: PredictorConfig,
    /// QoS gate parameters
    pub qos: QosGateConfig,
}

impl Default for HandoverConfig {
    fn default() -> Self {
        Self {
            mode: HandoverMode::Auto,
            ml_auto_activation_antenna_threshold: 3,
            a3: A3Config::default(),
            pingpong: PingPongConfig::default(),
            radio: RadioConfig::default(),
            predictor: PredictorConfig::default(),
            qos: QosGateConfig::default(),
        }
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigValidationError {
    /// Invalid A3 parameters
    #[error("Invalid A3 configuration: {0}")]
    InvalidA3(String),

    /// Invalid ping-pong parameters
    #[error("Invalid ping-pong configuration: {0}")]
    InvalidPingPong(String),

    /// Confidence floor outside [0, 1]
    #[error("Invalid confidence floor {name}={value}: must be within [0, 1]")]
    InvalidConfidenceFloor {
        /// Parameter name
        name: &'static str,
        /// Offending value
        value: f64,
    },

    /// Invalid radio parameters
    #[error("Invalid radio configuration: {0}")]
    InvalidRadio(String),

    /// Invalid predictor parameters
    #[error("Invalid predictor configuration: {0}")]
    InvalidPredictor(String),

    /// Invalid QoS gate parameters
    #[error("Invalid QoS configuration: {0}")]
    InvalidQos(String),

    /// Invalid mode parameters
    #[error("Invalid mode configuration: {0}")]
    InvalidMode(String),
}

impl HandoverConfig {
    /// Validates the configuration.
    ///
    /// Only called at startup; a validated configuration never produces
    /// errors during steady-state operation.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.ml_auto_activation_antenna_threshold == 0 {
            return Err(ConfigValidationError::InvalidMode(
                "ml_auto_activation_antenna_threshold must be at least 1".to_string(),
            ));
        }

        let a3 = &self.a3;
        if !a3.hysteresis_db.is_finite() || a3.hysteresis_db < 0.0 {
            return Err(ConfigValidationError::InvalidA3(format!(
                "hysteresis_db {} must be a non-negative number",
                a3.hysteresis_db
            )));
        }
        if !a3.time_to_trigger_s.is_finite() || a3.time_to_trigger_s < 0.0 {
            return Err(ConfigValidationError::InvalidA3(format!(
                "time_to_trigger_s {} must be a non-negative number",
                a3.time_to_trigger_s
            )));
        }

        let pp = &self.pingpong;
        if !pp.min_handover_interval_s.is_finite() || pp.min_handover_interval_s < 0.0 {
            return Err(ConfigValidationError::InvalidPingPong(format!(
                "min_handover_interval_s {} must be a non-negative number",
                pp.min_handover_interval_s
            )));
        }
        if pp.max_handovers_per_window == 0 {
            return Err(ConfigValidationError::InvalidPingPong(
                "max_handovers_per_window must be at least 1".to_string(),
            ));
        }
        if !pp.rate_window_s.is_finite() || pp.rate_window_s <= 0.0 {
            return Err(ConfigValidationError::InvalidPingPong(format!(
                "rate_window_s {} must be positive",
                pp.rate_window_s
            )));
        }
        if !pp.pingpong_window_s.is_finite() || pp.pingpong_window_s <= 0.0 {
            return Err(ConfigValidationError::InvalidPingPong(format!(
                "pingpong_window_s {} must be positive",
                pp.pingpong_window_s
            )));
        }
        if pp.recent_cells_capacity == 0 {
            return Err(ConfigValidationError::InvalidPingPong(
                "recent_cells_capacity must be at least 1".to_string(),
            ));
        }
        validate_floor("rate_confidence_floor", pp.rate_confidence_floor)?;
        validate_floor("pingpong_confidence_floor", pp.pingpong_confidence_floor)?;

        let radio = &self.radio;
        if radio.resource_blocks == 0 {
            return Err(ConfigValidationError::InvalidRadio(
                "resource_blocks must be at least 1".to_string(),
            ));
        }
        if !radio.noise_floor_dbm.is_finite() {
            return Err(ConfigValidationError::InvalidRadio(
                "noise_floor_dbm must be finite".to_string(),
            ));
        }

        let predictor = &self.predictor;
        if predictor.timeout_ms == 0 {
            return Err(ConfigValidationError::InvalidPredictor(
                "timeout_ms must be positive".to_string(),
            ));
        }
        if predictor.cycle_deadline_ms < predictor.timeout_ms {
            return Err(ConfigValidationError::InvalidPredictor(format!(
                "cycle_deadline_ms {} must not be shorter than timeout_ms {}",
                predictor.cycle_deadline_ms, predictor.timeout_ms
            )));
        }

        if !self.qos.violation_tolerance.is_finite() || self.qos.violation_tolerance < 0.0 {
            return Err(ConfigValidationError::InvalidQos(format!(
                "violation_tolerance {} must be a non-negative number",
                self.qos.violation_tolerance
            )));
        }

        Ok(())
    }
}

fn validate_floor(name: &'static str, value: f64) -> Result<(), ConfigValidationError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigValidationError::InvalidConfidenceFloor { name, value });
    }
    Ok(())
}

/// Converts a (validated, non-negative) duration in seconds to milliseconds.
pub fn seconds_to_ms(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1000.0).round() as u64
}
