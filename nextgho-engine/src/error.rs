//! Error types for the handover engine

use nextgho_common::{AntennaId, ConfigValidationError, SessionId};
use nextgho_radio::RadioError;
use thiserror::Error;

/// Errors surfaced to callers of the engine and the session store.
///
/// Each one rejects a single operation for a single session; none of them has
/// an effect on other sessions.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Session id not registered in the store
    #[error("Unknown session: {0}")]
    UnknownSession(SessionId),

    /// Antenna id not present in the catalog
    #[error("Unknown antenna: {0}")]
    UnknownAntenna(AntennaId),

    /// Session id already registered
    #[error("Session already registered: {0}")]
    DuplicateSession(SessionId),

    /// Radio topology error
    #[error("Radio error: {0}")]
    Radio(#[from] RadioError),

    /// Invalid configuration (startup only)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigValidationError),
}

/// Failures of the external antenna-selection predictor.
///
/// These never escape a decision cycle: the engine records them and falls
/// back to the A3 rule.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PredictorError {
    /// The call did not complete within the configured timeout
    #[error("Predictor timed out after {timeout_ms}ms")]
    Timeout {
        /// Timeout that elapsed
        timeout_ms: u64,
    },

    /// The predictor could not be reached or failed internally
    #[error("Predictor transport failure: {reason}")]
    Transport {
        /// Description of the failure
        reason: String,
    },

    /// The response could not be used
    #[error("Malformed predictor response: {reason}")]
    Malformed {
        /// What was wrong with it
        reason: String,
    },
}
