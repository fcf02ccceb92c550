//! Error types for nextgho

use thiserror::Error;

use crate::types::AntennaId;

/// Error types for the nextgho library.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reference to an antenna that is not in the topology.
    #[error("Unknown antenna: {0}")]
    UnknownAntenna(AntennaId),

    /// File I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing errors.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}
