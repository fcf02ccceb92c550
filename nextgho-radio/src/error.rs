//! Error types for radio metric derivation

use nextgho_common::AntennaId;
use thiserror::Error;

/// Radio layer errors. Both variants are configuration errors: they indicate a
/// bad topology, never a transient condition.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RadioError {
    /// Antenna id not present in the catalog
    #[error("Unknown antenna in catalog: {0}")]
    UnknownAntenna(AntennaId),

    /// Antenna or model parameter outside its valid range
    #[error("Invalid radio parameter for {antenna}: {reason}")]
    InvalidParameter {
        /// Antenna the parameter belongs to
        antenna: AntennaId,
        /// Description of the problem
        reason: String,
    },
}
