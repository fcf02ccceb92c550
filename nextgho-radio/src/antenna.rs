//! Antenna (cell) records

use std::collections::BTreeMap;

use nextgho_common::{AntennaId, GeoPosition};
use serde::{Deserialize, Serialize};

use crate::error::RadioError;
use crate::pathloss::PathLossModel;

/// Antenna catalog keyed by id. Ordered so every iteration is deterministic.
pub type AntennaCatalog = BTreeMap<AntennaId, AntennaRecord>;

/// A fixed radio cell.
///
/// Position and radio parameters are immutable after topology load; only
/// `load` changes at runtime through load reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AntennaRecord {
    /// Antenna identifier
    pub id: AntennaId,
    /// Antenna position
    pub position: GeoPosition,
    /// Transmit power (dBm)
    pub tx_power_dbm: f64,
    /// Antenna gain (dBi)
    #[serde(default)]
    pub antenna_gain_dbi: f64,
    /// Carrier frequency (Hz)
    pub frequency_hz: f64,
    /// Path-loss model and parameters
    #[serde(default)]
    pub path_loss: PathLossModel,
    /// Current load (0.0 - 1.0)
    #[serde(default)]
    pub load: f64,
}

impl AntennaRecord {
    /// Creates an antenna with the default path-loss model and zero load.
    pub fn new(
        id: impl Into<AntennaId>,
        position: GeoPosition,
        tx_power_dbm: f64,
        frequency_hz: f64,
    ) -> Self {
        Self {
            id: id.into(),
            position,
            tx_power_dbm,
            antenna_gain_dbi: 0.0,
            frequency_hz,
            path_loss: PathLossModel::default(),
            load: 0.0,
        }
    }

    /// Sets the antenna gain.
    pub fn with_gain(mut self, antenna_gain_dbi: f64) -> Self {
        self.antenna_gain_dbi = antenna_gain_dbi;
        self
    }

    /// Sets the path-loss model.
    pub fn with_path_loss(mut self, path_loss: PathLossModel) -> Self {
        self.path_loss = path_loss;
        self
    }

    /// Validates the record; a failure is a topology configuration error.
    pub fn validate(&self) -> Result<(), RadioError> {
        let invalid = |reason: String| RadioError::InvalidParameter {
            antenna: self.id.clone(),
            reason,
        };

        if !self.frequency_hz.is_finite() || self.frequency_hz <= 0.0 {
            return Err(invalid(format!(
                "frequency_hz {} must be positive",
                self.frequency_hz
            )));
        }
        if !self.tx_power_dbm.is_finite() || !self.antenna_gain_dbi.is_finite() {
            return Err(invalid("tx power and gain must be finite".to_string()));
        }
        if !(0.0..=1.0).contains(&self.load) {
            return Err(invalid(format!("load {} must be within [0, 1]", self.load)));
        }
        self.path_loss.validate().map_err(invalid)
    }
}
