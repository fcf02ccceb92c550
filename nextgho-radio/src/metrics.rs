//! RSRP / SINR / RSRQ derivation
//!
//! For a session position and an antenna catalog:
//!
//! - `RSRP = P_tx - PL + G_ant` (dBm)
//! - `SINR = S / (N + Σ I)` where every other antenna's received power counts
//!   as interference
//! - `RSRQ = N_RB · RSRP_lin / RSSI_lin` with `RSSI = S + Σ I + N`
//!
//! Derivation is pure apart from drawing shadow fading samples when shadowing
//! is enabled.

use std::collections::BTreeMap;
use std::sync::Mutex;

use nextgho_common::{AntennaId, GeoPosition, RadioConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::antenna::{AntennaCatalog, AntennaRecord};
use crate::error::RadioError;

/// Radio quality of one antenna as seen from one position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadioMetrics {
    /// Reference signal received power (dBm)
    pub rsrp_dbm: f64,
    /// Signal to interference plus noise ratio (dB)
    pub sinr_db: f64,
    /// Reference signal received quality (dB)
    pub rsrq_db: f64,
}

/// Converts dBm to milliwatts.
pub fn dbm_to_mw(dbm: f64) -> f64 {
    10f64.powf(dbm / 10.0)
}

/// Converts milliwatts to dBm.
pub fn mw_to_dbm(mw: f64) -> f64 {
    10.0 * mw.log10()
}

/// Derives per-antenna radio metrics from geometry.
#[derive(Debug)]
pub struct RadioMetricsDeriver {
    resource_blocks: u32,
    noise_floor_dbm: f64,
    /// Shadow fading generator; `None` when shadowing is disabled
    shadowing: Option<Mutex<StdRng>>,
}

impl RadioMetricsDeriver {
    /// Creates a deriver from the radio configuration.
    pub fn new(config: &RadioConfig) -> Self {
        let shadowing = config.shadowing_enabled.then(|| {
            let rng = match config.shadowing_seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            Mutex::new(rng)
        });

        Self {
            resource_blocks: config.resource_blocks,
            noise_floor_dbm: config.noise_floor_dbm,
            shadowing,
        }
    }

    /// Returns true if shadow fading samples are drawn.
    pub fn shadowing_enabled(&self) -> bool {
        self.shadowing.is_some()
    }

    /// Received reference signal power from `antenna` at `position` (dBm).
    pub fn rsrp_dbm(&self, position: &GeoPosition, antenna: &AntennaRecord) -> f64 {
        let distance = position.distance_to(&antenna.position);
        let shadow = self.shadow_sample(antenna.path_loss.sigma_db());
        let path_loss = antenna
            .path_loss
            .path_loss_db(distance, antenna.frequency_hz, shadow);
        antenna.tx_power_dbm - path_loss + antenna.antenna_gain_dbi
    }

    /// Derives metrics for every antenna in the catalog.
    ///
    /// An empty catalog yields an empty map.
    pub fn derive_all(
        &self,
        position: &GeoPosition,
        catalog: &AntennaCatalog,
    ) -> BTreeMap<AntennaId, RadioMetrics> {
        let rsrp: BTreeMap<&AntennaId, f64> = catalog
            .iter()
            .map(|(id, antenna)| (id, self.rsrp_dbm(position, antenna)))
            .collect();

        let total_mw: f64 = rsrp.values().map(|dbm| dbm_to_mw(*dbm)).sum();
        let noise_mw = dbm_to_mw(self.noise_floor_dbm);
        let rb = f64::from(self.resource_blocks);

        rsrp.into_iter()
            .map(|(id, rsrp_dbm)| {
                let signal_mw = dbm_to_mw(rsrp_dbm);
                let interference_mw = (total_mw - signal_mw).max(0.0);
                let sinr = signal_mw / (noise_mw + interference_mw);
                let rssi_mw = signal_mw + interference_mw + noise_mw;
                let rsrq = rb * signal_mw / rssi_mw;

                let metrics = RadioMetrics {
                    rsrp_dbm,
                    sinr_db: 10.0 * sinr.log10(),
                    rsrq_db: 10.0 * rsrq.log10(),
                };
                trace!(
                    "{} at {}: rsrp={:.1} sinr={:.1} rsrq={:.1}",
                    id,
                    position,
                    metrics.rsrp_dbm,
                    metrics.sinr_db,
                    metrics.rsrq_db
                );
                (id.clone(), metrics)
            })
            .collect()
    }

    /// Derives metrics for a single antenna, with interference from the rest of
    /// the catalog.
    pub fn derive_for(
        &self,
        position: &GeoPosition,
        catalog: &AntennaCatalog,
        antenna_id: &AntennaId,
    ) -> Result<RadioMetrics, RadioError> {
        if !catalog.contains_key(antenna_id) {
            return Err(RadioError::UnknownAntenna(antenna_id.clone()));
        }
        self.derive_all(position, catalog)
            .remove(antenna_id)
            .ok_or_else(|| RadioError::UnknownAntenna(antenna_id.clone()))
    }

    fn shadow_sample(&self, sigma_db: f64) -> f64 {
        let Some(rng) = &self.shadowing else {
            return 0.0;
        };
        let Ok(normal) = Normal::new(0.0, sigma_db) else {
            return 0.0;
        };
        let mut rng = rng.lock().unwrap_or_else(|e| e.into_inner());
        normal.sample(&mut *rng)
    }
}
