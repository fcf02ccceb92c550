//! Antenna-selection predictor interface
//!
//! The engine consults a predictor through [`AntennaPredictor`]: a feature
//! snapshot goes in, a candidate antenna and a confidence come out. Any
//! failure, including a response the engine cannot use, is recovered by
//! falling back to the A3 rule.
//!
//! [`SignalQualityPredictor`] is an in-process heuristic used when no external
//! predictor is wired in.

use async_trait::async_trait;
use nextgho_common::AntennaId;
use serde::{Deserialize, Serialize};

use crate::error::PredictorError;
use crate::state::FeatureSnapshot;

/// Predictor answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorResponse {
    /// Proposed serving antenna
    pub antenna_id: AntennaId,
    /// Confidence in [0, 1]
    pub confidence: f64,
}

impl PredictorResponse {
    /// Creates a response.
    pub fn new(antenna_id: impl Into<AntennaId>, confidence: f64) -> Self {
        Self {
            antenna_id: antenna_id.into(),
            confidence,
        }
    }

    /// Checks the response against the snapshot it answers.
    pub fn validate(&self, features: &FeatureSnapshot) -> Result<(), PredictorError> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(PredictorError::Malformed {
                reason: format!("confidence {} outside [0, 1]", self.confidence),
            });
        }
        if !features.metrics.contains_key(&self.antenna_id) {
            return Err(PredictorError::Malformed {
                reason: format!("unknown antenna {}", self.antenna_id),
            });
        }
        Ok(())
    }
}

/// External antenna-selection predictor.
#[async_trait]
pub trait AntennaPredictor: Send + Sync {
    /// Proposes a serving antenna for the session described by `features`.
    async fn predict(&self, features: &FeatureSnapshot) -> Result<PredictorResponse, PredictorError>;

    /// Name used in logs.
    fn name(&self) -> &str {
        "predictor"
    }
}

/// RSRP range mapped onto [0, 1] (dBm).
const RSRP_RANGE: (f64, f64) = (-140.0, -44.0);
/// SINR range mapped onto [0, 1] (dB).
const SINR_RANGE: (f64, f64) = (-10.0, 30.0);

fn normalize(value: f64, (lo, hi): (f64, f64)) -> f64 {
    ((value - lo) / (hi - lo)).clamp(0.0, 1.0)
}

/// Heuristic predictor scoring antennas by signal quality and load.
///
/// `score = 0.6·RSRP_norm + 0.4·SINR_norm - load_penalty·load`, plus a small
/// bonus for the serving antenna. Confidence grows with the margin of the
/// winner over the runner-up.
#[derive(Debug, Clone)]
pub struct SignalQualityPredictor {
    load_penalty: f64,
    serving_bonus: f64,
    margin_gain: f64,
}

impl Default for SignalQualityPredictor {
    fn default() -> Self {
        Self {
            load_penalty: 0.2,
            serving_bonus: 0.02,
            margin_gain: 4.0,
        }
    }
}

impl SignalQualityPredictor {
    /// Creates a predictor with default weights.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the load penalty weight.
    pub fn with_load_penalty(mut self, load_penalty: f64) -> Self {
        self.load_penalty = load_penalty;
        self
    }

    /// Score of every antenna in the snapshot, best first.
    pub fn rank(&self, features: &FeatureSnapshot) -> Vec<(AntennaId, f64)> {
        let mut scores: Vec<(AntennaId, f64)> = features
            .metrics
            .iter()
            .map(|(id, m)| {
                let load = features.antenna_loads.get(id).copied().unwrap_or(0.0);
                let bonus = if *id == features.serving {
                    self.serving_bonus
                } else {
                    0.0
                };
                let score = 0.6 * normalize(m.rsrp_dbm, RSRP_RANGE)
                    + 0.4 * normalize(m.sinr_db, SINR_RANGE)
                    - self.load_penalty * load
                    + bonus;
                (id.clone(), score)
            })
            .collect();
        scores.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scores
    }
}

#[async_trait]
impl AntennaPredictor for SignalQualityPredictor {
    async fn predict(&self, features: &FeatureSnapshot) -> Result<PredictorResponse, PredictorError> {
        let ranked = self.rank(features);
        let Some((best, best_score)) = ranked.first() else {
            return Err(PredictorError::Malformed {
                reason: "no antennas to rank".to_string(),
            });
        };
        let confidence = match ranked.get(1) {
            Some((_, runner_up)) => {
                (0.5 + self.margin_gain * (best_score - runner_up)).clamp(0.5, 1.0)
            }
            None => 1.0,
        };
        Ok(PredictorResponse::new(best.clone(), confidence))
    }

    fn name(&self) -> &str {
        "signal-quality"
    }
}
