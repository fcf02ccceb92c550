//! Path-loss models.
//!
//! Two interchangeable large-scale models from the 3GPP/NYU mmWave channel
//! literature:
//!
//! - **ABG** (alpha-beta-gamma): `PL = 10·α·log10(d) + β + 10·γ·log10(f) + Xσ`
//! - **CI** (close-in free space reference distance):
//!   `PL = 32.4 + 10·n·log10(d) + 20·log10(f) + Xσ`
//!
//! `d` is in meters and `f` in GHz. `Xσ` is zero-mean log-normal shadow fading
//! with standard deviation `σ` dB, supplied by the caller so the model itself
//! stays deterministic.

use serde::{Deserialize, Serialize};

/// Distances below this are clamped before taking logarithms (meters).
pub const MIN_DISTANCE_M: f64 = 1.0;

/// Large-scale path-loss model with its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum PathLossModel {
    /// Alpha-beta-gamma model
    Abg {
        /// Distance dependence coefficient
        alpha: f64,
        /// Optimized offset (dB)
        beta: f64,
        /// Frequency dependence coefficient
        gamma: f64,
        /// Shadow fading standard deviation (dB)
        #[serde(default)]
        sigma_db: f64,
    },
    /// Close-in free space reference distance model
    CloseIn {
        /// Path-loss exponent
        n: f64,
        /// Shadow fading standard deviation (dB)
        #[serde(default)]
        sigma_db: f64,
    },
}

impl PathLossModel {
    /// ABG parameters for UMi street canyon NLOS.
    pub fn abg_umi_nlos() -> Self {
        PathLossModel::Abg {
            alpha: 3.53,
            beta: 22.4,
            gamma: 2.13,
            sigma_db: 7.82,
        }
    }

    /// CI parameters for UMi street canyon NLOS.
    pub fn close_in_umi_nlos() -> Self {
        PathLossModel::CloseIn {
            n: 3.19,
            sigma_db: 8.2,
        }
    }

    /// CI parameters for line-of-sight.
    pub fn close_in_los() -> Self {
        PathLossModel::CloseIn {
            n: 2.0,
            sigma_db: 4.0,
        }
    }

    /// Shadow fading standard deviation of this model (dB).
    pub fn sigma_db(&self) -> f64 {
        match *self {
            PathLossModel::Abg { sigma_db, .. } | PathLossModel::CloseIn { sigma_db, .. } => {
                sigma_db
            }
        }
    }

    /// Checks that every parameter is finite and physically meaningful.
    pub fn validate(&self) -> Result<(), String> {
        match *self {
            PathLossModel::Abg {
                alpha,
                beta,
                gamma,
                sigma_db,
            } => {
                if ![alpha, beta, gamma, sigma_db].iter().all(|v| v.is_finite()) {
                    return Err("ABG parameters must be finite".to_string());
                }
                if alpha <= 0.0 {
                    return Err(format!("ABG alpha {alpha} must be positive"));
                }
                if sigma_db < 0.0 {
                    return Err(format!("ABG sigma_db {sigma_db} must be non-negative"));
                }
            }
            PathLossModel::CloseIn { n, sigma_db } => {
                if !n.is_finite() || !sigma_db.is_finite() {
                    return Err("CI parameters must be finite".to_string());
                }
                if n <= 0.0 {
                    return Err(format!("CI exponent {n} must be positive"));
                }
                if sigma_db < 0.0 {
                    return Err(format!("CI sigma_db {sigma_db} must be non-negative"));
                }
            }
        }
        Ok(())
    }

    /// Path loss in dB at `distance_m` for carrier `frequency_hz`, plus the
    /// caller-supplied shadow fading term `shadow_db`.
    pub fn path_loss_db(&self, distance_m: f64, frequency_hz: f64, shadow_db: f64) -> f64 {
        let d = if distance_m.is_finite() {
            distance_m.max(MIN_DISTANCE_M)
        } else {
            MIN_DISTANCE_M
        };
        let f_ghz = frequency_hz / 1e9;

        let deterministic = match *self {
            PathLossModel::Abg {
                alpha, beta, gamma, ..
            } => 10.0 * alpha * d.log10() + beta + 10.0 * gamma * f_ghz.log10(),
            PathLossModel::CloseIn { n, .. } => {
                32.4 + 10.0 * n * d.log10() + 20.0 * f_ghz.log10()
            }
        };

        deterministic + shadow_db
    }
}

impl Default for PathLossModel {
    fn default() -> Self {
        Self::close_in_umi_nlos()
    }
}
