//! Radio metric derivation for nextgho
//!
//! Turns a session position and the antenna catalog into per-antenna
//! RSRP/SINR/RSRQ values.
//!
//! # Modules
//!
//! - `antenna`: antenna records and the catalog type
//! - `pathloss`: ABG and Close-In path-loss models
//! - `metrics`: the [`RadioMetricsDeriver`]
//!
//! # Reference
//!
//! - 3GPP TS 38.215: Physical layer measurements (RSRP, RSRQ, SINR)
//! - 3GPP TR 38.901: Channel model for frequencies from 0.5 to 100 GHz

pub mod antenna;
pub mod error;
pub mod metrics;
pub mod pathloss;

pub use antenna::{AntennaCatalog, AntennaRecord};
pub use error::RadioError;
pub use metrics::{dbm_to_mw, mw_to_dbm, RadioMetrics, RadioMetricsDeriver};
pub use pathloss::{PathLossModel, MIN_DISTANCE_M};
