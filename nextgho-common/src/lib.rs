//! Common types and utilities for nextgho
//!
//! This crate provides shared identifiers, the handover configuration
//! structure, error types, logging setup and the simulation clock used
//! across all nextgho crates.

pub mod config;
pub mod error;
pub mod logging;
pub mod sim_tick;
pub mod types;

pub use config::{
    A3Config, A3Mode, ConfigValidationError, HandoverConfig, HandoverMode, PingPongConfig,
    PredictorConfig, QosGateConfig, RadioConfig,
};
pub use error::Error;
pub use logging::{init_logging, init_logging_with_filter, LogLevel};
pub use sim_tick::{SimulationClock, SimulationTimeConfig};
pub use types::*;
