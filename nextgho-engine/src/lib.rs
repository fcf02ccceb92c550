//! Handover decision engine for nextgho
//!
//! Decides, for every mobile session, which cell serves it next and commits
//! that decision safely.
//!
//! # Components
//!
//! - [`SessionStateStore`]: antennas, per-session state and append-only history
//! - [`A3TriggerRule`]: Event A3 hysteresis + time-to-trigger state machine
//! - [`OscillationGuard`]: three-layer ping-pong suppression
//! - [`QosGate`]: priority-derived confidence floor and QoS bounds
//! - [`HandoverEngine`]: orchestration, predictor fallback and commit
//! - [`DecisionTask`]: actor front-end with one worker per session
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use nextgho_common::{AntennaId, GeoPosition, HandoverConfig, Mobility, QosContext, SessionId};
//! use nextgho_engine::{HandoverEngine, SessionStateStore};
//! use nextgho_radio::AntennaRecord;
//!
//! # async fn demo() -> Result<(), nextgho_engine::EngineError> {
//! let config = HandoverConfig::default();
//! let antennas = vec![
//!     AntennaRecord::new("cell-a", GeoPosition::new(48.00, 11.00, 25.0), 43.0, 3.5e9),
//!     AntennaRecord::new("cell-b", GeoPosition::new(48.00, 11.01, 25.0), 43.0, 3.5e9),
//! ];
//! let store = Arc::new(SessionStateStore::new(&config, antennas)?);
//! store.register_session(
//!     SessionId::new("ue-1"),
//!     GeoPosition::new(48.0, 11.009, 1.5),
//!     Mobility::new(12.0, 90.0),
//!     AntennaId::new("cell-a"),
//!     QosContext::default(),
//!     0,
//! )?;
//!
//! let engine = HandoverEngine::new(config, store)?;
//! let event = engine.decide(&SessionId::new("ue-1"), 100).await?;
//! println!("{} -> {} ({})", event.from, event.to, event.outcome);
//! # Ok(())
//! # }
//! ```

pub mod a3;
pub mod engine;
pub mod error;
pub mod event;
pub mod guard;
pub mod metrics;
pub mod predictor;
pub mod qos;
pub mod state;
pub mod task;

pub use a3::{A3Evaluation, A3State, A3TimerState, A3TriggerRule};
pub use engine::HandoverEngine;
pub use error::{EngineError, PredictorError};
pub use event::{
    log_handover_event, DecisionMetadata, DecisionMode, FallbackReason, HandoverEvent,
    HandoverOutcome,
};
pub use guard::{CellVisit, GuardVerdict, OscillationGuard, OscillationState, SuppressionReason};
pub use metrics::{HandoverMetrics, IntervalHistogram, MetricsSnapshot};
pub use predictor::{AntennaPredictor, PredictorResponse, SignalQualityPredictor};
pub use qos::{qos_violations, required_confidence, QosGate, QosMetric, QosVerdict, QosViolation};
pub use state::{FeatureSnapshot, SessionGuard, SessionState, SessionStateStore};
pub use task::{DecisionTask, EngineMessage, Task, TaskHandle, TaskMessage};
