//! Handover decision records
//!
//! Every decision cycle ends with exactly one [`HandoverEvent`], appended to the
//! session history and never modified afterwards.

use std::fmt;

use nextgho_common::{AntennaId, SessionId, TimestampMs};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::guard::SuppressionReason;
use crate::qos::QosVerdict;

/// Path that produced the candidate target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionMode {
    /// External antenna-selection predictor
    Ml,
    /// Deterministic A3 trigger rule
    Rule,
}

impl fmt::Display for DecisionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionMode::Ml => write!(f, "ml"),
            DecisionMode::Rule => write!(f, "rule"),
        }
    }
}

/// Why a cycle abandoned the predictor's answer for the A3 rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// Timeout, transport failure or malformed response
    PredictorUnavailable,
    /// Confidence below the priority-derived threshold
    LowConfidence,
    /// Observed QoS outside the session's requirements
    QosViolation,
    /// The cycle deadline expired while waiting for the predictor
    DeadlineExceeded,
}

impl FallbackReason {
    /// All reasons, in counter order.
    pub const ALL: [FallbackReason; 4] = [
        FallbackReason::PredictorUnavailable,
        FallbackReason::LowConfidence,
        FallbackReason::QosViolation,
        FallbackReason::DeadlineExceeded,
    ];
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::PredictorUnavailable => write!(f, "predictor_unavailable"),
            FallbackReason::LowConfidence => write!(f, "low_confidence"),
            FallbackReason::QosViolation => write!(f, "qos_violation"),
            FallbackReason::DeadlineExceeded => write!(f, "deadline_exceeded"),
        }
    }
}

/// Terminal classification of a decision cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoverOutcome {
    /// Serving antenna changed
    Applied,
    /// Serving antenna kept, no fallback involved
    Skipped,
    /// Serving antenna kept after falling back to the rule path
    Fallback,
}

impl HandoverOutcome {
    /// All outcomes, in counter order.
    pub const ALL: [HandoverOutcome; 3] = [
        HandoverOutcome::Applied,
        HandoverOutcome::Skipped,
        HandoverOutcome::Fallback,
    ];

    /// Classifies a committed cycle.
    pub fn classify(changed: bool, fallback: Option<FallbackReason>) -> Self {
        match (changed, fallback) {
            (true, _) => HandoverOutcome::Applied,
            (false, Some(_)) => HandoverOutcome::Fallback,
            (false, None) => HandoverOutcome::Skipped,
        }
    }
}

impl fmt::Display for HandoverOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandoverOutcome::Applied => write!(f, "applied"),
            HandoverOutcome::Skipped => write!(f, "skipped"),
            HandoverOutcome::Fallback => write!(f, "fallback"),
        }
    }
}

/// How a cycle reached its final target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionMetadata {
    /// Mode active for the cycle
    pub mode: DecisionMode,
    /// Target proposed before suppression and gating
    pub candidate: Option<AntennaId>,
    /// Confidence attached to the final target
    pub confidence: f64,
    /// Oscillation guard suppression, if any
    pub suppression: Option<SuppressionReason>,
    /// Fallback to the rule path, if any (recorded regardless of outcome)
    pub fallback: Option<FallbackReason>,
    /// QoS gate verdict; `None` when the gate did not run
    pub qos: Option<QosVerdict>,
}

impl DecisionMetadata {
    /// Metadata for a deterministic rule-mode cycle.
    pub fn rule(candidate: AntennaId) -> Self {
        Self {
            mode: DecisionMode::Rule,
            candidate: Some(candidate),
            confidence: 1.0,
            suppression: None,
            fallback: None,
            qos: None,
        }
    }
}

/// Immutable record of one decision cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoverEvent {
    /// Session the decision applies to
    pub session_id: SessionId,
    /// Decision time (ms)
    pub timestamp_ms: TimestampMs,
    /// Serving antenna before the cycle
    pub from: AntennaId,
    /// Serving antenna after the cycle
    pub to: AntennaId,
    /// Outcome classification
    pub outcome: HandoverOutcome,
    /// Decision details
    pub metadata: DecisionMetadata,
}

impl HandoverEvent {
    /// Returns true if the serving antenna changed.
    pub fn is_handover(&self) -> bool {
        self.outcome == HandoverOutcome::Applied
    }
}

/// Emits one log record for a committed decision.
///
/// Handovers are logged at info level, everything else at debug.
pub fn log_handover_event(event: &HandoverEvent) {
    let suppression = event
        .metadata
        .suppression
        .map(|s| s.to_string())
        .unwrap_or_else(|| "none".to_string());
    let fallback = event
        .metadata
        .fallback
        .map(|f| f.to_string())
        .unwrap_or_else(|| "none".to_string());

    if event.is_handover() {
        info!(
            session = %event.session_id,
            from = %event.from,
            to = %event.to,
            mode = %event.metadata.mode,
            confidence = event.metadata.confidence,
            fallback = %fallback,
            "Handover applied at {}ms",
            event.timestamp_ms
        );
    } else {
        debug!(
            session = %event.session_id,
            serving = %event.from,
            outcome = %event.outcome,
            mode = %event.metadata.mode,
            confidence = event.metadata.confidence,
            suppression = %suppression,
            fallback = %fallback,
            "Handover not applied at {}ms",
            event.timestamp_ms
        );
    }
}
