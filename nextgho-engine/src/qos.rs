//! QoS-aware confidence gating
//!
//! A predictor decision is accepted only if its confidence reaches the floor
//! derived from the session's service priority and the session's observed QoS
//! stays within its requirements. Either failure sends the cycle back to the
//! A3 rule.
//!
//! Priority to confidence floor:
//!
//! | Priority | Required confidence |
//! |----------|---------------------|
//! | 9-10     | 0.95                |
//! | 6-8      | 0.75 - 0.88         |
//! | 5        | 0.75                |
//! | 2-4      | 0.55 - 0.75         |
//! | 1        | 0.50                |

use std::fmt;

use nextgho_common::{QosContext, QosGateConfig, QosObservation, QosRequirements};
use serde::{Deserialize, Serialize};

use crate::event::FallbackReason;

/// Confidence floor for a service priority (1 = lowest, 10 = highest).
///
/// Non-decreasing in `priority`.
pub fn required_confidence(priority: u8) -> f64 {
    match priority {
        0..=1 => 0.50,
        2..=4 => 0.55 + f64::from(priority - 2) * 0.10,
        5 => 0.75,
        6..=8 => 0.75 + f64::from(priority - 6) * (0.20 / 3.0),
        _ => 0.95,
    }
}

/// QoS dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QosMetric {
    /// Latency (ms), upper bound
    Latency,
    /// Throughput (Mbps), lower bound
    Throughput,
    /// Jitter (ms), upper bound
    Jitter,
    /// Reliability (percent), lower bound
    Reliability,
}

impl fmt::Display for QosMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QosMetric::Latency => write!(f, "latency"),
            QosMetric::Throughput => write!(f, "throughput"),
            QosMetric::Jitter => write!(f, "jitter"),
            QosMetric::Reliability => write!(f, "reliability"),
        }
    }
}

/// One QoS bound that the observed value breaks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QosViolation {
    /// Violated dimension
    pub metric: QosMetric,
    /// Observed value
    pub observed: f64,
    /// Required bound
    pub required: f64,
}

/// Result of running the gate on one predictor decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QosVerdict {
    /// Floor derived from the session priority
    pub required_confidence: f64,
    /// Confidence that was checked
    pub confidence: f64,
    /// Broken QoS bounds
    pub violations: Vec<QosViolation>,
}

impl QosVerdict {
    /// Returns true if the confidence reaches the required floor.
    pub fn confidence_ok(&self) -> bool {
        self.confidence >= self.required_confidence
    }

    /// Returns true if the decision may stand.
    pub fn passed(&self) -> bool {
        self.confidence_ok() && self.violations.is_empty()
    }

    /// Fallback reason when the decision may not stand. Low confidence takes
    /// precedence over QoS violations.
    pub fn fallback_reason(&self) -> Option<FallbackReason> {
        if !self.confidence_ok() {
            Some(FallbackReason::LowConfidence)
        } else if !self.violations.is_empty() {
            Some(FallbackReason::QosViolation)
        } else {
            None
        }
    }
}

/// Compares observed QoS with the requirements.
///
/// `tolerance` relaxes every bound by that fraction (0.1 = 10%).
pub fn qos_violations(
    requirements: &QosRequirements,
    observed: &QosObservation,
    tolerance: f64,
) -> Vec<QosViolation> {
    let upper = |metric, observed: f64, required: f64| {
        (observed > required * (1.0 + tolerance)).then_some(QosViolation {
            metric,
            observed,
            required,
        })
    };
    let lower = |metric, observed: f64, required: f64| {
        (observed < required * (1.0 - tolerance)).then_some(QosViolation {
            metric,
            observed,
            required,
        })
    };

    [
        upper(QosMetric::Latency, observed.latency_ms, requirements.latency_ms),
        lower(
            QosMetric::Throughput,
            observed.throughput_mbps,
            requirements.throughput_mbps,
        ),
        upper(QosMetric::Jitter, observed.jitter_ms, requirements.jitter_ms),
        lower(
            QosMetric::Reliability,
            observed.reliability_pct,
            requirements.reliability_pct,
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Confidence and QoS gate for predictor decisions.
#[derive(Debug, Clone)]
pub struct QosGate {
    enabled: bool,
    tolerance: f64,
}

impl QosGate {
    /// Creates the gate from configuration.
    pub fn new(config: &QosGateConfig) -> Self {
        Self {
            enabled: config.enabled,
            tolerance: config.violation_tolerance,
        }
    }

    /// Returns true if the gate runs at all.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Evaluates a decision with `confidence` for a session.
    ///
    /// Without an observation only the confidence floor is checked.
    pub fn evaluate(
        &self,
        qos: &QosContext,
        observed: Option<&QosObservation>,
        confidence: f64,
    ) -> QosVerdict {
        let violations = observed
            .map(|o| qos_violations(&qos.requirements, o, self.tolerance))
            .unwrap_or_default();

        QosVerdict {
            required_confidence: required_confidence(qos.priority),
            confidence,
            violations,
        }
    }
}
