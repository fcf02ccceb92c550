//! Decision counters and handover interval histograms
//!
//! Shapes exposed to an external collector:
//!
//! - `decisions_total{outcome}`
//! - `suppressions_total{reason}`
//! - `fallbacks_total{reason}`
//! - `predictor_calls_total`, `predictor_failures_total`
//! - `handover_interval_seconds` histogram, per session and aggregated

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use nextgho_common::{SessionId, TimestampMs};
use serde::{Deserialize, Serialize};

use crate::event::{FallbackReason, HandoverEvent, HandoverOutcome};
use crate::guard::SuppressionReason;

/// Upper bounds of the inter-handover interval buckets (seconds).
pub const INTERVAL_BUCKETS_S: [f64; 8] = [1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0];

/// Cumulative histogram of inter-handover intervals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntervalHistogram {
    /// Count per bucket of [`INTERVAL_BUCKETS_S`], plus one overflow bucket
    pub buckets: Vec<u64>,
    /// Number of observations
    pub count: u64,
    /// Sum of observations (seconds)
    pub sum_s: f64,
}

impl IntervalHistogram {
    fn new() -> Self {
        Self {
            buckets: vec![0; INTERVAL_BUCKETS_S.len() + 1],
            count: 0,
            sum_s: 0.0,
        }
    }

    /// Records one interval.
    pub fn observe(&mut self, interval_s: f64) {
        let idx = INTERVAL_BUCKETS_S
            .iter()
            .position(|bound| interval_s <= *bound)
            .unwrap_or(INTERVAL_BUCKETS_S.len());
        if let Some(bucket) = self.buckets.get_mut(idx) {
            *bucket += 1;
        }
        self.count += 1;
        self.sum_s += interval_s;
    }

    /// Mean interval in seconds.
    pub fn mean_s(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum_s / self.count as f64)
    }
}

/// Serializable copy of all counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Decisions by outcome
    pub decisions: BTreeMap<HandoverOutcome, u64>,
    /// Suppressions by reason
    pub suppressions: BTreeMap<SuppressionReason, u64>,
    /// Fallbacks by reason
    pub fallbacks: BTreeMap<FallbackReason, u64>,
    /// Predictor invocations (attempts)
    pub predictor_calls: u64,
    /// Failed predictor attempts
    pub predictor_failures: u64,
    /// Interval histogram over all sessions
    pub handover_interval: IntervalHistogram,
    /// Interval histogram per session
    pub handover_interval_by_session: BTreeMap<SessionId, IntervalHistogram>,
}

impl MetricsSnapshot {
    /// Total decisions.
    pub fn total_decisions(&self) -> u64 {
        self.decisions.values().sum()
    }

    /// Decisions with the given outcome.
    pub fn decisions_with(&self, outcome: HandoverOutcome) -> u64 {
        self.decisions.get(&outcome).copied().unwrap_or(0)
    }
}

/// Engine-wide counters. Shared by every decision cycle.
#[derive(Debug)]
pub struct HandoverMetrics {
    decisions: [AtomicU64; 3],
    suppressions: [AtomicU64; 3],
    fallbacks: [AtomicU64; 4],
    predictor_calls: AtomicU64,
    predictor_failures: AtomicU64,
    intervals: Mutex<BTreeMap<SessionId, IntervalHistogram>>,
}

impl Default for HandoverMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl HandoverMetrics {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self {
            decisions: Default::default(),
            suppressions: Default::default(),
            fallbacks: Default::default(),
            predictor_calls: AtomicU64::new(0),
            predictor_failures: AtomicU64::new(0),
            intervals: Mutex::new(BTreeMap::new()),
        }
    }

    /// Records a committed event. `previous_handover_ms` is the session's last
    /// handover before this event.
    pub fn record_event(&self, event: &HandoverEvent, previous_handover_ms: Option<TimestampMs>) {
        let outcome_idx = HandoverOutcome::ALL
            .iter()
            .position(|o| *o == event.outcome)
            .unwrap_or(0);
        self.decisions[outcome_idx].fetch_add(1, Ordering::Relaxed);

        if let Some(reason) = event.metadata.suppression {
            if let Some(idx) = SuppressionReason::ALL.iter().position(|r| *r == reason) {
                self.suppressions[idx].fetch_add(1, Ordering::Relaxed);
            }
        }
        if let Some(reason) = event.metadata.fallback {
            if let Some(idx) = FallbackReason::ALL.iter().position(|r| *r == reason) {
                self.fallbacks[idx].fetch_add(1, Ordering::Relaxed);
            }
        }

        if event.is_handover() {
            if let Some(previous) = previous_handover_ms {
                let interval_s = event.timestamp_ms.saturating_sub(previous) as f64 / 1000.0;
                self.intervals
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .entry(event.session_id.clone())
                    .or_insert_with(IntervalHistogram::new)
                    .observe(interval_s);
            }
        }
    }

    /// Records one predictor attempt.
    pub fn record_predictor_call(&self, failed: bool) {
        self.predictor_calls.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.predictor_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Returns a consistent-enough copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let by_session = self
            .intervals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut aggregate = IntervalHistogram::new();
        for histogram in by_session.values() {
            for (total, n) in aggregate.buckets.iter_mut().zip(&histogram.buckets) {
                *total += n;
            }
            aggregate.count += histogram.count;
            aggregate.sum_s += histogram.sum_s;
        }

        MetricsSnapshot {
            decisions: HandoverOutcome::ALL
                .iter()
                .zip(&self.decisions)
                .map(|(o, c)| (*o, c.load(Ordering::Relaxed)))
                .collect(),
            suppressions: SuppressionReason::ALL
                .iter()
                .zip(&self.suppressions)
                .map(|(r, c)| (*r, c.load(Ordering::Relaxed)))
                .collect(),
            fallbacks: FallbackReason::ALL
                .iter()
                .zip(&self.fallbacks)
                .map(|(r, c)| (*r, c.load(Ordering::Relaxed)))
                .collect(),
            predictor_calls: self.predictor_calls.load(Ordering::Relaxed),
            predictor_failures: self.predictor_failures.load(Ordering::Relaxed),
            handover_interval: aggregate,
            handover_interval_by_session: by_session,
        }
    }
}
