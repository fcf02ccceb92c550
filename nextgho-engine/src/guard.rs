//! Ping-pong prevention
//!
//! Three layers are evaluated independently against a session's
//! [`OscillationState`]:
//!
//! 1. **Too recent**: a handover within `min_handover_interval_s` of the last
//!    one is suppressed outright, whatever the confidence.
//! 2. **Too many**: once `max_handovers_per_window` handovers happened inside
//!    `rate_window_s`, the candidate needs `rate_confidence_floor`.
//! 3. **Immediate return**: a candidate visited within `pingpong_window_s`
//!    needs `pingpong_confidence_floor`.
//!
//! When several floors apply the highest one wins. The guard only reads
//! state; the store updates it when a transition commits.

use std::collections::VecDeque;
use std::fmt;

use nextgho_common::{AntennaId, PingPongConfig, TimestampMs};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Layer that suppressed a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionReason {
    /// Minimum handover interval not elapsed
    TooRecent,
    /// Handover rate limit reached
    TooMany,
    /// Candidate was visited within the ping-pong window
    ImmediateReturn,
}

impl SuppressionReason {
    /// All reasons, in counter order.
    pub const ALL: [SuppressionReason; 3] = [
        SuppressionReason::TooRecent,
        SuppressionReason::TooMany,
        SuppressionReason::ImmediateReturn,
    ];
}

impl fmt::Display for SuppressionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuppressionReason::TooRecent => write!(f, "too_recent"),
            SuppressionReason::TooMany => write!(f, "too_many"),
            SuppressionReason::ImmediateReturn => write!(f, "immediate_return"),
        }
    }
}

/// A cell the session left, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellVisit {
    /// Antenna the session was served by
    pub antenna: AntennaId,
    /// Time the session left it (ms)
    pub left_at_ms: TimestampMs,
}

/// Anti-ping-pong memory of one session.
#[derive(Debug, Clone, PartialEq)]
pub struct OscillationState {
    capacity: usize,
    last_handover_ms: Option<TimestampMs>,
    recent_cells: VecDeque<CellVisit>,
    handover_times: VecDeque<TimestampMs>,
}

impl OscillationState {
    /// Creates an empty state whose ring buffer holds `capacity` visits.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            last_handover_ms: None,
            recent_cells: VecDeque::with_capacity(capacity),
            handover_times: VecDeque::new(),
        }
    }

    /// Time of the last committed handover.
    pub fn last_handover_ms(&self) -> Option<TimestampMs> {
        self.last_handover_ms
    }

    /// Recently left cells, oldest first.
    pub fn recent_cells(&self) -> impl Iterator<Item = &CellVisit> {
        self.recent_cells.iter()
    }

    /// Ring buffer capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Handovers committed in `(now - window_ms, now]`.
    pub fn handovers_within(&self, now: TimestampMs, window_ms: u64) -> usize {
        self.handover_times
            .iter()
            .filter(|t| now.saturating_sub(**t) < window_ms)
            .count()
    }

    /// True if `antenna` was left less than `window_ms` before `now`.
    pub fn visited_within(&self, antenna: &AntennaId, now: TimestampMs, window_ms: u64) -> bool {
        self.recent_cells
            .iter()
            .any(|v| &v.antenna == antenna && now.saturating_sub(v.left_at_ms) < window_ms)
    }

    /// Records a committed handover away from `from`.
    ///
    /// Entries older than `tracking_window_ms` are pruned; the ring buffer
    /// evicts its oldest visit when full.
    pub fn record_handover(&mut self, from: &AntennaId, now: TimestampMs, tracking_window_ms: u64) {
        self.last_handover_ms = Some(now);

        if self.recent_cells.len() == self.capacity {
            self.recent_cells.pop_front();
        }
        self.recent_cells.push_back(CellVisit {
            antenna: from.clone(),
            left_at_ms: now,
        });
        self.handover_times.push_back(now);

        while let Some(front) = self.recent_cells.front() {
            if now.saturating_sub(front.left_at_ms) >= tracking_window_ms {
                self.recent_cells.pop_front();
            } else {
                break;
            }
        }
        while let Some(front) = self.handover_times.front() {
            if now.saturating_sub(*front) >= tracking_window_ms {
                self.handover_times.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Verdict of the guard for one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardVerdict {
    /// Target after suppression (serving antenna when suppressed)
    pub final_target: AntennaId,
    /// Layer that suppressed the candidate, if any
    pub suppression_reason: Option<SuppressionReason>,
    /// Confidence carried forward
    pub effective_confidence: f64,
    /// Strictest floor that applied, if any
    pub required_floor: Option<f64>,
}

impl GuardVerdict {
    fn pass(candidate: &AntennaId, confidence: f64, required_floor: Option<f64>) -> Self {
        Self {
            final_target: candidate.clone(),
            suppression_reason: None,
            effective_confidence: confidence,
            required_floor,
        }
    }

    /// Returns true if the candidate was suppressed.
    pub fn is_suppressed(&self) -> bool {
        self.suppression_reason.is_some()
    }
}

/// Three-layer oscillation guard.
#[derive(Debug, Clone)]
pub struct OscillationGuard {
    enabled: bool,
    min_interval_ms: u64,
    max_per_window: usize,
    rate_window_ms: u64,
    pingpong_window_ms: u64,
    rate_floor: f64,
    pingpong_floor: f64,
}

impl OscillationGuard {
    /// Creates the guard from configuration.
    pub fn new(config: &PingPongConfig) -> Self {
        Self {
            enabled: config.enabled,
            min_interval_ms: config.min_handover_interval_ms(),
            max_per_window: config.max_handovers_per_window as usize,
            rate_window_ms: config.rate_window_ms(),
            pingpong_window_ms: config.pingpong_window_ms(),
            rate_floor: config.rate_confidence_floor,
            pingpong_floor: config.pingpong_confidence_floor,
        }
    }

    /// Returns true if suppression is active.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Evaluates a candidate against the session's history.
    ///
    /// A candidate equal to `serving` is not a handover and always passes.
    pub fn evaluate(
        &self,
        state: &OscillationState,
        serving: &AntennaId,
        candidate: &AntennaId,
        confidence: f64,
        now: TimestampMs,
    ) -> GuardVerdict {
        if !self.enabled || candidate == serving {
            return GuardVerdict::pass(candidate, confidence, None);
        }

        let suppress = |reason: SuppressionReason, floor: Option<f64>| {
            debug!(
                "Suppressing handover {} -> {} ({}, confidence {:.2})",
                serving, candidate, reason, confidence
            );
            GuardVerdict {
                final_target: serving.clone(),
                suppression_reason: Some(reason),
                effective_confidence: confidence,
                required_floor: floor,
            }
        };

        if let Some(last) = state.last_handover_ms() {
            if now.saturating_sub(last) < self.min_interval_ms {
                return suppress(SuppressionReason::TooRecent, None);
            }
        }

        let mut floor: Option<(f64, SuppressionReason)> = None;
        if state.handovers_within(now, self.rate_window_ms) >= self.max_per_window {
            floor = Some((self.rate_floor, SuppressionReason::TooMany));
        }
        if state.visited_within(candidate, now, self.pingpong_window_ms) {
            let stricter = floor.map_or(true, |(f, _)| self.pingpong_floor >= f);
            if stricter {
                floor = Some((self.pingpong_floor, SuppressionReason::ImmediateReturn));
            }
        }

        match floor {
            Some((required, reason)) if confidence < required => suppress(reason, Some(required)),
            Some((required, _)) => GuardVerdict::pass(candidate, confidence, Some(required)),
            None => GuardVerdict::pass(candidate, confidence, None),
        }
    }
}
