//! Event A3 trigger rule
//!
//! Event A3: neighbour becomes offset better than serving (3GPP TS 38.331
//! 5.5.4.4). The rule runs one state machine per (session, neighbour) pair:
//!
//! ```text
//! IDLE --condition true--> CONDITION_HOLDING --held >= TTT--> TRIGGERED
//!   ^                            |
//!   +-------condition false------+
//! ```
//!
//! A false observation clears the timer immediately. With a zero
//! time-to-trigger the first true observation triggers.

use std::collections::BTreeMap;
use std::fmt;

use nextgho_common::{A3Config, A3Mode, AntennaId, TimestampMs};
use nextgho_radio::RadioMetrics;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// State of one (session, neighbour) machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum A3State {
    /// Condition not holding, timer not running
    Idle,
    /// Condition holding, waiting for time-to-trigger
    ConditionHolding,
    /// Condition held for at least time-to-trigger
    Triggered,
}

impl fmt::Display for A3State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            A3State::Idle => write!(f, "IDLE"),
            A3State::ConditionHolding => write!(f, "CONDITION_HOLDING"),
            A3State::Triggered => write!(f, "TRIGGERED"),
        }
    }
}

/// Per-session A3 timers, keyed by neighbour.
///
/// An entry exists only while the neighbour's condition has held on every
/// observation since the stored timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct A3TimerState {
    since: BTreeMap<AntennaId, TimestampMs>,
}

impl A3TimerState {
    /// Creates an empty timer set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Time at which the neighbour's condition started holding.
    pub fn running_since(&self, neighbor: &AntennaId) -> Option<TimestampMs> {
        self.since.get(neighbor).copied()
    }

    /// Number of running timers.
    pub fn running(&self) -> usize {
        self.since.len()
    }

    /// Resets every machine to `IDLE`.
    pub fn clear(&mut self) {
        self.since.clear();
    }
}

/// Result of one A3 evaluation for a session.
#[derive(Debug, Clone, PartialEq)]
pub struct A3Evaluation {
    /// Best triggered neighbour, if any
    pub triggered: Option<AntennaId>,
    /// State of every neighbour after this observation
    pub states: BTreeMap<AntennaId, A3State>,
}

/// Deterministic A3 trigger rule.
#[derive(Debug, Clone)]
pub struct A3TriggerRule {
    hysteresis_db: f64,
    time_to_trigger_ms: u64,
    mode: A3Mode,
}

impl A3TriggerRule {
    /// Creates the rule from configuration.
    pub fn new(config: &A3Config) -> Self {
        Self {
            hysteresis_db: config.hysteresis_db,
            time_to_trigger_ms: config.time_to_trigger_ms(),
            mode: config.mode,
        }
    }

    /// Returns true if `neighbor` is better than `serving` by more than the
    /// hysteresis in the configured quantity.
    pub fn condition_holds(&self, serving: &RadioMetrics, neighbor: &RadioMetrics) -> bool {
        let rsrp = neighbor.rsrp_dbm - serving.rsrp_dbm > self.hysteresis_db;
        let rsrq = neighbor.rsrq_db - serving.rsrq_db > self.hysteresis_db;
        match self.mode {
            A3Mode::RsrpBased => rsrp,
            A3Mode::RsrqBased => rsrq,
            A3Mode::Mixed => rsrp && rsrq,
        }
    }

    /// Feeds one observation of all neighbours into the per-neighbour machines
    /// and returns the best triggered neighbour.
    ///
    /// Neighbours absent from `metrics` count as a false observation.
    pub fn evaluate(
        &self,
        timers: &mut A3TimerState,
        serving: &AntennaId,
        metrics: &BTreeMap<AntennaId, RadioMetrics>,
        now: TimestampMs,
    ) -> A3Evaluation {
        let mut states = BTreeMap::new();

        let Some(serving_metrics) = metrics.get(serving) else {
            timers.clear();
            return A3Evaluation {
                triggered: None,
                states,
            };
        };

        timers
            .since
            .retain(|id, _| id != serving && metrics.contains_key(id));

        let mut best: Option<(&AntennaId, f64, f64)> = None;

        for (id, neighbor) in metrics.iter().filter(|(id, _)| *id != serving) {
            if !self.condition_holds(serving_metrics, neighbor) {
                timers.since.remove(id);
                states.insert(id.clone(), A3State::Idle);
                continue;
            }

            let since = *timers.since.entry(id.clone()).or_insert(now);
            let state = if now.saturating_sub(since) >= self.time_to_trigger_ms {
                A3State::Triggered
            } else {
                A3State::ConditionHolding
            };
            trace!("A3 {} -> {}: {} since {}ms", serving, id, state, since);
            states.insert(id.clone(), state);

            if state == A3State::Triggered {
                let rsrp_margin = neighbor.rsrp_dbm - serving_metrics.rsrp_dbm;
                let margin = match self.mode {
                    A3Mode::RsrqBased => neighbor.rsrq_db - serving_metrics.rsrq_db,
                    A3Mode::RsrpBased | A3Mode::Mixed => rsrp_margin,
                };
                let better = match best {
                    None => true,
                    Some((_, m, r)) => margin > m || (margin == m && rsrp_margin > r),
                };
                if better {
                    best = Some((id, margin, rsrp_margin));
                }
            }
        }

        A3Evaluation {
            triggered: best.map(|(id, _, _)| id.clone()),
            states,
        }
    }
}
