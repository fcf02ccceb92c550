//! Scenario clock
//!
//! Drives scenario replays deterministically: every decision cycle is stamped
//! with the simulated time of its tick, not with the wall clock. Pacing
//! against real time is opt-in.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::types::TimestampMs;

/// Timing section of a scenario file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationTimeConfig {
    /// Simulated time between two decision rounds (ms)
    pub tick_duration_ms: u64,
    /// Number of decision rounds
    pub total_ticks: u64,
    /// Sleep between rounds so the replay runs at wall-clock speed
    pub real_time: bool,
}

impl Default for SimulationTimeConfig {
    fn default() -> Self {
        Self {
            tick_duration_ms: 100,
            total_ticks: 1000,
            real_time: false,
        }
    }
}

/// Clock handing out decision timestamps, one per round.
#[derive(Debug)]
pub struct SimulationClock {
    ticks: u64,
    config: SimulationTimeConfig,
    started: Instant,
}

impl SimulationClock {
    /// Starts a clock at t = 0.
    pub fn new(config: SimulationTimeConfig) -> Self {
        Self {
            ticks: 0,
            config,
            started: Instant::now(),
        }
    }

    pub fn config(&self) -> &SimulationTimeConfig {
        &self.config
    }

    /// Advances one round and returns its timestamp.
    pub fn tick(&mut self) -> TimestampMs {
        self.ticks += 1;
        self.current_time_ms()
    }

    /// True once every configured round has been handed out.
    pub fn is_complete(&self) -> bool {
        self.ticks >= self.config.total_ticks
    }

    pub fn current_time_ms(&self) -> TimestampMs {
        self.ticks.saturating_mul(self.config.tick_duration_ms)
    }

    /// How long to sleep before the next round in real-time mode.
    ///
    /// `None` when the replay is not paced or is already behind.
    pub fn time_until_next_tick(&self) -> Option<Duration> {
        if !self.config.real_time {
            return None;
        }
        let target_ms = self.current_time_ms() + self.config.tick_duration_ms;
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        (target_ms > elapsed_ms).then(|| Duration::from_millis(target_ms - elapsed_ms))
    }
}
