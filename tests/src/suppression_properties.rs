//! Suppression and history properties
//!
//! Replays random candidate sequences with the oscillation guard switched on
//! and off, and checks the invariants every committed history must satisfy.

use std::sync::Arc;

use integration_tests::{cell, engine_with_sessions, init_test_logging, ScriptedPredictor, TestSession};
use nextgho_common::{AntennaId, HandoverConfig, HandoverMode, SessionId};
use nextgho_engine::{HandoverEvent, HandoverOutcome};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const ANTENNAS: usize = 5;
const CYCLES: usize = 200;

/// Random `(timestamp, candidate, confidence)` cycles.
///
/// Confidences stay above the default QoS floor so the predictor decision is
/// never replaced by the A3 fallback.
fn random_cycles(seed: u64) -> Vec<(u64, AntennaId, f64)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut now = 0;
    (0..CYCLES)
        .map(|_| {
            now += rng.gen_range(200..6_000);
            let candidate = cell(rng.gen_range(0..ANTENNAS));
            let confidence = [0.80, 0.85, 0.92, 0.97, 1.0][rng.gen_range(0..5)];
            (now, candidate, confidence)
        })
        .collect()
}

async fn replay(cycles: &[(u64, AntennaId, f64)], guard_enabled: bool) -> Vec<HandoverEvent> {
    let mut config = HandoverConfig {
        mode: HandoverMode::Ml,
        ..HandoverConfig::default()
    };
    config.pingpong.enabled = guard_enabled;

    let predictor = Arc::new(ScriptedPredictor::new(
        cycles.iter().map(|(_, id, c)| (id.clone(), *c)),
    ));
    let engine = engine_with_sessions(config, ANTENNAS, &[TestSession::new("ue-1", 0, 0)])
        .with_predictor(predictor);

    let ue = SessionId::new("ue-1");
    for (now, _, _) in cycles {
        engine.decide(&ue, *now).await.unwrap();
    }
    engine.store().history(&ue).await.unwrap()
}

fn handover_count(history: &[HandoverEvent]) -> usize {
    history.iter().filter(|e| e.is_handover()).count()
}

#[tokio::test]
async fn test_guard_never_increases_handovers() {
    init_test_logging();

    for seed in 0..16 {
        let cycles = random_cycles(seed);
        let guarded = replay(&cycles, true).await;
        let unguarded = replay(&cycles, false).await;

        assert!(
            handover_count(&guarded) <= handover_count(&unguarded),
            "seed {seed}: {} guarded vs {} unguarded",
            handover_count(&guarded),
            handover_count(&unguarded)
        );
        assert!(guarded.iter().all(|e| e.metadata.fallback.is_none()));
        assert!(unguarded.iter().all(|e| e.metadata.suppression.is_none()));
    }
}

#[tokio::test]
async fn test_history_is_consistent() {
    init_test_logging();

    let cycles = random_cycles(42);
    let history = replay(&cycles, true).await;

    // Exactly one terminal event per cycle
    assert_eq!(history.len(), cycles.len());

    let mut serving = cell(0);
    let mut previous_ts = 0;
    for event in &history {
        assert!(event.timestamp_ms >= previous_ts);
        assert_eq!(event.from, serving, "serving only changes through a handover");
        assert_eq!(event.is_handover(), event.outcome == HandoverOutcome::Applied);
        if event.metadata.suppression.is_some() {
            assert_eq!(event.to, event.from);
        }
        serving = event.to.clone();
        previous_ts = event.timestamp_ms;
    }
}

#[tokio::test]
async fn test_applied_handovers_respect_min_interval() {
    init_test_logging();

    let config = HandoverConfig::default();
    let min_interval = config.pingpong.min_handover_interval_ms();

    for seed in 100..108 {
        let history = replay(&random_cycles(seed), true).await;
        let times: Vec<u64> = history
            .iter()
            .filter(|e| e.is_handover())
            .map(|e| e.timestamp_ms)
            .collect();
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= min_interval, "seed {seed}: {pair:?}");
        }
    }
}

#[tokio::test]
async fn test_rate_limit_holds_for_low_confidence() {
    init_test_logging();

    let config = HandoverConfig::default();
    let window = config.pingpong.rate_window_ms();
    let max = config.pingpong.max_handovers_per_window as usize;
    let floor = config.pingpong.rate_confidence_floor;

    for seed in 200..208 {
        let history = replay(&random_cycles(seed), true).await;
        let handovers: Vec<&HandoverEvent> = history.iter().filter(|e| e.is_handover()).collect();

        for (i, event) in handovers.iter().enumerate() {
            let in_window = handovers[..i]
                .iter()
                .filter(|e| event.timestamp_ms - e.timestamp_ms < window)
                .count();
            if in_window >= max {
                assert!(
                    event.metadata.confidence >= floor,
                    "seed {seed}: handover over the limit at {} with confidence {}",
                    event.timestamp_ms,
                    event.metadata.confidence
                );
            }
        }
    }
}
