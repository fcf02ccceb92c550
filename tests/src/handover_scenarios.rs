//! End-to-end handover scenarios
//!
//! Drives the engine through the ping-pong, rate-limit, time-to-trigger and
//! mode-selection scenarios with scripted predictors.

use std::sync::Arc;
use std::time::Duration;

use integration_tests::{
    cell, engine_with_sessions, init_test_logging, position_near, FailingPredictor,
    ScriptedPredictor, SlowPredictor, TestSession,
};
use nextgho_common::{HandoverConfig, HandoverMode, Mobility, SessionId};
use nextgho_engine::{
    DecisionMode, FallbackReason, HandoverEngine, HandoverOutcome, PredictorResponse,
    SuppressionReason,
};

fn ml_config() -> HandoverConfig {
    HandoverConfig {
        mode: HandoverMode::Ml,
        ..HandoverConfig::default()
    }
}

fn ue() -> SessionId {
    SessionId::new("ue-1")
}

/// ML engine over `antennas` cells with ue-1 on cell-0, next to cell-1.
fn ml_engine(antennas: usize, predictor: Arc<ScriptedPredictor>) -> HandoverEngine {
    engine_with_sessions(ml_config(), antennas, &[TestSession::new("ue-1", 0, 1)])
        .with_predictor(predictor)
}

/// Session hands over A -> B, then the predictor proposes A again with a
/// confidence below the immediate-return floor.
#[tokio::test]
async fn test_immediate_return_scenario() {
    init_test_logging();

    let predictor = Arc::new(ScriptedPredictor::new([(cell(1), 0.99)]));
    let engine = ml_engine(3, predictor.clone());

    let first = engine.decide(&ue(), 1_000).await.unwrap();
    assert_eq!(first.outcome, HandoverOutcome::Applied);
    assert_eq!((first.from.clone(), first.to.clone()), (cell(0), cell(1)));

    predictor.push(cell(0), 0.80);
    let back = engine.decide(&ue(), 4_000).await.unwrap();
    assert_eq!(back.outcome, HandoverOutcome::Skipped);
    assert_eq!(back.metadata.suppression, Some(SuppressionReason::ImmediateReturn));
    assert_eq!(back.metadata.candidate, Some(cell(0)));
    assert_eq!(back.to, cell(1));
    assert_eq!(engine.store().serving_antenna(&ue()).await.unwrap(), cell(1));

    // A confident enough return passes the floor
    predictor.push(cell(0), 0.97);
    let confident = engine.decide(&ue(), 6_000).await.unwrap();
    assert_eq!(confident.outcome, HandoverOutcome::Applied);
    assert_eq!(confident.to, cell(0));

    // Outside the ping-pong window the floor no longer applies
    predictor.push(cell(1), 0.80);
    let later = engine.decide(&ue(), 20_000).await.unwrap();
    assert_eq!(later.outcome, HandoverOutcome::Applied);
    assert_eq!(later.to, cell(1));

    let snapshot = engine.metrics().snapshot();
    assert_eq!(snapshot.decisions_with(HandoverOutcome::Applied), 3);
    assert_eq!(snapshot.suppressions[&SuppressionReason::ImmediateReturn], 1);
    assert_eq!(snapshot.handover_interval.count, 2);
    assert_eq!(predictor.calls(), 4);
}

/// Three handovers inside the rate window, then a fourth candidate below the
/// rate floor.
#[tokio::test]
async fn test_rate_limit_scenario() {
    init_test_logging();

    let predictor = Arc::new(ScriptedPredictor::new([
        (cell(1), 0.99),
        (cell(2), 0.99),
        (cell(3), 0.99),
        (cell(4), 0.85),
    ]));
    let engine = ml_engine(5, predictor.clone());

    for (t, target) in [(3_000, 1), (6_000, 2), (9_000, 3)] {
        let event = engine.decide(&ue(), t).await.unwrap();
        assert_eq!(event.outcome, HandoverOutcome::Applied, "t={t}");
        assert_eq!(event.to, cell(target));
    }

    let fourth = engine.decide(&ue(), 12_000).await.unwrap();
    assert_eq!(fourth.metadata.suppression, Some(SuppressionReason::TooMany));
    assert_eq!(fourth.outcome, HandoverOutcome::Skipped);
    assert_eq!(fourth.to, cell(3));

    // Confidence above the floor goes through even at the limit
    predictor.push(cell(4), 0.92);
    let confident = engine.decide(&ue(), 13_000).await.unwrap();
    assert_eq!(confident.outcome, HandoverOutcome::Applied);
    assert_eq!(confident.to, cell(4));
}

#[tokio::test]
async fn test_rate_limit_expires_with_window() {
    init_test_logging();

    let predictor = Arc::new(ScriptedPredictor::new([
        (cell(1), 0.99),
        (cell(2), 0.99),
        (cell(3), 0.99),
        (cell(4), 0.85),
    ]));
    let engine = ml_engine(5, predictor);

    for t in [3_000, 6_000, 9_000] {
        engine.decide(&ue(), t).await.unwrap();
    }
    let blocked = engine.decide(&ue(), 12_000).await.unwrap();
    assert!(blocked.metadata.suppression.is_some());

    // 60s after the first three handovers the window is empty again
    let released = engine.decide(&ue(), 70_000).await.unwrap();
    assert_eq!(released.metadata.suppression, None);
    assert_eq!(released.to, cell(4));
}

#[tokio::test]
async fn test_too_recent_blocks_any_confidence() {
    init_test_logging();

    let predictor = Arc::new(ScriptedPredictor::new([(cell(1), 0.99), (cell(2), 1.0)]));
    let engine = ml_engine(3, predictor);

    engine.decide(&ue(), 1_000).await.unwrap();
    let early = engine.decide(&ue(), 2_500).await.unwrap();
    assert_eq!(early.metadata.suppression, Some(SuppressionReason::TooRecent));
    assert_eq!(early.to, cell(1));

    let on_time = engine.decide(&ue(), 3_000).await.unwrap();
    assert_eq!(on_time.outcome, HandoverOutcome::Applied);
    assert_eq!(on_time.to, cell(2));
}

#[tokio::test]
async fn test_time_to_trigger_delays_rule_handover() {
    init_test_logging();

    let mut config = HandoverConfig {
        mode: HandoverMode::Rule,
        ..HandoverConfig::default()
    };
    config.a3.time_to_trigger_s = 0.5;
    let engine = engine_with_sessions(config, 2, &[TestSession::new("ue-1", 0, 1)]);

    for t in [0, 300] {
        let event = engine.decide(&ue(), t).await.unwrap();
        assert_eq!(event.outcome, HandoverOutcome::Skipped, "t={t}");
        assert_eq!(event.to, cell(0));
    }
    let event = engine.decide(&ue(), 500).await.unwrap();
    assert_eq!(event.outcome, HandoverOutcome::Applied);
    assert_eq!(event.to, cell(1));
    assert_eq!(event.metadata.mode, DecisionMode::Rule);
}

#[tokio::test]
async fn test_interrupted_condition_restarts_time_to_trigger() {
    init_test_logging();

    let mut config = HandoverConfig {
        mode: HandoverMode::Rule,
        ..HandoverConfig::default()
    };
    config.a3.time_to_trigger_s = 0.5;
    let engine = engine_with_sessions(config, 2, &[TestSession::new("ue-1", 0, 1)]);
    let store = engine.store();
    let mobility = Mobility::new(10.0, 90.0);

    engine.decide(&ue(), 0).await.unwrap();

    // Back next to the serving cell: the condition breaks
    store
        .update_position(&ue(), position_near(0), mobility, 200)
        .await
        .unwrap();
    engine.decide(&ue(), 200).await.unwrap();

    store
        .update_position(&ue(), position_near(1), mobility, 300)
        .await
        .unwrap();
    for t in [300, 700] {
        let event = engine.decide(&ue(), t).await.unwrap();
        assert_eq!(event.outcome, HandoverOutcome::Skipped, "t={t}");
    }
    let event = engine.decide(&ue(), 800).await.unwrap();
    assert_eq!(event.outcome, HandoverOutcome::Applied);
    assert_eq!(event.to, cell(1));
}

#[tokio::test]
async fn test_auto_mode_selects_by_catalog_size() {
    init_test_logging();

    let small = engine_with_sessions(HandoverConfig::default(), 2, &[TestSession::new("ue-1", 0, 1)]);
    assert_eq!(small.active_mode(), DecisionMode::Rule);
    let event = small.decide(&ue(), 1_000).await.unwrap();
    assert_eq!(event.metadata.mode, DecisionMode::Rule);
    assert_eq!(event.to, cell(1));

    let predictor = Arc::new(FailingPredictor::default());
    let large = engine_with_sessions(HandoverConfig::default(), 3, &[TestSession::new("ue-1", 0, 1)])
        .with_predictor(predictor.clone());
    assert_eq!(large.active_mode(), DecisionMode::Ml);
    let event = large.decide(&ue(), 1_000).await.unwrap();
    assert_eq!(event.metadata.mode, DecisionMode::Ml);
    assert_eq!(event.metadata.fallback, Some(FallbackReason::PredictorUnavailable));
    assert_eq!(event.outcome, HandoverOutcome::Applied);
    assert_eq!(event.to, cell(1));
    assert_eq!(predictor.calls(), 1);
}

#[tokio::test]
async fn test_failed_predictor_without_a3_trigger_is_fallback() {
    init_test_logging();

    let predictor = Arc::new(FailingPredictor::default());
    // Already next to its serving cell: A3 does not fire
    let engine = engine_with_sessions(ml_config(), 3, &[TestSession::new("ue-1", 1, 1)])
        .with_predictor(predictor);

    let event = engine.decide(&ue(), 1_000).await.unwrap();
    assert_eq!(event.outcome, HandoverOutcome::Fallback);
    assert_eq!(event.to, cell(1));
    assert_eq!(
        engine.metrics().snapshot().fallbacks[&FallbackReason::PredictorUnavailable],
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_slow_predictor_times_out_to_rule() {
    init_test_logging();

    let engine = engine_with_sessions(ml_config(), 3, &[TestSession::new("ue-1", 0, 1)])
        .with_predictor(Arc::new(SlowPredictor {
            delay: Duration::from_millis(300),
            answer: PredictorResponse::new(cell(2), 0.99),
        }));

    let event = engine.decide(&ue(), 1_000).await.unwrap();
    assert_eq!(event.metadata.fallback, Some(FallbackReason::PredictorUnavailable));
    assert_eq!(event.to, cell(1));
    assert_eq!(engine.metrics().snapshot().predictor_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_predictor_within_timeout_is_used() {
    init_test_logging();

    let engine = engine_with_sessions(ml_config(), 3, &[TestSession::new("ue-1", 0, 1)])
        .with_predictor(Arc::new(SlowPredictor {
            delay: Duration::from_millis(50),
            answer: PredictorResponse::new(cell(2), 0.99),
        }));

    let event = engine.decide(&ue(), 1_000).await.unwrap();
    assert_eq!(event.metadata.fallback, None);
    assert_eq!(event.to, cell(2));
}
