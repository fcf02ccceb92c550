//! Concurrent session integration tests
//!
//! Validates that many sessions decide concurrently without interfering, that
//! a commit is observed atomically, and that the decision task keeps each
//! session's commands in order.

use std::sync::Arc;

use integration_tests::{
    cell, engine_with_sessions, init_test_logging, position_near, wait_for_condition,
    TestSession, DEFAULT_POLL_INTERVAL, DEFAULT_TEST_TIMEOUT,
};
use nextgho_common::{HandoverConfig, HandoverMode, Mobility, QosObservation, SessionId};
use nextgho_engine::{
    DecisionMetadata, DecisionTask, EngineError, EngineMessage, HandoverOutcome,
};
use tokio::sync::oneshot;

fn rule_config() -> HandoverConfig {
    HandoverConfig {
        mode: HandoverMode::Rule,
        ..HandoverConfig::default()
    }
}

/// Sessions `ue-0 .. ue-{n-1}`, each on cell-0 next to cell-0.
fn sessions(n: usize) -> Vec<TestSession> {
    (0..n)
        .map(|i| TestSession::new(&format!("ue-{i}"), 0, 0))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_sessions_decide_all() {
    init_test_logging();

    let engine = Arc::new(engine_with_sessions(rule_config(), 4, &sessions(50)));
    let store = engine.store().clone();
    let mobility = Mobility::new(20.0, 90.0);
    let ticks = 8u64;

    for tick in 1..=ticks {
        let now = tick * 3_000;
        // Odd sessions walk east one cell per two ticks; even sessions stay
        for i in (1..50).step_by(2) {
            let near = ((tick as usize) / 2).min(3);
            store
                .update_position(&SessionId::new(format!("ue-{i}")), position_near(near), mobility, now)
                .await
                .unwrap();
        }
        let results = engine.decide_all(now).await;
        assert_eq!(results.len(), 50);
        assert!(results.iter().all(|(_, r)| r.is_ok()));
    }

    let history = store.all_history().await;
    assert_eq!(history.len(), 50);
    for (id, events) in &history {
        assert_eq!(events.len() as u64, ticks, "{id}");
        for pair in events.windows(2) {
            assert_eq!(pair[1].from, pair[0].to, "{id}");
            assert!(pair[1].timestamp_ms >= pair[0].timestamp_ms);
        }
    }

    // Even sessions never moved
    assert!(history[&SessionId::new("ue-0")]
        .iter()
        .all(|e| e.outcome == HandoverOutcome::Skipped));
    // Odd sessions followed the row to cell-3
    assert_eq!(
        store.serving_antenna(&SessionId::new("ue-1")).await.unwrap(),
        cell(3)
    );

    let snapshot = engine.metrics().snapshot();
    assert_eq!(snapshot.total_decisions(), 50 * ticks);
    assert_eq!(
        snapshot.decisions_with(HandoverOutcome::Applied),
        25 * 3,
        "three handovers per moving session"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_commit_is_atomic_for_readers() {
    init_test_logging();

    let engine = Arc::new(engine_with_sessions(rule_config(), 3, &sessions(1)));
    let store = engine.store().clone();
    let ue = SessionId::new("ue-0");

    let writer = {
        let store = store.clone();
        let ue = ue.clone();
        tokio::spawn(async move {
            for step in 0..300u64 {
                let target = cell((step % 3) as usize);
                let metadata = DecisionMetadata::rule(target.clone());
                store
                    .apply_transition(&ue, &target, metadata, step * 10)
                    .await
                    .unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..4 {
        let store = store.clone();
        let ue = ue.clone();
        readers.push(tokio::spawn(async move {
            for _ in 0..300 {
                let session = store.lock(&ue).await.unwrap();
                let serving = &session.state().serving;
                match session.history().last() {
                    Some(last) => assert_eq!(&last.to, serving),
                    None => assert_eq!(serving, &cell(0)),
                }
                drop(session);
                tokio::task::yield_now().await;
            }
        }));
    }

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
    assert_eq!(store.history(&ue).await.unwrap().len(), 300);
}

#[tokio::test]
async fn test_unknown_target_leaves_session_untouched() {
    init_test_logging();

    let engine = engine_with_sessions(rule_config(), 2, &sessions(1));
    let store = engine.store();
    let ue = SessionId::new("ue-0");
    let ghost = nextgho_common::AntennaId::new("cell-9");

    let result = store
        .apply_transition(&ue, &ghost, DecisionMetadata::rule(ghost.clone()), 1_000)
        .await;
    assert!(matches!(result, Err(EngineError::UnknownAntenna(_))));
    assert_eq!(store.serving_antenna(&ue).await.unwrap(), cell(0));
    assert!(store.history(&ue).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_decision_task_keeps_session_order() {
    init_test_logging();

    let engine = Arc::new(engine_with_sessions(rule_config(), 3, &sessions(10)));
    let (handle, join) = DecisionTask::spawn(engine.clone());
    let mobility = Mobility::new(15.0, 90.0);

    let mut replies = Vec::new();
    for i in 0..10 {
        let session_id = SessionId::new(format!("ue-{i}"));
        handle
            .send(EngineMessage::PositionReport {
                session_id: session_id.clone(),
                position: position_near(1),
                mobility,
                timestamp_ms: 1_000,
            })
            .await
            .unwrap();
        let (tx, rx) = oneshot::channel();
        handle
            .send(EngineMessage::Decide {
                session_id,
                timestamp_ms: 1_000,
                reply: Some(tx),
            })
            .await
            .unwrap();
        replies.push(rx);
    }

    for rx in replies {
        let event = rx.await.unwrap().unwrap();
        // The position report queued first is visible to the decision
        assert_eq!(event.outcome, HandoverOutcome::Applied);
        assert_eq!(event.to, cell(1));
    }

    handle.shutdown().await.unwrap();
    join.await.unwrap();
}

#[tokio::test]
async fn test_decision_task_removal_and_reports() {
    init_test_logging();

    let engine = Arc::new(engine_with_sessions(rule_config(), 2, &sessions(2)));
    let (handle, join) = DecisionTask::spawn(engine.clone());
    let ue0 = SessionId::new("ue-0");

    handle
        .send(EngineMessage::QosReport {
            session_id: ue0.clone(),
            observation: QosObservation {
                latency_ms: 12.0,
                throughput_mbps: 40.0,
                jitter_ms: 2.0,
                reliability_pct: 99.5,
            },
        })
        .await
        .unwrap();
    handle
        .send(EngineMessage::AntennaLoad {
            antenna_id: cell(1),
            load: 1.7,
        })
        .await
        .unwrap();
    handle
        .send(EngineMessage::Decide {
            session_id: ue0.clone(),
            timestamp_ms: 500,
            reply: None,
        })
        .await
        .unwrap();
    handle
        .send(EngineMessage::RemoveSession {
            session_id: ue0.clone(),
        })
        .await
        .unwrap();

    let store = engine.store().clone();
    wait_for_condition(
        || {
            let store = store.clone();
            async move { store.session_count() == 1 }
        },
        DEFAULT_TEST_TIMEOUT,
        DEFAULT_POLL_INTERVAL,
    )
    .await
    .unwrap();

    assert_eq!(store.antenna(&cell(1)).unwrap().load, 1.0);
    // History outlives the session
    let history = store.history(&ue0).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].timestamp_ms, 500);

    handle.shutdown().await.unwrap();
    join.await.unwrap();
    assert_eq!(store.session_ids(), vec![SessionId::new("ue-1")]);
}
