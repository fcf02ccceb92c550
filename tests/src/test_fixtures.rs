//! Test fixtures and engine builders
//!
//! Antennas sit on a west-east row at latitude 48, 0.01 degrees (about 745 m)
//! apart, using the line-of-sight close-in model so that the nearest cell is
//! always the strongest.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use nextgho_common::{AntennaId, GeoPosition, HandoverConfig, Mobility, QosContext, SessionId};
use nextgho_engine::{
    AntennaPredictor, FeatureSnapshot, HandoverEngine, PredictorError, PredictorResponse,
    SessionStateStore,
};
use nextgho_radio::{AntennaRecord, PathLossModel};

/// Longitude step between neighbouring cells (degrees)
pub const CELL_SPACING_DEG: f64 = 0.01;

/// Id of the `i`-th cell of the row.
pub fn cell(i: usize) -> AntennaId {
    AntennaId::new(format!("cell-{i}"))
}

/// `n` antennas on a row, `cell-0` westmost.
pub fn antenna_row(n: usize) -> Vec<AntennaRecord> {
    (0..n)
        .map(|i| {
            AntennaRecord::new(
                cell(i),
                GeoPosition::new(48.0, 11.0 + CELL_SPACING_DEG * i as f64, 25.0),
                43.0,
                3.5e9,
            )
            .with_path_loss(PathLossModel::close_in_los())
        })
        .collect()
}

/// Ground position right next to the `i`-th cell.
pub fn position_near(i: usize) -> GeoPosition {
    GeoPosition::new(48.0, 11.0 + CELL_SPACING_DEG * i as f64 - 0.0005, 1.5)
}

/// Session to register in a test engine.
#[derive(Debug, Clone)]
pub struct TestSession {
    pub id: SessionId,
    pub position: GeoPosition,
    pub serving: AntennaId,
    pub qos: QosContext,
}

impl TestSession {
    /// Session served by `serving`, located next to cell `near`.
    pub fn new(id: &str, serving: usize, near: usize) -> Self {
        Self {
            id: SessionId::new(id),
            position: position_near(near),
            serving: cell(serving),
            qos: QosContext::default(),
        }
    }

    /// Replaces the QoS context.
    pub fn with_qos(mut self, qos: QosContext) -> Self {
        self.qos = qos;
        self
    }
}

/// Builds an engine over `antennas` cells with the given sessions.
pub fn engine_with_sessions(
    config: HandoverConfig,
    antennas: usize,
    sessions: &[TestSession],
) -> HandoverEngine {
    let store = Arc::new(
        SessionStateStore::new(&config, antenna_row(antennas)).expect("valid antenna row"),
    );
    for session in sessions {
        store
            .register_session(
                session.id.clone(),
                session.position,
                Mobility::new(10.0, 90.0),
                session.serving.clone(),
                session.qos,
                0,
            )
            .expect("session registration");
    }
    HandoverEngine::new(config, store).expect("valid configuration")
}

// ============================================================================
// Predictors
// ============================================================================

/// Answers from a script; the last answer repeats once the script runs out.
#[derive(Debug, Default)]
pub struct ScriptedPredictor {
    script: Mutex<VecDeque<PredictorResponse>>,
    last: Mutex<Option<PredictorResponse>>,
    calls: AtomicU32,
}

impl ScriptedPredictor {
    /// Creates a predictor from `(antenna, confidence)` answers.
    pub fn new<I>(answers: I) -> Self
    where
        I: IntoIterator<Item = (AntennaId, f64)>,
    {
        Self {
            script: Mutex::new(
                answers
                    .into_iter()
                    .map(|(id, confidence)| PredictorResponse::new(id, confidence))
                    .collect(),
            ),
            last: Mutex::new(None),
            calls: AtomicU32::new(0),
        }
    }

    /// Queues another answer.
    pub fn push(&self, antenna: AntennaId, confidence: f64) {
        self.script
            .lock()
            .unwrap()
            .push_back(PredictorResponse::new(antenna, confidence));
    }

    /// Number of predict calls so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AntennaPredictor for ScriptedPredictor {
    async fn predict(&self, _: &FeatureSnapshot) -> Result<PredictorResponse, PredictorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(response) = next {
            *last = Some(response);
        }
        last.clone().ok_or_else(|| PredictorError::Transport {
            reason: "script exhausted".to_string(),
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Always fails with a transport error.
#[derive(Debug, Default)]
pub struct FailingPredictor {
    calls: AtomicU32,
}

impl FailingPredictor {
    /// Number of predict calls so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AntennaPredictor for FailingPredictor {
    async fn predict(&self, _: &FeatureSnapshot) -> Result<PredictorResponse, PredictorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(PredictorError::Transport {
            reason: "connection refused".to_string(),
        })
    }
}

/// Answers after a fixed delay.
#[derive(Debug)]
pub struct SlowPredictor {
    pub delay: Duration,
    pub answer: PredictorResponse,
}

#[async_trait]
impl AntennaPredictor for SlowPredictor {
    async fn predict(&self, _: &FeatureSnapshot) -> Result<PredictorResponse, PredictorError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.answer.clone())
    }
}
