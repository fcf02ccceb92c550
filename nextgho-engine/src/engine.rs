//! Handover decision engine
//!
//! One decision cycle for a session:
//!
//! 1. lock the session and take its feature snapshot
//! 2. feed the snapshot to the A3 rule (timers advance every cycle)
//! 3. in ML mode, ask the predictor within the per-call timeout and the cycle
//!    deadline; any failure falls back to the A3 target
//! 4. pass the candidate through the oscillation guard
//! 5. gate an unsuppressed predictor decision on the priority-derived
//!    confidence floor and on observed QoS; a failure falls back to the A3
//!    target, which goes through the guard again
//! 6. commit through the session store and record metrics
//!
//! Predictor and QoS failures never surface as errors. Only unknown sessions
//! or antennas reject a cycle.

use std::sync::Arc;
use std::time::Duration;

use nextgho_common::{HandoverConfig, HandoverMode, SessionId, TimestampMs};
use tokio::task::JoinSet;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::a3::A3TriggerRule;
use crate::error::{EngineError, PredictorError};
use crate::event::{log_handover_event, DecisionMetadata, DecisionMode, FallbackReason, HandoverEvent};
use crate::guard::OscillationGuard;
use crate::metrics::HandoverMetrics;
use crate::predictor::{AntennaPredictor, PredictorResponse};
use crate::qos::QosGate;
use crate::state::{FeatureSnapshot, SessionStateStore};

/// Orchestrates the A3 rule, the predictor, the oscillation guard and the QoS
/// gate, and commits every decision through the session store.
pub struct HandoverEngine {
    config: Arc<HandoverConfig>,
    store: Arc<SessionStateStore>,
    a3: A3TriggerRule,
    guard: OscillationGuard,
    qos_gate: QosGate,
    predictor: Option<Arc<dyn AntennaPredictor>>,
    metrics: Arc<HandoverMetrics>,
}

impl HandoverEngine {
    /// Creates an engine over `store`. The configuration is validated here.
    pub fn new(config: HandoverConfig, store: Arc<SessionStateStore>) -> Result<Self, EngineError> {
        config.validate()?;

        let engine = Self {
            a3: A3TriggerRule::new(&config.a3),
            guard: OscillationGuard::new(&config.pingpong),
            qos_gate: QosGate::new(&config.qos),
            config: Arc::new(config),
            store,
            predictor: None,
            metrics: Arc::new(HandoverMetrics::new()),
        };
        info!(
            "Handover engine ready: mode={} (active {}), antennas={}, hysteresis={}dB, ttt={}s",
            engine.config.mode,
            engine.active_mode(),
            engine.store.antenna_count(),
            engine.config.a3.hysteresis_db,
            engine.config.a3.time_to_trigger_s
        );
        Ok(engine)
    }

    /// Wires in the antenna-selection predictor.
    pub fn with_predictor(mut self, predictor: Arc<dyn AntennaPredictor>) -> Self {
        info!("Using predictor '{}'", predictor.name());
        self.predictor = Some(predictor);
        self
    }

    /// Engine configuration.
    pub fn config(&self) -> &HandoverConfig {
        &self.config
    }

    /// Session store.
    pub fn store(&self) -> &Arc<SessionStateStore> {
        &self.store
    }

    /// Decision counters.
    pub fn metrics(&self) -> &Arc<HandoverMetrics> {
        &self.metrics
    }

    /// Mode used by the next cycle.
    ///
    /// `auto` selects ML once the catalog holds at least
    /// `ml_auto_activation_antenna_threshold` antennas.
    pub fn active_mode(&self) -> DecisionMode {
        match self.config.mode {
            HandoverMode::Ml => DecisionMode::Ml,
            HandoverMode::Rule => DecisionMode::Rule,
            HandoverMode::Auto => {
                if self.store.antenna_count() >= self.config.ml_auto_activation_antenna_threshold {
                    DecisionMode::Ml
                } else {
                    DecisionMode::Rule
                }
            }
        }
    }

    /// Runs one decision cycle for a session and commits its outcome.
    pub async fn decide(
        &self,
        session_id: &SessionId,
        now: TimestampMs,
    ) -> Result<HandoverEvent, EngineError> {
        let mut session = self.store.lock(session_id).await?;
        let features = self.store.snapshot_of(&session);
        let serving = features.serving.clone();

        let a3 = self
            .a3
            .evaluate(session.a3_timers_mut(), &serving, &features.metrics, now);
        let rule_target = a3.triggered.unwrap_or_else(|| serving.clone());

        let mode = self.active_mode();
        let mut fallback = None;
        let (candidate, confidence) = match mode {
            DecisionMode::Rule => (rule_target.clone(), 1.0),
            DecisionMode::Ml => match self.consult_predictor(&features).await {
                Ok(response) => (response.antenna_id, response.confidence),
                Err(reason) => {
                    fallback = Some(reason);
                    (rule_target.clone(), 1.0)
                }
            },
        };

        let mut verdict =
            self.guard
                .evaluate(session.oscillation(), &serving, &candidate, confidence, now);

        let mut qos = None;
        if mode == DecisionMode::Ml
            && fallback.is_none()
            && !verdict.is_suppressed()
            && self.qos_gate.is_enabled()
        {
            let gate = self.qos_gate.evaluate(
                &features.qos,
                features.observed_qos.as_ref(),
                verdict.effective_confidence,
            );
            if let Some(reason) = gate.fallback_reason() {
                debug!(
                    "Session {}: predictor decision {} rejected ({}), using A3 target {}",
                    session_id, candidate, reason, rule_target
                );
                fallback = Some(reason);
                verdict = self
                    .guard
                    .evaluate(session.oscillation(), &serving, &rule_target, 1.0, now);
            }
            qos = Some(gate);
        }

        let metadata = DecisionMetadata {
            mode,
            candidate: Some(candidate),
            confidence: verdict.effective_confidence,
            suppression: verdict.suppression_reason,
            fallback,
            qos,
        };

        let previous_handover = session.oscillation().last_handover_ms();
        let event = self
            .store
            .commit(&mut session, &verdict.final_target, metadata, now)?;
        drop(session);

        self.metrics.record_event(&event, previous_handover);
        log_handover_event(&event);
        Ok(event)
    }

    /// Runs one cycle for every registered session concurrently.
    ///
    /// Results are sorted by session id.
    pub async fn decide_all(
        self: &Arc<Self>,
        now: TimestampMs,
    ) -> Vec<(SessionId, Result<HandoverEvent, EngineError>)> {
        let mut cycles = JoinSet::new();
        for id in self.store.session_ids() {
            let engine = Arc::clone(self);
            cycles.spawn(async move {
                let result = engine.decide(&id, now).await;
                (id, result)
            });
        }

        let mut results = Vec::with_capacity(cycles.len());
        while let Some(joined) = cycles.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => error!("Decision cycle aborted: {}", e),
            }
        }
        results.sort_by(|a, b| a.0.cmp(&b.0));
        results
    }

    /// Asks the predictor, honouring the per-call timeout, the retry policy
    /// and the cycle deadline.
    ///
    /// Only transport failures are retried; a timeout or a malformed response
    /// falls back immediately.
    async fn consult_predictor(
        &self,
        features: &FeatureSnapshot,
    ) -> Result<PredictorResponse, FallbackReason> {
        let Some(predictor) = &self.predictor else {
            debug!("No predictor configured, session {} uses A3", features.session_id);
            return Err(FallbackReason::PredictorUnavailable);
        };

        let policy = &self.config.predictor;
        let call_timeout = Duration::from_millis(policy.timeout_ms);
        let deadline = Instant::now() + Duration::from_millis(policy.cycle_deadline_ms);

        let attempts = async {
            let mut attempt = 0;
            loop {
                let result = match timeout(call_timeout, predictor.predict(features)).await {
                    Ok(Ok(response)) => response.validate(features).map(|()| response),
                    Ok(Err(e)) => Err(e),
                    Err(_) => Err(PredictorError::Timeout {
                        timeout_ms: policy.timeout_ms,
                    }),
                };
                self.metrics.record_predictor_call(result.is_err());

                match result {
                    Ok(response) => return Ok(response),
                    Err(e @ PredictorError::Transport { .. }) if attempt < policy.max_retries => {
                        attempt += 1;
                        warn!(
                            "Predictor '{}' failed for session {} ({}), retry {}/{}",
                            predictor.name(),
                            features.session_id,
                            e,
                            attempt,
                            policy.max_retries
                        );
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        match tokio::time::timeout_at(deadline, attempts).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                warn!(
                    "Predictor '{}' unavailable for session {}: {}",
                    predictor.name(),
                    features.session_id,
                    e
                );
                Err(FallbackReason::PredictorUnavailable)
            }
            Err(_) => {
                warn!(
                    "Cycle deadline of {}ms exceeded for session {}",
                    policy.cycle_deadline_ms, features.session_id
                );
                Err(FallbackReason::DeadlineExceeded)
            }
        }
    }
}
