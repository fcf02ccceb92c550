//! Session state store
//!
//! Owns the antenna catalog, one entry per session and the append-only
//! handover history. Locking follows two rules:
//!
//! - every session sits behind its own async mutex, held by a decision cycle
//!   for the whole cycle, so all mutations of one session are serialized
//! - the catalog and the session index are read-mostly and guarded by
//!   synchronous `RwLock`s that are never held across an `.await`
//!
//! No lock spans more than one session.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex as StdMutex, PoisonError, RwLock};

use nextgho_common::{
    AntennaId, GeoPosition, HandoverConfig, Mobility, QosContext, QosObservation, SessionId,
    TimestampMs,
};
use nextgho_radio::{AntennaCatalog, AntennaRecord, RadioError, RadioMetrics, RadioMetricsDeriver};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::a3::A3TimerState;
use crate::error::EngineError;
use crate::event::{DecisionMetadata, HandoverEvent, HandoverOutcome};
use crate::guard::OscillationState;

/// Live state of one mobile session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Session identifier
    pub id: SessionId,
    /// Last reported position
    pub position: GeoPosition,
    /// Last reported speed and heading
    pub mobility: Mobility,
    /// Serving antenna; changed only by a committed handover
    pub serving: AntennaId,
    /// Metrics of every antenna at `position`
    pub metrics: BTreeMap<AntennaId, RadioMetrics>,
    /// QoS context
    pub qos: QosContext,
    /// Latest QoS observation from the user plane
    pub observed_qos: Option<QosObservation>,
    /// Time of the last position report (ms)
    pub last_update_ms: TimestampMs,
}

/// Immutable view handed to decision logic and to the predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    /// Session identifier
    pub session_id: SessionId,
    /// Serving antenna
    pub serving: AntennaId,
    /// Position at the last report
    pub position: GeoPosition,
    /// Speed and heading at the last report
    pub mobility: Mobility,
    /// Per-antenna metrics
    pub metrics: BTreeMap<AntennaId, RadioMetrics>,
    /// Per-antenna load (0.0 - 1.0)
    pub antenna_loads: BTreeMap<AntennaId, f64>,
    /// QoS context
    pub qos: QosContext,
    /// Latest QoS observation
    pub observed_qos: Option<QosObservation>,
}

impl FeatureSnapshot {
    /// Metrics of the serving antenna.
    pub fn serving_metrics(&self) -> Option<&RadioMetrics> {
        self.metrics.get(&self.serving)
    }
}

/// Everything owned by one session.
#[derive(Debug)]
pub struct SessionEntry {
    state: SessionState,
    a3: A3TimerState,
    oscillation: OscillationState,
    history: Vec<HandoverEvent>,
}

/// Exclusive access to one session for the duration of a decision cycle.
pub struct SessionGuard {
    entry: OwnedMutexGuard<SessionEntry>,
}

impl SessionGuard {
    /// Current session state.
    pub fn state(&self) -> &SessionState {
        &self.entry.state
    }

    /// A3 timers of this session.
    pub fn a3_timers(&self) -> &A3TimerState {
        &self.entry.a3
    }

    /// Mutable A3 timers of this session.
    pub fn a3_timers_mut(&mut self) -> &mut A3TimerState {
        &mut self.entry.a3
    }

    /// Oscillation memory of this session.
    pub fn oscillation(&self) -> &OscillationState {
        &self.entry.oscillation
    }

    /// Committed events, oldest first.
    pub fn history(&self) -> &[HandoverEvent] {
        &self.entry.history
    }
}

/// Canonical store of antennas, sessions and history.
#[derive(Debug)]
pub struct SessionStateStore {
    deriver: RadioMetricsDeriver,
    antennas: RwLock<AntennaCatalog>,
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<SessionEntry>>>>,
    /// History of torn-down sessions
    retired: StdMutex<BTreeMap<SessionId, Vec<HandoverEvent>>>,
    recent_cells_capacity: usize,
    tracking_window_ms: u64,
}

impl SessionStateStore {
    /// Creates a store over a validated antenna topology.
    pub fn new(
        config: &HandoverConfig,
        antennas: impl IntoIterator<Item = AntennaRecord>,
    ) -> Result<Self, EngineError> {
        let mut catalog = AntennaCatalog::new();
        for antenna in antennas {
            antenna.validate()?;
            if catalog.contains_key(&antenna.id) {
                return Err(RadioError::InvalidParameter {
                    antenna: antenna.id.clone(),
                    reason: "duplicate antenna id".to_string(),
                }
                .into());
            }
            catalog.insert(antenna.id.clone(), antenna);
        }
        info!("Session store created with {} antennas", catalog.len());

        Ok(Self {
            deriver: RadioMetricsDeriver::new(&config.radio),
            antennas: RwLock::new(catalog),
            sessions: RwLock::new(HashMap::new()),
            retired: StdMutex::new(BTreeMap::new()),
            recent_cells_capacity: config.pingpong.recent_cells_capacity,
            tracking_window_ms: config.pingpong.tracking_window_ms(),
        })
    }

    // ========================================================================
    // Antennas
    // ========================================================================

    /// Number of antennas in the catalog.
    pub fn antenna_count(&self) -> usize {
        self.catalog().len()
    }

    /// Antenna ids, sorted.
    pub fn antenna_ids(&self) -> Vec<AntennaId> {
        self.catalog().keys().cloned().collect()
    }

    /// Returns a copy of an antenna record.
    pub fn antenna(&self, id: &AntennaId) -> Option<AntennaRecord> {
        self.catalog().get(id).cloned()
    }

    /// Returns true if the antenna is in the catalog.
    pub fn has_antenna(&self, id: &AntennaId) -> bool {
        self.catalog().contains_key(id)
    }

    /// Records a load report, clamped to [0, 1]. Returns the stored value.
    pub fn update_antenna_load(&self, id: &AntennaId, load: f64) -> Result<f64, EngineError> {
        let mut catalog = self.antennas.write().unwrap_or_else(PoisonError::into_inner);
        let antenna = catalog
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownAntenna(id.clone()))?;
        antenna.load = if load.is_nan() { 0.0 } else { load.clamp(0.0, 1.0) };
        debug!("Antenna {} load {:.2}", id, antenna.load);
        Ok(antenna.load)
    }

    fn catalog(&self) -> std::sync::RwLockReadGuard<'_, AntennaCatalog> {
        self.antennas.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn derive_metrics(&self, position: &GeoPosition) -> BTreeMap<AntennaId, RadioMetrics> {
        self.deriver.derive_all(position, &self.catalog())
    }

    // ========================================================================
    // Session lifecycle
    // ========================================================================

    /// Registers a session served by `serving`.
    pub fn register_session(
        &self,
        id: SessionId,
        position: GeoPosition,
        mobility: Mobility,
        serving: AntennaId,
        qos: QosContext,
        now: TimestampMs,
    ) -> Result<(), EngineError> {
        if !self.has_antenna(&serving) {
            return Err(EngineError::UnknownAntenna(serving));
        }
        let metrics = self.derive_metrics(&position);

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if sessions.contains_key(&id) {
            return Err(EngineError::DuplicateSession(id));
        }

        info!("Session {} registered on {} ({})", id, serving, qos.service_type);
        let entry = SessionEntry {
            state: SessionState {
                id: id.clone(),
                position,
                mobility,
                serving,
                metrics,
                qos,
                observed_qos: None,
                last_update_ms: now,
            },
            a3: A3TimerState::new(),
            oscillation: OscillationState::new(self.recent_cells_capacity),
            history: Vec::new(),
        };
        sessions.insert(id, Arc::new(Mutex::new(entry)));
        Ok(())
    }

    /// Tears a session down. Its history is retained.
    ///
    /// Waits for an in-flight decision cycle of the session to finish.
    pub async fn remove_session(&self, id: &SessionId) -> Result<(), EngineError> {
        let entry = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .ok_or_else(|| EngineError::UnknownSession(id.clone()))?;

        let mut entry = entry.lock().await;
        let history = std::mem::take(&mut entry.history);
        self.retired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id.clone())
            .or_default()
            .extend(history);
        info!("Session {} removed", id);
        Ok(())
    }

    /// Registered session ids, sorted.
    pub fn session_ids(&self) -> Vec<SessionId> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<_> = sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of registered sessions.
    pub fn session_count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if the session is registered.
    pub fn has_session(&self, id: &SessionId) -> bool {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// Takes exclusive ownership of a session.
    pub async fn lock(&self, id: &SessionId) -> Result<SessionGuard, EngineError> {
        let entry = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownSession(id.clone()))?;
        Ok(SessionGuard {
            entry: entry.lock_owned().await,
        })
    }

    // ========================================================================
    // Per-session operations
    // ========================================================================

    /// Records a position report and recomputes the session's metrics.
    pub async fn update_position(
        &self,
        id: &SessionId,
        position: GeoPosition,
        mobility: Mobility,
        now: TimestampMs,
    ) -> Result<(), EngineError> {
        let mut guard = self.lock(id).await?;
        let metrics = self.derive_metrics(&position);
        let state = &mut guard.entry.state;
        state.position = position;
        state.mobility = mobility;
        state.metrics = metrics;
        state.last_update_ms = now;
        Ok(())
    }

    /// Records the latest observed QoS of a session.
    pub async fn report_qos(
        &self,
        id: &SessionId,
        observation: QosObservation,
    ) -> Result<(), EngineError> {
        let mut guard = self.lock(id).await?;
        guard.entry.state.observed_qos = Some(observation);
        Ok(())
    }

    /// Returns the feature snapshot of a session.
    pub async fn feature_snapshot(&self, id: &SessionId) -> Result<FeatureSnapshot, EngineError> {
        let guard = self.lock(id).await?;
        Ok(self.snapshot_of(&guard))
    }

    /// Builds the feature snapshot of a locked session.
    pub fn snapshot_of(&self, guard: &SessionGuard) -> FeatureSnapshot {
        let state = guard.state();
        let antenna_loads = self
            .catalog()
            .iter()
            .map(|(id, antenna)| (id.clone(), antenna.load))
            .collect();

        FeatureSnapshot {
            session_id: state.id.clone(),
            serving: state.serving.clone(),
            position: state.position,
            mobility: state.mobility,
            metrics: state.metrics.clone(),
            antenna_loads,
            qos: state.qos,
            observed_qos: state.observed_qos,
        }
    }

    /// Returns a copy of the session state.
    pub async fn session_state(&self, id: &SessionId) -> Result<SessionState, EngineError> {
        Ok(self.lock(id).await?.state().clone())
    }

    /// Current serving antenna of a session.
    pub async fn serving_antenna(&self, id: &SessionId) -> Result<AntennaId, EngineError> {
        Ok(self.lock(id).await?.state().serving.clone())
    }

    /// Commits the outcome of a decision cycle for a session.
    ///
    /// See [`SessionStateStore::commit`].
    pub async fn apply_transition(
        &self,
        id: &SessionId,
        target: &AntennaId,
        metadata: DecisionMetadata,
        now: TimestampMs,
    ) -> Result<HandoverEvent, EngineError> {
        let mut guard = self.lock(id).await?;
        self.commit(&mut guard, target, metadata, now)
    }

    /// Commits a decision on a locked session.
    ///
    /// Sets the serving antenna and appends the event together; an unknown
    /// target is rejected before anything changes. A target equal to the
    /// serving antenna leaves it unchanged and records a non-applied outcome.
    pub fn commit(
        &self,
        guard: &mut SessionGuard,
        target: &AntennaId,
        metadata: DecisionMetadata,
        now: TimestampMs,
    ) -> Result<HandoverEvent, EngineError> {
        if !self.has_antenna(target) {
            return Err(EngineError::UnknownAntenna(target.clone()));
        }

        let entry = &mut *guard.entry;
        let timestamp_ms = entry
            .history
            .last()
            .map_or(now, |last| now.max(last.timestamp_ms));
        let from = entry.state.serving.clone();
        let changed = &from != target;

        let event = HandoverEvent {
            session_id: entry.state.id.clone(),
            timestamp_ms,
            from: from.clone(),
            to: target.clone(),
            outcome: HandoverOutcome::classify(changed, metadata.fallback),
            metadata,
        };

        if changed {
            entry
                .oscillation
                .record_handover(&from, timestamp_ms, self.tracking_window_ms);
            entry.state.serving = target.clone();
            entry.a3.clear();
        }
        entry.history.push(event.clone());

        Ok(event)
    }

    // ========================================================================
    // History
    // ========================================================================

    /// History of a live or removed session, oldest first.
    pub async fn history(&self, id: &SessionId) -> Result<Vec<HandoverEvent>, EngineError> {
        let retired = self
            .retired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned();

        match self.lock(id).await {
            Ok(guard) => {
                let mut events = retired.unwrap_or_default();
                events.extend_from_slice(guard.history());
                Ok(events)
            }
            Err(EngineError::UnknownSession(_)) if retired.is_some() => {
                Ok(retired.unwrap_or_default())
            }
            Err(e) => Err(e),
        }
    }

    /// History of every session ever registered.
    pub async fn all_history(&self) -> BTreeMap<SessionId, Vec<HandoverEvent>> {
        let mut all = self
            .retired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for id in self.session_ids() {
            if let Ok(guard) = self.lock(&id).await {
                all.entry(id).or_default().extend_from_slice(guard.history());
            }
        }
        all
    }
}
