//! Decision task
//!
//! Actor front-end of the engine. Inputs arrive as [`EngineMessage`]s on a
//! single channel; every session gets its own worker so that its position
//! reports, QoS reports and decision cycles run strictly in arrival order
//! while different sessions proceed concurrently.
//!
//! ```text
//!                       +--> worker(ue-1): position, decide, ...
//! EngineMessage --> DecisionTask --> worker(ue-2): ...
//!                       +--> antenna load: applied inline
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use nextgho_common::{AntennaId, GeoPosition, Mobility, QosObservation, SessionId, TimestampMs};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::HandoverEngine;
use crate::error::EngineError;
use crate::event::HandoverEvent;

/// Default capacity of task and worker channels.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

// ============================================================================
// Task Message Envelope
// ============================================================================

/// Task message envelope wrapping typed messages with control signals.
#[derive(Debug)]
pub enum TaskMessage<T> {
    /// Regular message payload
    Message(T),
    /// Shutdown signal - task should terminate gracefully
    Shutdown,
}

impl<T> TaskMessage<T> {
    /// Returns true if this is a shutdown signal.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, TaskMessage::Shutdown)
    }

    /// Returns the message payload if present, or None for shutdown.
    pub fn into_message(self) -> Option<T> {
        match self {
            TaskMessage::Message(msg) => Some(msg),
            TaskMessage::Shutdown => None,
        }
    }
}

/// Base trait for actor tasks.
#[async_trait]
pub trait Task: Send + 'static {
    /// The message type this task processes.
    type Message: Send;

    /// Runs the task's main loop until `TaskMessage::Shutdown` or until every
    /// sender is dropped.
    async fn run(&mut self, rx: mpsc::Receiver<TaskMessage<Self::Message>>);
}

/// Handle for sending messages to a task.
#[derive(Debug)]
pub struct TaskHandle<T> {
    tx: mpsc::Sender<TaskMessage<T>>,
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> TaskHandle<T> {
    /// Creates a new task handle from a sender.
    pub fn new(tx: mpsc::Sender<TaskMessage<T>>) -> Self {
        Self { tx }
    }

    /// Sends a message to the task.
    pub async fn send(&self, msg: T) -> Result<(), mpsc::error::SendError<TaskMessage<T>>> {
        self.tx.send(TaskMessage::Message(msg)).await
    }

    /// Sends a shutdown signal to the task.
    pub async fn shutdown(&self) -> Result<(), mpsc::error::SendError<TaskMessage<T>>> {
        self.tx.send(TaskMessage::Shutdown).await
    }

    /// Returns true if the task channel is closed.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ============================================================================
// Engine Messages
// ============================================================================

/// Reply channel for a decision cycle.
pub type DecisionReply = oneshot::Sender<Result<HandoverEvent, EngineError>>;

/// Inputs of the decision task.
#[derive(Debug)]
pub enum EngineMessage {
    /// Trajectory sample for a session
    PositionReport {
        /// Session
        session_id: SessionId,
        /// New position
        position: GeoPosition,
        /// Speed and heading
        mobility: Mobility,
        /// Sample time (ms)
        timestamp_ms: TimestampMs,
    },
    /// Observed QoS for a session
    QosReport {
        /// Session
        session_id: SessionId,
        /// Observation
        observation: QosObservation,
    },
    /// Load report for an antenna
    AntennaLoad {
        /// Antenna
        antenna_id: AntennaId,
        /// Load (0.0 - 1.0)
        load: f64,
    },
    /// Run a decision cycle
    Decide {
        /// Session
        session_id: SessionId,
        /// Decision time (ms)
        timestamp_ms: TimestampMs,
        /// Where to send the committed event
        reply: Option<DecisionReply>,
    },
    /// Tear a session down after its queued work
    RemoveSession {
        /// Session
        session_id: SessionId,
    },
}

enum SessionCommand {
    Position {
        position: GeoPosition,
        mobility: Mobility,
        timestamp_ms: TimestampMs,
    },
    Qos(QosObservation),
    Decide {
        timestamp_ms: TimestampMs,
        reply: Option<DecisionReply>,
    },
    Remove,
}

struct SessionWorker {
    tx: mpsc::Sender<SessionCommand>,
    handle: JoinHandle<()>,
}

// ============================================================================
// Decision Task
// ============================================================================

/// Actor driving the engine from messages.
pub struct DecisionTask {
    engine: Arc<HandoverEngine>,
    workers: HashMap<SessionId, SessionWorker>,
    /// Workers finishing a teardown
    retiring: Vec<(SessionId, JoinHandle<()>)>,
    channel_capacity: usize,
}

impl DecisionTask {
    /// Creates a task over `engine`.
    pub fn new(engine: Arc<HandoverEngine>) -> Self {
        Self {
            engine,
            workers: HashMap::new(),
            retiring: Vec::new(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Spawns the task on the current runtime.
    pub fn spawn(engine: Arc<HandoverEngine>) -> (TaskHandle<EngineMessage>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
        let mut task = DecisionTask::new(engine);
        let handle = tokio::spawn(async move { task.run(rx).await });
        (TaskHandle::new(tx), handle)
    }

    async fn handle_message(&mut self, msg: EngineMessage) {
        match msg {
            EngineMessage::PositionReport {
                session_id,
                position,
                mobility,
                timestamp_ms,
            } => {
                let cmd = SessionCommand::Position {
                    position,
                    mobility,
                    timestamp_ms,
                };
                self.dispatch(session_id, cmd).await;
            }
            EngineMessage::QosReport {
                session_id,
                observation,
            } => {
                self.dispatch(session_id, SessionCommand::Qos(observation))
                    .await;
            }
            EngineMessage::AntennaLoad { antenna_id, load } => {
                if let Err(e) = self.engine.store().update_antenna_load(&antenna_id, load) {
                    warn!("Ignoring load report: {}", e);
                }
            }
            EngineMessage::Decide {
                session_id,
                timestamp_ms,
                reply,
            } => {
                let cmd = SessionCommand::Decide {
                    timestamp_ms,
                    reply,
                };
                self.dispatch(session_id, cmd).await;
            }
            EngineMessage::RemoveSession { session_id } => {
                self.reap_retired().await;
                if let Some(worker) = self.workers.remove(&session_id) {
                    if worker.tx.send(SessionCommand::Remove).await.is_err() {
                        error!("Worker for session {} is gone", session_id);
                    }
                    self.retiring.push((session_id, worker.handle));
                } else if let Err(e) = self.engine.store().remove_session(&session_id).await {
                    warn!("Cannot remove session: {}", e);
                }
            }
        }
    }

    async fn dispatch(&mut self, session_id: SessionId, cmd: SessionCommand) {
        if !self.engine.store().has_session(&session_id) {
            // Removed directly on the store: the worker drains and exits once
            // its sender is dropped.
            if let Some(worker) = self.workers.remove(&session_id) {
                self.retiring.push((session_id.clone(), worker.handle));
            }
            self.reap_retired().await;
            reject(&session_id, cmd);
            return;
        }

        let capacity = self.channel_capacity;
        let engine = &self.engine;
        let worker = self.workers.entry(session_id.clone()).or_insert_with(|| {
            let (tx, rx) = mpsc::channel(capacity);
            let handle = tokio::spawn(session_worker(Arc::clone(engine), session_id.clone(), rx));
            debug!("Started worker for session {}", session_id);
            SessionWorker { tx, handle }
        });

        if worker.tx.send(cmd).await.is_err() {
            error!("Worker for session {} stopped unexpectedly", session_id);
            self.workers.remove(&session_id);
        }
    }

    /// Joins the retired workers that have already exited.
    async fn reap_retired(&mut self) {
        let (finished, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.retiring)
            .into_iter()
            .partition(|(_, handle)| handle.is_finished());
        self.retiring = pending;

        for (session_id, handle) in finished {
            if let Err(e) = handle.await {
                error!("Worker for session {} failed: {}", session_id, e);
            }
        }
    }

    async fn stop_workers(&mut self) {
        let mut handles: Vec<_> = self
            .workers
            .drain()
            .map(|(session_id, worker)| (session_id, worker.handle))
            .collect();
        handles.append(&mut self.retiring);

        for (session_id, handle) in handles {
            if let Err(e) = handle.await {
                error!("Worker for session {} failed: {}", session_id, e);
            }
        }
    }
}

/// Answers a command for a session the store does not know.
fn reject(session_id: &SessionId, cmd: SessionCommand) {
    let e = EngineError::UnknownSession(session_id.clone());
    match cmd {
        SessionCommand::Decide {
            reply: Some(reply), ..
        } => {
            let _ = reply.send(Err(e));
        }
        _ => warn!("Dropping command: {}", e),
    }
}

async fn session_worker(
    engine: Arc<HandoverEngine>,
    session_id: SessionId,
    mut rx: mpsc::Receiver<SessionCommand>,
) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            SessionCommand::Position {
                position,
                mobility,
                timestamp_ms,
            } => {
                if let Err(e) = engine
                    .store()
                    .update_position(&session_id, position, mobility, timestamp_ms)
                    .await
                {
                    warn!("Position report rejected: {}", e);
                }
            }
            SessionCommand::Qos(observation) => {
                if let Err(e) = engine.store().report_qos(&session_id, observation).await {
                    warn!("QoS report rejected: {}", e);
                }
            }
            SessionCommand::Decide {
                timestamp_ms,
                reply,
            } => {
                let result = engine.decide(&session_id, timestamp_ms).await;
                if let Err(e) = &result {
                    warn!("Decision cycle rejected: {}", e);
                }
                if let Some(reply) = reply {
                    // Receiver may have given up waiting
                    let _ = reply.send(result);
                }
            }
            SessionCommand::Remove => {
                if let Err(e) = engine.store().remove_session(&session_id).await {
                    warn!("Cannot remove session: {}", e);
                }
                break;
            }
        }
    }
    debug!("Worker for session {} stopped", session_id);
}

#[async_trait]
impl Task for DecisionTask {
    type Message = EngineMessage;

    async fn run(&mut self, mut rx: mpsc::Receiver<TaskMessage<Self::Message>>) {
        info!("Decision task started");

        while let Some(msg) = rx.recv().await {
            match msg {
                TaskMessage::Message(msg) => self.handle_message(msg).await,
                TaskMessage::Shutdown => {
                    info!("Decision task received shutdown signal");
                    break;
                }
            }
        }

        self.stop_workers().await;
        info!("Decision task stopped");
    }
}
