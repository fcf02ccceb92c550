//! nextgho handover scenario driver
//!
//! Loads a handover configuration and a scenario, then drives every session
//! along its trajectory tick by tick through the decision task:
//! - CLI argument parsing
//! - Configuration loading, environment overrides and validation
//! - Decision task spawning and graceful shutdown
//! - Summary, metrics snapshot and optional event export
//!
//! # Usage
//!
//! ```bash
//! nr-ho -c config/handover.yaml -s config/scenario.yaml --events-out events.json
//! ```

mod config_loader;
mod scenario;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use nextgho_common::{
    init_logging, GeoPosition, HandoverConfig, LogLevel, SessionId, SimulationClock, TimestampMs,
};
use nextgho_engine::{
    DecisionTask, EngineMessage, HandoverEngine, HandoverEvent, SessionStateStore,
    SignalQualityPredictor, TaskHandle,
};

use crate::config_loader::load_and_validate_config;
use crate::scenario::{ScenarioConfig, SessionSpec};

/// nextgho - handover decision engine scenario driver
#[derive(Parser, Debug)]
#[command(name = "nr-ho")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the handover configuration file (YAML); defaults when omitted
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config_file: Option<PathBuf>,

    /// Path to the scenario file (YAML)
    #[arg(short = 's', long = "scenario", value_name = "FILE")]
    scenario_file: PathBuf,

    /// Write the full handover history as JSON
    #[arg(long = "events-out", value_name = "FILE")]
    events_out: Option<PathBuf>,

    /// Run without the built-in predictor
    #[arg(long = "no-predictor")]
    no_predictor: bool,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long = "log-level", default_value = "info")]
    log_level: LogLevel,
}

/// A session moving along a straight line.
struct SimulatedSession {
    spec: SessionSpec,
    position: GeoPosition,
    handovers: u64,
}

impl SimulatedSession {
    fn new(spec: SessionSpec) -> Self {
        Self {
            position: spec.position,
            spec,
            handovers: 0,
        }
    }

    fn advance(&mut self, dt_s: f64) {
        self.position = self
            .position
            .moved_by(self.spec.speed_mps * dt_s, self.spec.heading_deg);
    }
}

/// Driver state
struct HandoverApp {
    engine: Arc<HandoverEngine>,
    handle: TaskHandle<EngineMessage>,
    task: tokio::task::JoinHandle<()>,
    clock: SimulationClock,
    sessions: Vec<SimulatedSession>,
}

impl HandoverApp {
    fn new(config: HandoverConfig, scenario: ScenarioConfig, with_predictor: bool) -> Result<Self> {
        let store = Arc::new(
            SessionStateStore::new(&config, scenario.antennas)
                .context("Failed to build the antenna catalog")?,
        );

        for spec in &scenario.sessions {
            store
                .register_session(
                    spec.id.clone(),
                    spec.position,
                    spec.mobility(),
                    spec.serving.clone(),
                    spec.qos_context(),
                    0,
                )
                .with_context(|| format!("Failed to register session {}", spec.id))?;
        }

        let mut engine = HandoverEngine::new(config, store)?;
        if with_predictor {
            engine = engine.with_predictor(Arc::new(SignalQualityPredictor::new()));
        }
        let engine = Arc::new(engine);
        info!(
            "Engine ready: {} antennas, {} sessions, active mode {}",
            engine.store().antenna_count(),
            engine.store().session_count(),
            engine.active_mode()
        );

        let (handle, task) = DecisionTask::spawn(engine.clone());
        info!("Decision task spawned");

        Ok(Self {
            engine,
            handle,
            task,
            clock: SimulationClock::new(scenario.time),
            sessions: scenario.sessions.into_iter().map(SimulatedSession::new).collect(),
        })
    }

    async fn send(&self, msg: EngineMessage) -> Result<()> {
        self.handle
            .send(msg)
            .await
            .map_err(|_| anyhow!("decision task is gone"))
    }

    /// Reports the initial observed QoS of every session that has one.
    async fn report_initial_qos(&self) -> Result<()> {
        for session in &self.sessions {
            if let Some(observation) = session.spec.observed_qos {
                self.send(EngineMessage::QosReport {
                    session_id: session.spec.id.clone(),
                    observation,
                })
                .await?;
            }
        }
        Ok(())
    }

    /// Runs one tick: move every session, then one decision cycle each.
    async fn step(&mut self, now: TimestampMs) -> Result<()> {
        let dt_s = self.clock.config().tick_duration_ms as f64 / 1000.0;
        let mut pending = Vec::with_capacity(self.sessions.len());

        for session in &mut self.sessions {
            session.advance(dt_s);
        }
        for session in &self.sessions {
            let session_id = session.spec.id.clone();
            self.send(EngineMessage::PositionReport {
                session_id: session_id.clone(),
                position: session.position,
                mobility: session.spec.mobility(),
                timestamp_ms: now,
            })
            .await?;

            let (tx, rx) = oneshot::channel();
            self.send(EngineMessage::Decide {
                session_id,
                timestamp_ms: now,
                reply: Some(tx),
            })
            .await?;
            pending.push(rx);
        }

        for (session, rx) in self.sessions.iter_mut().zip(pending) {
            match rx.await {
                Ok(Ok(event)) => {
                    if event.is_handover() {
                        session.handovers += 1;
                    }
                }
                Ok(Err(e)) => warn!("Decision for {} failed: {}", session.spec.id, e),
                Err(_) => return Err(anyhow!("decision for {} was dropped", session.spec.id)),
            }
        }
        Ok(())
    }

    /// Runs the scenario to completion.
    async fn run(&mut self) -> Result<()> {
        self.report_initial_qos().await?;
        info!(
            "Running {} ticks of {} ms",
            self.clock.config().total_ticks,
            self.clock.config().tick_duration_ms
        );

        while !self.clock.is_complete() {
            if let Some(wait) = self.clock.time_until_next_tick() {
                tokio::time::sleep(wait).await;
            }
            let now = self.clock.tick();
            self.step(now).await?;
        }

        info!("Scenario complete at t={} ms", self.clock.current_time_ms());
        Ok(())
    }

    /// Stops the decision task after its queued work.
    async fn shutdown(self) -> Result<Arc<HandoverEngine>> {
        info!("Initiating graceful shutdown...");
        if self.handle.shutdown().await.is_err() {
            warn!("Decision task already stopped");
        }
        self.task.await.context("Decision task panicked")?;
        Ok(self.engine)
    }

    fn summary(&self) -> BTreeMap<SessionId, u64> {
        self.sessions
            .iter()
            .map(|s| (s.spec.id.clone(), s.handovers))
            .collect()
    }
}

async fn print_summary(engine: &HandoverEngine, handovers: &BTreeMap<SessionId, u64>) -> Result<()> {
    println!();
    println!("{:<16} {:<16} {:>10}", "SESSION", "SERVING", "HANDOVERS");
    for (session_id, count) in handovers {
        let serving = engine.store().serving_antenna(session_id).await?;
        println!("{:<16} {:<16} {:>10}", session_id, serving, count);
    }

    let snapshot = engine.metrics().snapshot();
    println!();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn write_events(path: &Path, history: &BTreeMap<SessionId, Vec<HandoverEvent>>) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), history)
        .with_context(|| format!("Failed to write events to {}", path.display()))?;
    info!("Wrote {} session histories to {}", history.len(), path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_level);

    println!("nextgho - Handover Decision Engine");
    println!("==================================");

    match run_scenario(args).await {
        Ok(()) => {
            info!("nr-ho exited successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("nr-ho failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Main driver logic
async fn run_scenario(args: Args) -> Result<()> {
    let config = load_and_validate_config(args.config_file.as_ref()).with_context(|| {
        match &args.config_file {
            Some(path) => format!("Failed to load configuration from {}", path.display()),
            None => "Invalid default configuration".to_string(),
        }
    })?;
    info!(
        "Configuration loaded: mode={}, A3 {} dB / {} ms ({})",
        config.mode,
        config.a3.hysteresis_db,
        config.a3.time_to_trigger_ms(),
        config.a3.mode
    );

    let scenario = ScenarioConfig::load(&args.scenario_file).with_context(|| {
        format!("Failed to load scenario from {}", args.scenario_file.display())
    })?;
    scenario.validate().context("Invalid scenario")?;

    let mut app = HandoverApp::new(config, scenario, !args.no_predictor)?;

    tokio::select! {
        result = app.run() => result?,
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, stopping early...");
        }
    }

    let handovers = app.summary();
    let engine = app.shutdown().await?;

    print_summary(&engine, &handovers).await?;
    if let Some(path) = &args.events_out {
        write_events(path, &engine.store().all_history().await)?;
    }
    Ok(())
}
