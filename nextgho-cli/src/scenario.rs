//! Scenario files for the nr-ho driver
//!
//! A scenario describes the antenna topology, the sessions with their start
//! positions and straight-line trajectories, and the simulation clock.

use std::collections::BTreeSet;
use std::path::Path;

use nextgho_common::{
    AntennaId, Error, GeoPosition, Mobility, QosContext, QosObservation, ServiceType, SessionId,
    SimulationTimeConfig,
};
use nextgho_radio::AntennaRecord;
use serde::{Deserialize, Serialize};

/// One simulated session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSpec {
    /// Session identifier
    pub id: SessionId,
    /// Start position
    pub position: GeoPosition,
    /// Constant speed (m/s)
    #[serde(default)]
    pub speed_mps: f64,
    /// Constant heading (degrees, 0 = north)
    #[serde(default)]
    pub heading_deg: f64,
    /// Initial serving antenna
    pub serving: AntennaId,
    /// Traffic class
    #[serde(default)]
    pub service_type: ServiceType,
    /// Priority override (class default when unset)
    #[serde(default)]
    pub priority: Option<u8>,
    /// Observed QoS reported once at start
    #[serde(default)]
    pub observed_qos: Option<QosObservation>,
}

impl SessionSpec {
    /// Speed and heading of this session.
    pub fn mobility(&self) -> Mobility {
        Mobility::new(self.speed_mps, self.heading_deg)
    }

    /// QoS context from the class defaults and the priority override.
    pub fn qos_context(&self) -> QosContext {
        let qos = QosContext::for_service(self.service_type);
        match self.priority {
            Some(priority) => qos.with_priority(priority),
            None => qos,
        }
    }
}

/// A complete scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Simulation clock
    #[serde(default)]
    pub time: SimulationTimeConfig,
    /// Antenna topology
    pub antennas: Vec<AntennaRecord>,
    /// Sessions to drive
    #[serde(default)]
    pub sessions: Vec<SessionSpec>,
}

impl ScenarioConfig {
    /// Loads a scenario from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parses a scenario from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, Error> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Checks references and identifiers.
    pub fn validate(&self) -> Result<(), Error> {
        if self.time.tick_duration_ms == 0 {
            return Err(Error::Config("tick_duration_ms must be positive".to_string()));
        }
        if self.antennas.is_empty() {
            return Err(Error::Config("scenario has no antennas".to_string()));
        }

        let mut antennas = BTreeSet::new();
        for antenna in &self.antennas {
            if !antennas.insert(&antenna.id) {
                return Err(Error::Config(format!("duplicate antenna {}", antenna.id)));
            }
        }

        let mut sessions = BTreeSet::new();
        for session in &self.sessions {
            if !sessions.insert(&session.id) {
                return Err(Error::Config(format!("duplicate session {}", session.id)));
            }
            if !antennas.contains(&session.serving) {
                return Err(Error::UnknownAntenna(session.serving.clone()));
            }
            if !session.speed_mps.is_finite() || session.speed_mps < 0.0 {
                return Err(Error::Config(format!(
                    "session {}: speed {} must be a non-negative number",
                    session.id, session.speed_mps
                )));
            }
        }
        Ok(())
    }
}
