//! Core handover types: session/antenna identifiers, geographic position,
//! mobility state and QoS context.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Simulation or wall-clock time in milliseconds.
pub type TimestampMs = u64;

/// Mean Earth radius used for great-circle distances (meters).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Identifier of a mobile session (one UE).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new session identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identifier of a radio cell / antenna.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AntennaId(String);

impl AntennaId {
    /// Creates a new antenna identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AntennaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AntennaId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for AntennaId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Geographic position (WGS-84 degrees, altitude in meters).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPosition {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Altitude above ground in meters
    #[serde(default)]
    pub altitude: f64,
}

impl GeoPosition {
    /// Creates a new position.
    pub const fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }

    /// Great-circle ground distance to another position (haversine), in meters.
    pub fn ground_distance_to(&self, other: &GeoPosition) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = lat2 - lat1;
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
    }

    /// Straight-line distance including the altitude difference, in meters.
    pub fn distance_to(&self, other: &GeoPosition) -> f64 {
        let ground = self.ground_distance_to(other);
        let dz = self.altitude - other.altitude;
        (ground * ground + dz * dz).sqrt()
    }

    /// Returns the position reached after moving `distance_m` along `heading_deg`
    /// (0 = north, 90 = east). Altitude is unchanged.
    pub fn moved_by(&self, distance_m: f64, heading_deg: f64) -> GeoPosition {
        let delta = distance_m / EARTH_RADIUS_M;
        let heading = heading_deg.to_radians();
        let lat1 = self.latitude.to_radians();
        let lon1 = self.longitude.to_radians();

        let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * heading.cos()).asin();
        let lon2 = lon1
            + (heading.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * lat2.sin());

        GeoPosition {
            latitude: lat2.to_degrees(),
            longitude: lon2.to_degrees(),
            altitude: self.altitude,
        }
    }
}

impl fmt::Display for GeoPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.6}, {:.6}, {:.1}m)",
            self.latitude, self.longitude, self.altitude
        )
    }
}

/// Mobility state reported alongside a position sample.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Mobility {
    /// Speed in meters per second
    pub speed_mps: f64,
    /// Heading in degrees (0 = north, clockwise)
    pub heading_deg: f64,
}

impl Mobility {
    /// Creates a new mobility sample.
    pub const fn new(speed_mps: f64, heading_deg: f64) -> Self {
        Self {
            speed_mps,
            heading_deg,
        }
    }
}

/// Traffic class of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    /// Ultra-reliable low-latency communication
    Urllc,
    /// Enhanced mobile broadband
    Embb,
    /// Massive machine-type communication (IoT)
    Mmtc,
    /// Best-effort default class
    #[default]
    Default,
}

impl ServiceType {
    /// Default service priority (1 = lowest, 10 = highest).
    pub fn default_priority(&self) -> u8 {
        match self {
            ServiceType::Urllc => 9,
            ServiceType::Embb => 7,
            ServiceType::Mmtc => 3,
            ServiceType::Default => 5,
        }
    }

    /// Default QoS requirements for this class.
    pub fn default_requirements(&self) -> QosRequirements {
        match self {
            ServiceType::Urllc => QosRequirements {
                latency_ms: 1.0,
                throughput_mbps: 10.0,
                jitter_ms: 0.5,
                reliability_pct: 99.999,
            },
            ServiceType::Embb => QosRequirements {
                latency_ms: 20.0,
                throughput_mbps: 100.0,
                jitter_ms: 5.0,
                reliability_pct: 99.0,
            },
            ServiceType::Mmtc => QosRequirements {
                latency_ms: 1000.0,
                throughput_mbps: 0.1,
                jitter_ms: 100.0,
                reliability_pct: 95.0,
            },
            ServiceType::Default => QosRequirements {
                latency_ms: 100.0,
                throughput_mbps: 5.0,
                jitter_ms: 20.0,
                reliability_pct: 99.0,
            },
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceType::Urllc => write!(f, "urllc"),
            ServiceType::Embb => write!(f, "embb"),
            ServiceType::Mmtc => write!(f, "mmtc"),
            ServiceType::Default => write!(f, "default"),
        }
    }
}

/// Required QoS bounds for a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QosRequirements {
    /// Maximum tolerated latency (ms)
    pub latency_ms: f64,
    /// Minimum throughput (Mbps)
    pub throughput_mbps: f64,
    /// Maximum tolerated jitter (ms)
    pub jitter_ms: f64,
    /// Minimum reliability (percent)
    pub reliability_pct: f64,
}

/// Observed QoS for a session, as reported by the user plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QosObservation {
    /// Observed latency (ms)
    pub latency_ms: f64,
    /// Observed throughput (Mbps)
    pub throughput_mbps: f64,
    /// Observed jitter (ms)
    pub jitter_ms: f64,
    /// Observed reliability (percent)
    pub reliability_pct: f64,
}

/// QoS context attached to a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QosContext {
    /// Traffic class
    pub service_type: ServiceType,
    /// Service priority (1 = lowest, 10 = highest)
    pub priority: u8,
    /// Required bounds
    pub requirements: QosRequirements,
}

impl QosContext {
    /// Creates a QoS context with the class defaults.
    pub fn for_service(service_type: ServiceType) -> Self {
        Self {
            service_type,
            priority: service_type.default_priority(),
            requirements: service_type.default_requirements(),
        }
    }

    /// Overrides the priority (clamped to 1..=10).
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.clamp(1, 10);
        self
    }
}

impl Default for QosContext {
    fn default() -> Self {
        Self::for_service(ServiceType::Default)
    }
}
