/// Core data types for the cloudburst early-warning service.
///
/// This module defines the shared domain model imported by all other modules:
/// stages, environment samples, synthetic tier fields, the assembled output
/// row, and the error enums. It performs no I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Discrete escalation level of a node, in ascending order of severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Stage {
    #[default]
    Normal = 1,
    Watch = 2,
    Alert = 3,
}

impl Stage {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Stage {
    type Error = StageParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Stage::try_from(value as i64)
    }
}

impl TryFrom<i64> for Stage {
    type Error = StageParseError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Stage::Normal),
            2 => Ok(Stage::Watch),
            3 => Ok(Stage::Alert),
            other => Err(StageParseError(other.to_string())),
        }
    }
}

impl std::str::FromStr for Stage {
    type Err = StageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map_err(|_| StageParseError(s.to_string()))
            .and_then(Stage::try_from)
    }
}

impl From<Stage> for u8 {
    fn from(stage: Stage) -> u8 {
        stage.as_u8()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Persisted stage per node, keyed by node id.
pub type StageMap = BTreeMap<String, Stage>;

/// Externally supplied stage overrides. Absent entries mean "no override".
pub type ManualOverrides = BTreeMap<String, Stage>;

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Surface weather fields, either replayed or read from a hardware node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceReading {
    pub temperature: f64,
    pub pressure: f64,
    pub humidity: f64,
    pub rainfall_mm: f64,
    pub wind_speed: f64,
}

impl Default for SurfaceReading {
    fn default() -> Self {
        Self {
            temperature: 25.0,
            pressure: 1010.0,
            humidity: 60.0,
            rainfall_mm: 0.0,
            wind_speed: 3.0,
        }
    }
}

impl SurfaceReading {
    pub fn is_finite(&self) -> bool {
        [
            self.temperature,
            self.pressure,
            self.humidity,
            self.rainfall_mm,
            self.wind_speed,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Cloud environment fields. Always sourced from the replay dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudEnvironment {
    /// Precipitable water vapour (mm).
    pub pwv: f64,
    /// Cloud-base height (m).
    pub cloud_base: f64,
    /// Radar reflectivity (dBZ).
    pub radar_dbz: f64,
    /// Echo-top height (km).
    pub echo_top: f64,
    pub lightning: f64,
    /// Satellite brightness temperature (K).
    pub sat_bt: f64,
    /// Cloud-top cooling rate.
    pub ctc: f64,
    pub moisture_column: f64,
    pub convective_index: f64,
}

/// One environment snapshot for one node at one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnvironmentSample {
    pub surface: SurfaceReading,
    pub cloud: CloudEnvironment,
    /// Reflectivity growth rate (dBZ per step); the stage-3 trigger metric.
    pub burst_dbz_growth: f64,
}

/// Short-horizon rolling differences for one node.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RollingDeltas {
    pub pressure_drop_5: f64,
    pub pressure_drop_15: f64,
    pub humidity_change_15: f64,
}

// ---------------------------------------------------------------------------
// Synthetic tiers
// ---------------------------------------------------------------------------

/// Stage-2 microphysics fields.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stage2Fields {
    pub micro_lwc: f64,
    pub micro_droplet_size: f64,
    pub micro_vertical_wind: f64,
    pub micro_turbulence: f64,
    pub micro_moisture_gradient: f64,
    pub micro_temp_gradient: f64,
}

/// Stage-3 burst fields.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stage3Fields {
    pub burst_dbz_growth: f64,
    pub burst_updraft_surge: f64,
    pub burst_lightning_burst: u32,
    pub burst_lwc_spike: f64,
    pub burst_drop_collapse: f64,
    pub burst_rainfall_burst: f64,
}

// ---------------------------------------------------------------------------
// Output row
// ---------------------------------------------------------------------------

/// One fully assembled record per node per tick.
///
/// Built through `OutputRow::new`, which rejects rows that would poison the
/// persisted table (empty node id, non-finite numbers).
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRow {
    pub timestamp: DateTime<Utc>,
    pub node_id: String,
    pub lat: f64,
    pub lon: f64,
    pub surface: SurfaceReading,
    pub deltas: RollingDeltas,
    pub stage: Stage,
    pub cloud: CloudEnvironment,
    pub stage2: Stage2Fields,
    pub stage3: Stage3Fields,
    pub risk_score: f64,
    pub notes: String,
}

impl OutputRow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        timestamp: DateTime<Utc>,
        node_id: &str,
        lat: f64,
        lon: f64,
        environment: &EnvironmentSample,
        deltas: RollingDeltas,
        stage: Stage,
        stage2: Stage2Fields,
        stage3: Stage3Fields,
        risk_score: f64,
        notes: String,
    ) -> Result<Self, RowError> {
        let row = OutputRow {
            timestamp,
            node_id: node_id.to_string(),
            lat,
            lon,
            surface: environment.surface,
            deltas,
            stage,
            cloud: environment.cloud,
            stage2,
            stage3,
            risk_score,
            notes,
        };
        row.validate()?;
        Ok(row)
    }

    /// Checks the invariants every persisted row must satisfy.
    pub fn validate(&self) -> Result<(), RowError> {
        if self.node_id.trim().is_empty() {
            return Err(RowError::EmptyNodeId);
        }
        if let Some(field) = self.numeric_fields().find(|(_, v)| !v.is_finite()) {
            return Err(RowError::NonFinite {
                node_id: self.node_id.clone(),
                field: field.0,
            });
        }
        Ok(())
    }

    fn numeric_fields(&self) -> impl Iterator<Item = (&'static str, f64)> {
        let s = &self.surface;
        let c = &self.cloud;
        let m = &self.stage2;
        let b = &self.stage3;
        [
            ("lat", self.lat),
            ("lon", self.lon),
            ("temperature", s.temperature),
            ("pressure", s.pressure),
            ("humidity", s.humidity),
            ("rainfall_mm", s.rainfall_mm),
            ("wind_speed", s.wind_speed),
            ("pressure_drop_5", self.deltas.pressure_drop_5),
            ("pressure_drop_15", self.deltas.pressure_drop_15),
            ("humidity_change_15", self.deltas.humidity_change_15),
            ("cloud_env_pwv", c.pwv),
            ("cloud_env_cloud_base", c.cloud_base),
            ("cloud_env_radar_dbz", c.radar_dbz),
            ("cloud_env_echo_top", c.echo_top),
            ("cloud_env_lightning", c.lightning),
            ("cloud_env_sat_bt", c.sat_bt),
            ("cloud_env_ctc", c.ctc),
            ("cloud_env_moisture_column", c.moisture_column),
            ("cloud_env_convective_index", c.convective_index),
            ("micro_lwc", m.micro_lwc),
            ("micro_droplet_size", m.micro_droplet_size),
            ("micro_vertical_wind", m.micro_vertical_wind),
            ("micro_turbulence", m.micro_turbulence),
            ("micro_moisture_gradient", m.micro_moisture_gradient),
            ("micro_temp_gradient", m.micro_temp_gradient),
            ("burst_dbz_growth", b.burst_dbz_growth),
            ("burst_updraft_surge", b.burst_updraft_surge),
            ("burst_lwc_spike", b.burst_lwc_spike),
            ("burst_drop_collapse", b.burst_drop_collapse),
            ("burst_rainfall_burst", b.burst_rainfall_burst),
            ("risk_score", self.risk_score),
        ]
        .into_iter()
    }
}

/// Note written on rows whose stage came from a manual override.
pub fn override_note(stage: Stage) -> String {
    format!("manual_override:{}", stage)
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// A stage value outside {1, 2, 3}.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid stage '{0}': expected 1, 2 or 3")]
pub struct StageParseError(pub String);

/// An output row that failed validation at construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RowError {
    #[error("row has an empty node id")]
    EmptyNodeId,

    #[error("row for node {node_id} has a non-finite {field}")]
    NonFinite { node_id: String, field: &'static str },
}

/// Errors raised by the persistence and input ports.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing file does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The file exists but its contents could not be interpreted.
    #[error("malformed {path}: {reason}")]
    Malformed { path: String, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while loading the replay dataset. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("replay dataset missing: {0}")]
    Missing(String),

    #[error("replay dataset unreadable: {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("replay dataset has no header row")]
    NoHeader,

    #[error("replay dataset contains no data rows")]
    Empty,
}

/// Errors raised while loading or validating configuration. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row(risk: f64) -> Result<OutputRow, RowError> {
        OutputRow::new(
            Utc::now(),
            "node1",
            30.205,
            78.005,
            &EnvironmentSample::default(),
            RollingDeltas::default(),
            Stage::Normal,
            Stage2Fields::default(),
            Stage3Fields::default(),
            risk,
            String::new(),
        )
    }

    #[test]
    fn test_stage_ordering() {
        assert!(Stage::Normal < Stage::Watch);
        assert!(Stage::Watch < Stage::Alert);
    }

    #[test]
    fn test_stage_conversions() {
        assert_eq!(Stage::try_from(2u8), Ok(Stage::Watch));
        assert_eq!("3".parse::<Stage>(), Ok(Stage::Alert));
        assert!(Stage::try_from(0u8).is_err());
        assert!("4".parse::<Stage>().is_err());
        assert!("watch".parse::<Stage>().is_err());
    }

    #[test]
    fn test_stage_map_serializes_as_integers() {
        let mut map = StageMap::new();
        map.insert("node0".to_string(), Stage::Alert);
        let json = serde_json::to_string(&map).expect("serialize");
        assert_eq!(json, r#"{"node0":3}"#);

        let back: StageMap = serde_json::from_str(r#"{"node0":2}"#).expect("deserialize");
        assert_eq!(back["node0"], Stage::Watch);
        assert!(serde_json::from_str::<StageMap>(r#"{"node0":7}"#).is_err());
    }

    #[test]
    fn test_row_construction_validates() {
        assert!(sample_row(12.5).is_ok());
        assert_eq!(
            sample_row(f64::NAN),
            Err(RowError::NonFinite {
                node_id: "node1".to_string(),
                field: "risk_score"
            })
        );
    }

    #[test]
    fn test_override_note_format() {
        assert_eq!(override_note(Stage::Watch), "manual_override:2");
    }
}
