//! Service configuration.
//!
//! Loaded from a TOML file (`cloudburst.toml` by default) after `.env` has
//! been applied. Every section is optional; missing keys fall back to the
//! values the demo deployment runs with.

use crate::model::ConfigError;
use crate::nodes::{self, Node};
use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "cloudburst.toml";

/// Seconds in a day; `max_rows` defaults to one day of rows per node.
const SECS_PER_DAY: u64 = 86_400;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceSection {
    pub interval_secs: u64,
    /// Maximum rows kept in the live table. Derived from the node count
    /// when omitted.
    pub max_rows: Option<usize>,
    /// Fixed RNG seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            max_rows: None,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    pub data_dir: PathBuf,
    pub replay_csv: PathBuf,
    pub hardware_csv: PathBuf,
    pub live_csv: PathBuf,
    pub manual_stage: PathBuf,
    pub stage_state: PathBuf,
    pub status_json: PathBuf,
    pub log_file: Option<PathBuf>,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            replay_csv: PathBuf::from("stage1_real_dataset.csv"),
            hardware_csv: PathBuf::from("hardware_node0.csv"),
            live_csv: PathBuf::from("live.csv"),
            manual_stage: PathBuf::from("manual_stage.json"),
            stage_state: PathBuf::from("stage_state.json"),
            status_json: PathBuf::from("hardware_output.json"),
            log_file: None,
        }
    }
}

impl PathsSection {
    /// Resolves a configured file name against `data_dir`. Absolute paths
    /// are returned unchanged.
    pub fn resolve(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.data_dir.join(file)
        }
    }

    pub fn replay_csv(&self) -> PathBuf {
        self.resolve(&self.replay_csv)
    }

    pub fn hardware_csv(&self) -> PathBuf {
        self.resolve(&self.hardware_csv)
    }

    pub fn live_csv(&self) -> PathBuf {
        self.resolve(&self.live_csv)
    }

    pub fn manual_stage(&self) -> PathBuf {
        self.resolve(&self.manual_stage)
    }

    pub fn stage_state(&self) -> PathBuf {
        self.resolve(&self.stage_state)
    }

    pub fn status_json(&self) -> PathBuf {
        self.resolve(&self.status_json)
    }
}

/// Fixed escalation thresholds. Not learned.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct TriggerThresholds {
    /// Reflectivity (dBZ) at or above which stage 2 fires.
    pub dbz_stage2: f64,
    /// 5-minute pressure change (hPa) at or below which the pressure clause holds.
    pub pressure_drop_5: f64,
    /// 15-minute humidity change (%) at or above which the humidity clause holds.
    pub humidity_rise_15: f64,
    /// Reflectivity growth at or above which stage 3 fires.
    pub dbz_growth_stage3: f64,
}

impl Default for TriggerThresholds {
    fn default() -> Self {
        Self {
            dbz_stage2: 45.0,
            pressure_drop_5: -2.0,
            humidity_rise_15: 8.0,
            dbz_growth_stage3: 6.0,
        }
    }
}

/// Standard deviations of the multiplicative per-node noise.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct NoiseScales {
    pub temperature: f64,
    pub pressure: f64,
    pub humidity: f64,
    pub rainfall: f64,
    pub wind: f64,
    /// Applied to radar reflectivity and echo-top height.
    pub radar: f64,
}

impl Default for NoiseScales {
    fn default() -> Self {
        Self {
            temperature: 0.02,
            pressure: 0.001,
            humidity: 0.03,
            rainfall: 0.15,
            wind: 0.10,
            radar: 0.05,
        }
    }
}

impl NoiseScales {
    /// No perturbation at all; every node sees the replay row verbatim.
    pub fn none() -> Self {
        Self {
            temperature: 0.0,
            pressure: 0.0,
            humidity: 0.0,
            rainfall: 0.0,
            wind: 0.0,
            radar: 0.0,
        }
    }

    fn all(&self) -> [(&'static str, f64); 6] {
        [
            ("temperature", self.temperature),
            ("pressure", self.pressure),
            ("humidity", self.humidity),
            ("rainfall", self.rainfall),
            ("wind", self.wind),
            ("radar", self.radar),
        ]
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HardwareSection {
    /// Readings older than this are treated as absent. Unset means never stale.
    pub max_age_minutes: Option<u64>,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceSection,
    pub paths: PathsSection,
    pub triggers: TriggerThresholds,
    pub noise: NoiseScales,
    pub hardware: HardwareSection,
    pub nodes: Vec<Node>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceSection::default(),
            paths: PathsSection::default(),
            triggers: TriggerThresholds::default(),
            noise: NoiseScales::default(),
            hardware: HardwareSection::default(),
            nodes: nodes::default_nodes(),
        }
    }
}

impl Config {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a config file. A missing file is an error; use `load_from_env`
    /// for the lenient startup path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text, &path.display().to_string())
    }

    /// Startup path used by the binary.
    ///
    /// Applies `.env`, then reads `CLOUDBURST_CONFIG` (or the default file
    /// name). Only the default file may be absent, in which case the built-in
    /// defaults are used. Environment overrides are applied last.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let mut config = match env::var("CLOUDBURST_CONFIG") {
            Ok(path) => Self::load(Path::new(&path))?,
            Err(_) => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::load(default_path)?
                } else {
                    Config::default()
                }
            }
        };

        if let Ok(dir) = env::var("CLOUDBURST_DATA_DIR") {
            config.paths.data_dir = PathBuf::from(dir);
        }
        if let Ok(file) = env::var("CLOUDBURST_LOG_FILE") {
            config.paths.log_file = Some(PathBuf::from(file));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.interval_secs == 0 {
            return Err(ConfigError::Invalid("service.interval_secs must be > 0".into()));
        }
        if self.service.max_rows == Some(0) {
            return Err(ConfigError::Invalid("service.max_rows must be > 0".into()));
        }
        if self.nodes.is_empty() {
            return Err(ConfigError::Invalid("at least one [[nodes]] entry is required".into()));
        }

        let mut seen = HashSet::new();
        for node in &self.nodes {
            if node.node_id.trim().is_empty() {
                return Err(ConfigError::Invalid("node_id must not be empty".into()));
            }
            if node.node_id.contains([',', '"', '\n', '\r']) {
                return Err(ConfigError::Invalid(format!(
                    "node_id {:?} must not contain commas, quotes or line breaks",
                    node.node_id
                )));
            }
            if !seen.insert(node.node_id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate node_id '{}'",
                    node.node_id
                )));
            }
        }

        let hardware_nodes = self.nodes.iter().filter(|n| n.hardware).count();
        if hardware_nodes > 1 {
            return Err(ConfigError::Invalid(format!(
                "at most one hardware node is supported, found {}",
                hardware_nodes
            )));
        }

        for (name, scale) in self.noise.all() {
            if !(scale.is_finite() && scale >= 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "noise.{} must be a finite value >= 0",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Live-table row limit: explicit `max_rows`, or one day of rows for
    /// every node.
    pub fn max_rows(&self) -> usize {
        self.service.max_rows.unwrap_or_else(|| {
            let ticks_per_day = (SECS_PER_DAY / self.service.interval_secs).max(1) as usize;
            ticks_per_day * self.nodes.len()
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_demo_deployment() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.service.interval_secs, 30);
        assert_eq!(config.nodes.len(), 5);
        // 2880 ticks per day at 30 s, five nodes.
        assert_eq!(config.max_rows(), 14_400);
        assert_eq!(config.triggers.dbz_stage2, 45.0);
        assert_eq!(config.triggers.dbz_growth_stage3, 6.0);
    }

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = Config::from_toml_str("", "inline").expect("empty config is valid");
        assert_eq!(config.nodes.len(), 5);
        assert_eq!(config.paths.live_csv(), PathBuf::from("data/live.csv"));
    }

    #[test]
    fn test_partial_document_overrides_only_given_keys() {
        let text = r#"
            [service]
            interval_secs = 60
            max_rows = 100

            [triggers]
            dbz_stage2 = 40.0

            [[nodes]]
            node_id = "ridge"
            lat = 30.3
            lon = 78.1
            hardware = true
        "#;
        let config = Config::from_toml_str(text, "inline").expect("valid config");
        assert_eq!(config.service.interval_secs, 60);
        assert_eq!(config.max_rows(), 100);
        assert_eq!(config.triggers.dbz_stage2, 40.0);
        assert_eq!(config.triggers.pressure_drop_5, -2.0);
        assert_eq!(config.nodes.len(), 1);
        assert!(config.nodes[0].hardware);
    }

    #[test]
    fn test_absolute_paths_are_not_rebased() {
        let mut paths = PathsSection::default();
        paths.live_csv = PathBuf::from("/var/lib/cloudburst/live.csv");
        assert_eq!(paths.live_csv(), PathBuf::from("/var/lib/cloudburst/live.csv"));
    }

    #[test]
    fn test_rejects_zero_interval() {
        let result = Config::from_toml_str("[service]\ninterval_secs = 0\n", "inline");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_duplicate_node_ids() {
        let text = r#"
            [[nodes]]
            node_id = "a"
            lat = 0.0
            lon = 0.0

            [[nodes]]
            node_id = "a"
            lat = 1.0
            lon = 1.0
        "#;
        let result = Config::from_toml_str(text, "inline");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_node_ids_that_break_the_live_table() {
        for bad in ["ridge,east", "ridge\"east", "ridge\neast", "ridge\reast"] {
            let mut config = Config::default();
            config.nodes = vec![
                crate::nodes::Node::new(bad, 30.2, 78.0, false),
                crate::nodes::Node::new("b", 30.3, 78.1, false),
            ];
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid(_))),
                "{:?} accepted",
                bad
            );
        }

        let text = "[[nodes]]\nnode_id = \"ridge,east\"\nlat = 0.0\nlon = 0.0\n";
        let result = Config::from_toml_str(text, "inline");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_two_hardware_nodes() {
        let text = r#"
            [[nodes]]
            node_id = "a"
            lat = 0.0
            lon = 0.0
            hardware = true

            [[nodes]]
            node_id = "b"
            lat = 1.0
            lon = 1.0
            hardware = true
        "#;
        assert!(Config::from_toml_str(text, "inline").is_err());
    }

    #[test]
    fn test_rejects_negative_noise() {
        let result = Config::from_toml_str("[noise]\npressure = -0.1\n", "inline");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let result = Config::from_toml_str("[service\ninterval_secs = ", "inline");
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_missing_explicit_file_is_read_error() {
        let result = Config::load(Path::new("/nonexistent/cloudburst.toml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
