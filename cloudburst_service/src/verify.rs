//! Data directory verification.
//!
//! Checks every file the generator reads or writes and reports which ones
//! are present, parseable and consistent with the configured node registry.
//! Run it (`cloudburst_service check`) before starting the service on a new
//! data directory.

use crate::alert::stalenesses::reading_is_stale;
use crate::config::Config;
use crate::ingest::hardware::CsvHardwareFeed;
use crate::ingest::replay::ReplayDataset;
use crate::model::StoreError;
use crate::nodes;
use crate::store::json::{parse_overrides, JsonStageFile};
use crate::store::table::parse_table;
use crate::store::{read_optional, HardwareFeed, StageStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataCheckReport {
    pub timestamp: String,
    pub data_dir: String,
    pub node_count: usize,
    pub sources: Vec<SourceCheck>,
    pub summary: CheckSummary,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckSummary {
    pub total: usize,
    pub ok: usize,
    pub warnings: usize,
    pub failed: usize,
    pub absent: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceCheck {
    pub name: String,
    pub path: String,
    /// The service refuses to start without this file.
    pub required: bool,
    pub status: VerificationStatus,
    pub record_count: usize,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum VerificationStatus {
    Success,
    PartialSuccess,
    Failed,
    /// Optional file not created yet.
    Absent,
}

impl SourceCheck {
    fn new(name: &str, path: &Path, required: bool) -> Self {
        Self {
            name: name.to_string(),
            path: path.display().to_string(),
            required,
            status: VerificationStatus::Failed,
            record_count: 0,
            error_message: None,
        }
    }

    fn ok(mut self, records: usize) -> Self {
        self.status = VerificationStatus::Success;
        self.record_count = records;
        self
    }

    fn partial(mut self, records: usize, message: String) -> Self {
        self.status = VerificationStatus::PartialSuccess;
        self.record_count = records;
        self.error_message = Some(message);
        self
    }

    fn failed(mut self, message: String) -> Self {
        self.status = VerificationStatus::Failed;
        self.error_message = Some(message);
        self
    }

    /// Maps a store error: a missing optional file is `Absent`, anything
    /// else is a failure.
    fn from_store_error(self, err: &StoreError) -> Self {
        match err {
            StoreError::NotFound(_) if !self.required => Self {
                status: VerificationStatus::Absent,
                ..self
            },
            other => self.failed(other.to_string()),
        }
    }
}

impl DataCheckReport {
    /// No source failed. Absent optional files and warnings are fine.
    pub fn is_healthy(&self) -> bool {
        self.summary.failed == 0
    }

    pub fn source(&self, name: &str) -> Option<&SourceCheck> {
        self.sources.iter().find(|s| s.name == name)
    }
}

// ============================================================================
// Individual Checks
// ============================================================================

pub fn check_replay(path: &Path) -> SourceCheck {
    let check = SourceCheck::new("replay", path, true);
    match ReplayDataset::load(path) {
        Ok(dataset) => check.ok(dataset.len()),
        Err(e) => check.failed(e.to_string()),
    }
}

pub fn check_hardware(path: &Path, max_age_minutes: Option<u64>, now: DateTime<Utc>) -> SourceCheck {
    let check = SourceCheck::new("hardware", path, false);
    match CsvHardwareFeed::new(path).latest() {
        Ok(reading) if reading_is_stale(reading.observed_at, max_age_minutes, now) => {
            check.partial(1, "latest reading is stale".to_string())
        }
        Ok(_) => check.ok(1),
        Err(e) => check.from_store_error(&e),
    }
}

pub fn check_overrides(path: &Path, config: &Config) -> SourceCheck {
    let check = SourceCheck::new("manual_overrides", path, false);
    let overrides = match read_optional(path).and_then(|text| parse_overrides(&text, path)) {
        Ok(overrides) => overrides,
        Err(e) => return check.from_store_error(&e),
    };

    let unknown: Vec<&str> = overrides
        .keys()
        .map(String::as_str)
        .filter(|id| nodes::find_node(&config.nodes, id).is_none())
        .collect();
    if unknown.is_empty() {
        check.ok(overrides.len())
    } else {
        check.partial(
            overrides.len(),
            format!("overrides for unknown nodes: {}", unknown.join(", ")),
        )
    }
}

pub fn check_stage_state(path: &Path, config: &Config) -> SourceCheck {
    let check = SourceCheck::new("stage_state", path, false);
    let stages = match JsonStageFile::new(path).load() {
        Ok(stages) => stages,
        Err(e) => return check.from_store_error(&e),
    };

    let missing: Vec<&str> = nodes::all_node_ids(&config.nodes)
        .into_iter()
        .filter(|id| !stages.contains_key(*id))
        .collect();
    if missing.is_empty() {
        check.ok(stages.len())
    } else {
        check.partial(
            stages.len(),
            format!("no persisted stage for: {}", missing.join(", ")),
        )
    }
}

pub fn check_live_table(path: &Path, max_rows: usize) -> SourceCheck {
    let check = SourceCheck::new("live_table", path, false);
    let text = match read_optional(path) {
        Ok(text) => text,
        Err(e) => return check.from_store_error(&e),
    };

    let (rows, skipped) = parse_table(&text);
    if skipped > 0 {
        check.partial(rows.len(), format!("{} unreadable rows", skipped))
    } else if rows.len() > max_rows {
        check.partial(
            rows.len(),
            format!("{} rows exceeds max_rows {}", rows.len(), max_rows),
        )
    } else {
        check.ok(rows.len())
    }
}

// ============================================================================
// Full Check
// ============================================================================

pub fn run_data_check(config: &Config, now: DateTime<Utc>) -> DataCheckReport {
    let paths = &config.paths;
    let mut sources = vec![check_replay(&paths.replay_csv())];
    if nodes::hardware_node(&config.nodes).is_some() {
        sources.push(check_hardware(
            &paths.hardware_csv(),
            config.hardware.max_age_minutes,
            now,
        ));
    }
    sources.push(check_overrides(&paths.manual_stage(), config));
    sources.push(check_stage_state(&paths.stage_state(), config));
    sources.push(check_live_table(&paths.live_csv(), config.max_rows()));

    let mut summary = CheckSummary {
        total: sources.len(),
        ..CheckSummary::default()
    };
    for source in &sources {
        match source.status {
            VerificationStatus::Success => summary.ok += 1,
            VerificationStatus::PartialSuccess => summary.warnings += 1,
            VerificationStatus::Failed => summary.failed += 1,
            VerificationStatus::Absent => summary.absent += 1,
        }
    }

    DataCheckReport {
        timestamp: now.to_rfc3339(),
        data_dir: paths.data_dir.display().to_string(),
        node_count: config.nodes.len(),
        sources,
        summary,
    }
}

pub fn print_summary(report: &DataCheckReport) {
    println!("═══════════════════════════════════════════════════════════");
    println!("📊 DATA CHECK: {} ({} nodes)", report.data_dir, report.node_count);
    println!("═══════════════════════════════════════════════════════════");
    for source in &report.sources {
        let detail = source.error_message.as_deref().unwrap_or("");
        match source.status {
            VerificationStatus::Success => {
                println!("✓ {:<18} OK ({} records)", source.name, source.record_count)
            }
            VerificationStatus::PartialSuccess => println!(
                "⚠ {:<18} {} records, {}",
                source.name, source.record_count, detail
            ),
            VerificationStatus::Failed => println!("✗ {:<18} FAILED: {}", source.name, detail),
            VerificationStatus::Absent => println!("· {:<18} not present yet", source.name),
        }
        println!("  {}", source.path);
    }
    println!();
    println!(
        "{} ok, {} warnings, {} failed, {} absent",
        report.summary.ok, report.summary.warnings, report.summary.failed, report.summary.absent
    );
    println!("═══════════════════════════════════════════════════════════");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "cloudburst-verify-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn config_in(dir: &Path) -> Config {
        let mut config = Config::default();
        config.paths.data_dir = dir.to_path_buf();
        config
    }

    #[test]
    fn test_empty_dir_fails_only_on_replay() {
        let dir = temp_dir("empty");
        let report = run_data_check(&config_in(&dir), Utc::now());
        assert!(!report.is_healthy());
        assert_eq!(report.summary.failed, 1);
        assert_eq!(
            report.source("replay").map(|s| s.status),
            Some(VerificationStatus::Failed)
        );
        assert_eq!(
            report.source("live_table").map(|s| s.status),
            Some(VerificationStatus::Absent)
        );
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_unknown_override_node_is_a_warning() {
        let dir = temp_dir("overrides");
        let config = config_in(&dir);
        fs::write(dir.join("manual_stage.json"), r#"{"node1": 2, "node99": 3}"#).expect("write");
        let check = check_overrides(&config.paths.manual_stage(), &config);
        assert_eq!(check.status, VerificationStatus::PartialSuccess);
        assert_eq!(check.record_count, 2);
        assert!(check.error_message.unwrap_or_default().contains("node99"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_healthy_directory() {
        let dir = temp_dir("healthy");
        let config = config_in(&dir);
        fs::write(
            dir.join("stage1_real_dataset.csv"),
            "timestamp,pressure,humidity,cloud_env_radar_dbz\n01-07-2025 14:00:00,1008,70,30\n",
        )
        .expect("write replay");
        fs::write(
            dir.join("stage_state.json"),
            r#"{"node0":1,"node1":2,"node2":1,"node3":1,"node4":1}"#,
        )
        .expect("write stages");

        let report = run_data_check(&config, Utc::now());
        assert!(report.is_healthy());
        assert_eq!(report.source("replay").map(|s| s.record_count), Some(1));
        assert_eq!(
            report.source("stage_state").map(|s| s.status),
            Some(VerificationStatus::Success)
        );
        let _ = fs::remove_dir_all(&dir);
    }
}
