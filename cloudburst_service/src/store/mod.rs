//! Persistence and input ports.
//!
//! The generator talks to its collaborators (dashboard, API, operator tools)
//! through flat files read and written whole. Each file is reached through
//! one of the traits below so tests and alternative backends can swap the
//! storage without touching the tick logic.
//!
//! - `json`  — override map, stage map and node status files.
//! - `table` — the bounded live CSV table.
//! - `MemoryStore` — shared in-memory backend for every port.

pub mod json;
pub mod table;

use crate::alert::risk::NodeStatus;
use crate::ingest::hardware::HardwareReading;
use crate::model::{ManualOverrides, OutputRow, StageMap, StoreError};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Per-node status published after each tick.
pub type StatusMap = BTreeMap<String, NodeStatus>;

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// Operator-supplied stage overrides, re-read every tick.
pub trait OverrideSource {
    fn load(&self) -> Result<ManualOverrides, StoreError>;
}

/// Persisted stage per node; survives restarts.
pub trait StageStore {
    fn load(&self) -> Result<StageMap, StoreError>;
    fn save(&self, stages: &StageMap) -> Result<(), StoreError>;
}

/// The bounded live table.
pub trait TableStore {
    fn load(&self) -> Result<Vec<OutputRow>, StoreError>;
    fn save(&self, rows: &[OutputRow]) -> Result<(), StoreError>;
}

/// Latest reading from the hardware node.
pub trait HardwareFeed {
    fn latest(&self) -> Result<HardwareReading, StoreError>;
}

/// Receiver of the per-node status map.
pub trait StatusSink {
    fn publish(&self, status: &StatusMap) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// Table rotation
// ---------------------------------------------------------------------------

/// Appends `new_rows` and drops the oldest rows beyond `max_rows`.
pub fn append_rotate(existing: &mut Vec<OutputRow>, new_rows: &[OutputRow], max_rows: usize) {
    existing.extend_from_slice(new_rows);
    if existing.len() > max_rows {
        let excess = existing.len() - max_rows;
        existing.drain(..excess);
    }
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

/// Reads a whole file, mapping a missing file to `StoreError::NotFound`.
pub fn read_optional(path: &Path) -> Result<String, StoreError> {
    fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => StoreError::NotFound(path.display().to_string()),
        _ => StoreError::Io {
            path: path.display().to_string(),
            source,
        },
    })
}

/// Whole-file replace: write a sibling temp file, then rename it over the
/// target, so readers see either the old or the new version.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let io_err = |source: io::Error| StoreError::Io {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let mut file = fs::File::create(&tmp).map_err(io_err)?;
    file.write_all(contents).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    drop(file);

    fs::rename(&tmp, path).map_err(io_err)
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemoryState {
    overrides: ManualOverrides,
    stages: Option<StageMap>,
    rows: Vec<OutputRow>,
    hardware: Option<HardwareReading>,
    status: Option<StatusMap>,
    stage_saves: usize,
}

/// Shared in-memory implementation of every port. Clones share state, so a
/// test can hand one clone to the producer and inspect another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_overrides(&self, overrides: ManualOverrides) {
        self.lock().overrides = overrides;
    }

    pub fn clear_overrides(&self) {
        self.lock().overrides.clear();
    }

    pub fn set_hardware(&self, reading: Option<HardwareReading>) {
        self.lock().hardware = reading;
    }

    pub fn set_stages(&self, stages: StageMap) {
        self.lock().stages = Some(stages);
    }

    pub fn stages(&self) -> Option<StageMap> {
        self.lock().stages.clone()
    }

    pub fn stage_saves(&self) -> usize {
        self.lock().stage_saves
    }

    pub fn rows(&self) -> Vec<OutputRow> {
        self.lock().rows.clone()
    }

    pub fn status(&self) -> Option<StatusMap> {
        self.lock().status.clone()
    }
}

impl OverrideSource for MemoryStore {
    fn load(&self) -> Result<ManualOverrides, StoreError> {
        Ok(self.lock().overrides.clone())
    }
}

impl StageStore for MemoryStore {
    fn load(&self) -> Result<StageMap, StoreError> {
        self.lock()
            .stages
            .clone()
            .ok_or_else(|| StoreError::NotFound("memory:stages".to_string()))
    }

    fn save(&self, stages: &StageMap) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.stages = Some(stages.clone());
        state.stage_saves += 1;
        Ok(())
    }
}

impl TableStore for MemoryStore {
    fn load(&self) -> Result<Vec<OutputRow>, StoreError> {
        Ok(self.lock().rows.clone())
    }

    fn save(&self, rows: &[OutputRow]) -> Result<(), StoreError> {
        self.lock().rows = rows.to_vec();
        Ok(())
    }
}

impl HardwareFeed for MemoryStore {
    fn latest(&self) -> Result<HardwareReading, StoreError> {
        self.lock()
            .hardware
            .ok_or_else(|| StoreError::NotFound("memory:hardware".to_string()))
    }
}

impl StatusSink for MemoryStore {
    fn publish(&self, status: &StatusMap) -> Result<(), StoreError> {
        self.lock().status = Some(status.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        EnvironmentSample, RollingDeltas, Stage, Stage2Fields, Stage3Fields,
    };
    use chrono::{Duration, TimeZone, Utc};

    fn row(i: i64) -> OutputRow {
        OutputRow::new(
            Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap() + Duration::seconds(30 * i),
            "node1",
            30.205,
            78.005,
            &EnvironmentSample::default(),
            RollingDeltas::default(),
            Stage::Normal,
            Stage2Fields::default(),
            Stage3Fields::default(),
            i as f64,
            String::new(),
        )
        .expect("valid row")
    }

    #[test]
    fn test_append_rotate_under_limit_keeps_everything() {
        let mut table = vec![row(0), row(1)];
        append_rotate(&mut table, &[row(2)], 10);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_append_rotate_drops_oldest_first() {
        let mut table: Vec<OutputRow> = (0..5).map(row).collect();
        let new_rows: Vec<OutputRow> = (5..8).map(row).collect();
        append_rotate(&mut table, &new_rows, 4);
        let kept: Vec<f64> = table.iter().map(|r| r.risk_score).collect();
        assert_eq!(kept, vec![4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_append_rotate_batch_larger_than_limit() {
        let mut table = Vec::new();
        let new_rows: Vec<OutputRow> = (0..6).map(row).collect();
        append_rotate(&mut table, &new_rows, 2);
        let kept: Vec<f64> = table.iter().map(|r| r.risk_score).collect();
        assert_eq!(kept, vec![4.0, 5.0]);
    }

    #[test]
    fn test_memory_store_clones_share_state() {
        let store = MemoryStore::new();
        let handle = store.clone();
        TableStore::save(&store, &[row(1)]).expect("save");
        assert_eq!(handle.rows().len(), 1);
        assert!(matches!(StageStore::load(&handle), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_read_optional_missing_is_not_found() {
        let result = read_optional(Path::new("/nonexistent/manual_stage.json"));
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }
}
