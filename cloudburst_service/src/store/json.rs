//! JSON-file ports: manual overrides, stage state and node status.
//!
//! All three are small objects keyed by node id and rewritten whole.

use super::{read_optional, write_atomic, OverrideSource, StageStore, StatusMap, StatusSink};
use crate::model::{ManualOverrides, Stage, StageMap, StoreError};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

fn malformed(path: &Path, reason: impl ToString) -> StoreError {
    StoreError::Malformed {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

fn write_pretty<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let mut body = serde_json::to_vec_pretty(value).map_err(|e| malformed(path, e))?;
    body.push(b'\n');
    write_atomic(path, &body)
}

// ---------------------------------------------------------------------------
// Manual overrides
// ---------------------------------------------------------------------------

/// Accepts integers and numeric strings in {1, 2, 3}; anything else is
/// not an override.
pub fn normalize_override(value: &Value) -> Option<Stage> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|v| v.fract() == 0.0).map(|v| v as i64))
            .and_then(|v| Stage::try_from(v).ok()),
        Value::String(s) => s.parse::<Stage>().ok(),
        _ => None,
    }
}

/// Parses an override document. A non-object document is malformed;
/// individual bad entries are dropped.
pub fn parse_overrides(text: &str, path: &Path) -> Result<ManualOverrides, StoreError> {
    let doc: Value = serde_json::from_str(text).map_err(|e| malformed(path, e))?;
    let Value::Object(entries) = doc else {
        return Err(malformed(path, "expected a JSON object of node_id -> stage"));
    };
    Ok(entries
        .iter()
        .filter_map(|(node, value)| normalize_override(value).map(|stage| (node.clone(), stage)))
        .collect())
}

/// `manual_stage.json`, written by the dashboard or the `set-stage` command.
#[derive(Debug, Clone)]
pub struct JsonOverrideFile {
    path: PathBuf,
}

impl JsonOverrideFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_or_empty(&self) -> Result<ManualOverrides, StoreError> {
        match self.load() {
            Err(StoreError::NotFound(_)) => Ok(ManualOverrides::new()),
            other => other,
        }
    }

    /// Adds or replaces one node's override, keeping the others.
    pub fn set(&self, node_id: &str, stage: Stage) -> Result<ManualOverrides, StoreError> {
        let mut overrides = self.load_or_empty()?;
        overrides.insert(node_id.to_string(), stage);
        write_pretty(&self.path, &overrides)?;
        Ok(overrides)
    }

    /// Removes one node's override. Returns whether it was present.
    pub fn clear_node(&self, node_id: &str) -> Result<bool, StoreError> {
        let mut overrides = self.load_or_empty()?;
        let removed = overrides.remove(node_id).is_some();
        if removed {
            write_pretty(&self.path, &overrides)?;
        }
        Ok(removed)
    }

    /// Deletes the override file. Returns whether it existed.
    pub fn clear_all(&self) -> Result<bool, StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StoreError::Io {
                path: self.path.display().to_string(),
                source,
            }),
        }
    }
}

impl OverrideSource for JsonOverrideFile {
    fn load(&self) -> Result<ManualOverrides, StoreError> {
        let text = read_optional(&self.path)?;
        parse_overrides(&text, &self.path)
    }
}

// ---------------------------------------------------------------------------
// Stage state
// ---------------------------------------------------------------------------

/// `stage_state.json`: node id -> stage, overwritten every tick.
#[derive(Debug, Clone)]
pub struct JsonStageFile {
    path: PathBuf,
}

impl JsonStageFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StageStore for JsonStageFile {
    fn load(&self) -> Result<StageMap, StoreError> {
        let text = read_optional(&self.path)?;
        serde_json::from_str(&text).map_err(|e| malformed(&self.path, e))
    }

    fn save(&self, stages: &StageMap) -> Result<(), StoreError> {
        write_pretty(&self.path, stages)
    }
}

// ---------------------------------------------------------------------------
// Node status
// ---------------------------------------------------------------------------

/// `hardware_output.json`: node id -> {stage, risk, alert}, read by the
/// field hardware to drive its indicator.
#[derive(Debug, Clone)]
pub struct JsonStatusFile {
    path: PathBuf,
}

impl JsonStatusFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StatusSink for JsonStatusFile {
    fn publish(&self, status: &StatusMap) -> Result<(), StoreError> {
        write_pretty(&self.path, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::risk::NodeStatus;
    use serde_json::json;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "cloudburst-json-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn test_normalize_override_values() {
        assert_eq!(normalize_override(&json!(2)), Some(Stage::Watch));
        assert_eq!(normalize_override(&json!("3")), Some(Stage::Alert));
        assert_eq!(normalize_override(&json!(0)), None);
        assert_eq!(normalize_override(&json!(2.5)), None);
        assert_eq!(normalize_override(&json!(2.0)), Some(Stage::Watch));
        assert_eq!(normalize_override(&json!(3.0)), Some(Stage::Alert));
        assert_eq!(normalize_override(&json!(4.0)), None);
        assert_eq!(normalize_override(&json!(null)), None);
        assert_eq!(normalize_override(&json!("high")), None);
    }

    #[test]
    fn test_parse_overrides_drops_bad_entries() {
        let text = r#"{"node0": 2, "node1": "1", "node2": 9, "node3": [1]}"#;
        let overrides = parse_overrides(text, Path::new("manual_stage.json")).expect("valid");
        assert_eq!(overrides.len(), 2);
        assert_eq!(overrides["node0"], Stage::Watch);
        assert_eq!(overrides["node1"], Stage::Normal);
    }

    #[test]
    fn test_parse_overrides_rejects_non_object() {
        let path = Path::new("manual_stage.json");
        assert!(matches!(parse_overrides("[1,2]", path), Err(StoreError::Malformed { .. })));
        assert!(matches!(parse_overrides("{oops", path), Err(StoreError::Malformed { .. })));
    }

    #[test]
    fn test_override_file_set_and_clear() {
        let dir = temp_dir("override");
        let file = JsonOverrideFile::new(dir.join("manual_stage.json"));
        assert!(matches!(file.load(), Err(StoreError::NotFound(_))));

        file.set("node0", Stage::Alert).expect("set node0");
        let after = file.set("node2", Stage::Watch).expect("set node2");
        assert_eq!(after.len(), 2);
        assert_eq!(file.load().expect("load")["node0"], Stage::Alert);

        assert!(file.clear_node("node0").expect("clear node0"));
        assert!(!file.clear_node("node0").expect("clear again"));
        assert_eq!(file.load().expect("load").len(), 1);

        assert!(file.clear_all().expect("clear all"));
        assert!(!file.clear_all().expect("clear all again"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_stage_file_round_trip_and_corruption() {
        let dir = temp_dir("stage");
        let file = JsonStageFile::new(dir.join("stage_state.json"));

        let mut stages = StageMap::new();
        stages.insert("node0".to_string(), Stage::Watch);
        file.save(&stages).expect("save");
        assert_eq!(file.load().expect("load"), stages);
        assert!(!dir.join("stage_state.json.tmp").exists(), "temp file must be renamed away");

        fs::write(file.path(), "{\"node0\": 5}").expect("corrupt");
        assert!(matches!(file.load(), Err(StoreError::Malformed { .. })));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_status_file_shape() {
        let dir = temp_dir("status");
        let path = dir.join("hardware_output.json");
        let mut status = StatusMap::new();
        status.insert("node0".to_string(), NodeStatus::new(Stage::Alert, 91.0));
        JsonStatusFile::new(&path).publish(&status).expect("publish");

        let written: Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(written["node0"]["stage"], 3);
        assert_eq!(written["node0"]["alert"], "HIGH_RISK");
        let _ = fs::remove_dir_all(&dir);
    }
}
