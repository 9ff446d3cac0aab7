//! Hardware node feed.
//!
//! The Raspberry Pi station appends one CSV row per reading to
//! `hardware_node0.csv`. Only the last row matters: it replaces the replayed
//! surface fields for the hardware-backed node. An absent, empty or
//! malformed feed is never fatal; the node falls back to replay.

use super::{parse_timestamp, CsvHeader};
use crate::model::{StoreError, SurfaceReading};
use crate::store::HardwareFeed;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

const REQUIRED_COLUMNS: [&str; 5] = ["temperature", "pressure", "humidity", "rainfall_mm", "wind_speed"];

/// Latest reading from the hardware node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HardwareReading {
    pub surface: SurfaceReading,
    /// When the station took the reading, if the feed records it.
    pub observed_at: Option<DateTime<Utc>>,
}

/// Parses the feed and returns its last data row.
pub fn parse_latest(csv: &str, origin: &str) -> Result<HardwareReading, StoreError> {
    let malformed = |reason: String| StoreError::Malformed {
        path: origin.to_string(),
        reason,
    };

    let mut lines = csv.lines().filter(|l| !l.trim().is_empty());
    let header = lines
        .next()
        .map(CsvHeader::parse)
        .ok_or_else(|| malformed("empty feed".to_string()))?;

    if let Some(missing) = REQUIRED_COLUMNS.iter().find(|c| !header.has(c)) {
        return Err(malformed(format!("missing column '{}'", missing)));
    }

    let last = lines
        .last()
        .ok_or_else(|| malformed("no readings".to_string()))?;
    let fields: Vec<&str> = last.split(',').collect();

    let value = |name: &str| {
        header
            .number(&fields, name)
            .ok_or_else(|| malformed(format!("missing or non-numeric {}", name)))
    };

    let surface = SurfaceReading {
        temperature: value("temperature")?,
        pressure: value("pressure")?,
        humidity: value("humidity")?,
        rainfall_mm: value("rainfall_mm")?,
        wind_speed: value("wind_speed")?,
    };

    Ok(HardwareReading {
        surface,
        observed_at: header.cell(&fields, "timestamp").and_then(parse_timestamp),
    })
}

/// File-backed hardware feed.
#[derive(Debug, Clone)]
pub struct CsvHardwareFeed {
    path: PathBuf,
}

impl CsvHardwareFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HardwareFeed for CsvHardwareFeed {
    fn latest(&self) -> Result<HardwareReading, StoreError> {
        let text = crate::store::read_optional(&self.path)?;
        parse_latest(&text, &self.path.display().to_string())
    }
}
