//! Replay of the pre-generated Stage-1 environment dataset.
//!
//! The live generator has no real radar or satellite feed, so every tick it
//! takes the next row of the Stage-1 dataset, wrapping around at the end.
//! Timestamps in the dataset are only used for ordering; output rows carry
//! the wall-clock time of the tick.

use super::{parse_timestamp, CsvHeader};
use crate::model::{CloudEnvironment, EnvironmentSample, ReplayError, SurfaceReading};
use chrono::{DateTime, Utc};
use std::path::Path;

/// Fixed, non-empty sequence of environment rows indexed cyclically.
#[derive(Debug, Clone)]
pub struct ReplayDataset {
    rows: Vec<EnvironmentSample>,
}

impl ReplayDataset {
    /// Wraps already-built rows. Returns `ReplayError::Empty` for no rows.
    pub fn from_rows(rows: Vec<EnvironmentSample>) -> Result<Self, ReplayError> {
        if rows.is_empty() {
            return Err(ReplayError::Empty);
        }
        Ok(Self { rows })
    }

    /// Loads the dataset from disk. A missing file is fatal for the service.
    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        if !path.exists() {
            return Err(ReplayError::Missing(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path).map_err(|source| ReplayError::Unreadable {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse_csv(&text)
    }

    /// Parses the dataset CSV. Missing columns and blank cells fall back to
    /// the surface defaults (cloud fields to 0). Rows are sorted by their
    /// timestamp when every row has a parseable one.
    pub fn parse_csv(csv: &str) -> Result<Self, ReplayError> {
        let mut lines = csv.lines().filter(|l| !l.trim().is_empty());
        let header = lines.next().map(CsvHeader::parse).ok_or(ReplayError::NoHeader)?;
        if !header.has("pressure") && !header.has("cloud_env_radar_dbz") {
            return Err(ReplayError::NoHeader);
        }

        let mut stamped: Vec<(Option<DateTime<Utc>>, EnvironmentSample)> = Vec::new();
        for line in lines {
            let fields: Vec<&str> = line.split(',').collect();
            let timestamp = header.cell(&fields, "timestamp").and_then(parse_timestamp);
            stamped.push((timestamp, parse_row(&header, &fields)));
        }

        if stamped.iter().all(|(ts, _)| ts.is_some()) {
            // Stable: rows sharing a timestamp keep file order.
            stamped.sort_by_key(|(ts, _)| *ts);
        }

        Self::from_rows(stamped.into_iter().map(|(_, row)| row).collect())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row for a tick: `tick mod len`, so the sequence repeats forever.
    pub fn row(&self, tick: u64) -> &EnvironmentSample {
        let index = (tick % self.rows.len() as u64) as usize;
        &self.rows[index]
    }
}

fn parse_row(header: &CsvHeader, fields: &[&str]) -> EnvironmentSample {
    let d = SurfaceReading::default();
    let surface = SurfaceReading {
        temperature: header.number_or(fields, "temperature", d.temperature),
        pressure: header.number_or(fields, "pressure", d.pressure),
        humidity: header.number_or(fields, "humidity", d.humidity),
        rainfall_mm: header.number_or(fields, "rainfall_mm", d.rainfall_mm),
        wind_speed: header.number_or(fields, "wind_speed", d.wind_speed),
    };
    let cloud = CloudEnvironment {
        pwv: header.number_or(fields, "cloud_env_pwv", 0.0),
        cloud_base: header.number_or(fields, "cloud_env_cloud_base", 0.0),
        radar_dbz: header.number_or(fields, "cloud_env_radar_dbz", 0.0),
        echo_top: header.number_or(fields, "cloud_env_echo_top", 0.0),
        lightning: header.number_or(fields, "cloud_env_lightning", 0.0),
        sat_bt: header.number_or(fields, "cloud_env_sat_bt", 0.0),
        ctc: header.number_or(fields, "cloud_env_ctc", 0.0),
        moisture_column: header.number_or(fields, "cloud_env_moisture_column", 0.0),
        convective_index: header.number_or(fields, "cloud_env_convective_index", 0.0),
    };
    EnvironmentSample {
        surface,
        cloud,
        burst_dbz_growth: header.number_or(fields, "burst_dbz_growth", 0.0),
    }
}
