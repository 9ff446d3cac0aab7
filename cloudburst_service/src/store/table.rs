//! The live CSV table (`live.csv`).
//!
//! One line per node per tick, oldest first. The dashboard and the predictor
//! read this file by column name, so the header order below is part of the
//! contract with them.

use super::{read_optional, write_atomic, TableStore};
use crate::ingest::{parse_timestamp, CsvHeader};
use crate::logging::{self, Component};
use crate::model::{
    CloudEnvironment, OutputRow, RollingDeltas, Stage, Stage2Fields, Stage3Fields, StoreError,
    SurfaceReading,
};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const COLUMNS: &[&str] = &[
    "timestamp",
    "node_id",
    "lat",
    "lon",
    "temperature",
    "pressure",
    "humidity",
    "rainfall_mm",
    "wind_speed",
    "pressure_drop_5",
    "pressure_drop_15",
    "humidity_change_15",
    "stage",
    "cloud_env_pwv",
    "cloud_env_cloud_base",
    "cloud_env_radar_dbz",
    "cloud_env_echo_top",
    "cloud_env_lightning",
    "cloud_env_sat_bt",
    "cloud_env_ctc",
    "cloud_env_moisture_column",
    "cloud_env_convective_index",
    "micro_lwc",
    "micro_droplet_size",
    "micro_vertical_wind",
    "micro_turbulence",
    "micro_moisture_gradient",
    "micro_temp_gradient",
    "burst_dbz_growth",
    "burst_updraft_surge",
    "burst_lightning_burst",
    "burst_lwc_spike",
    "burst_drop_collapse",
    "burst_rainfall_burst",
    "risk_score",
    "notes",
];

pub fn header_line() -> String {
    COLUMNS.join(",")
}

/// Notes are free text; keep them from breaking the comma-separated layout.
fn sanitize_notes(notes: &str) -> String {
    notes.replace([',', '\n', '\r'], ";")
}

/// Serialises one row in `COLUMNS` order.
pub fn format_row(row: &OutputRow) -> String {
    let s = &row.surface;
    let d = &row.deltas;
    let c = &row.cloud;
    let m = &row.stage2;
    let b = &row.stage3;

    let mut line = String::new();
    // write! into a String cannot fail.
    let _ = write!(
        line,
        "{},{},{:.4},{:.4},{:.4},{:.4},{:.4},{:.6},{:.4},{:.4},{:.4},{:.4},{},",
        row.timestamp.format(TIMESTAMP_FORMAT),
        row.node_id,
        row.lat,
        row.lon,
        s.temperature,
        s.pressure,
        s.humidity,
        s.rainfall_mm,
        s.wind_speed,
        d.pressure_drop_5,
        d.pressure_drop_15,
        d.humidity_change_15,
        row.stage,
    );
    let _ = write!(
        line,
        "{},{},{},{},{},{},{},{},{},",
        c.pwv,
        c.cloud_base,
        c.radar_dbz,
        c.echo_top,
        c.lightning,
        c.sat_bt,
        c.ctc,
        c.moisture_column,
        c.convective_index,
    );
    let _ = write!(
        line,
        "{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},",
        m.micro_lwc,
        m.micro_droplet_size,
        m.micro_vertical_wind,
        m.micro_turbulence,
        m.micro_moisture_gradient,
        m.micro_temp_gradient,
    );
    let _ = write!(
        line,
        "{:.4},{:.4},{},{:.4},{:.4},{:.4},{:.3},{}",
        b.burst_dbz_growth,
        b.burst_updraft_surge,
        b.burst_lightning_burst,
        b.burst_lwc_spike,
        b.burst_drop_collapse,
        b.burst_rainfall_burst,
        row.risk_score,
        sanitize_notes(&row.notes),
    );
    line
}

/// Parses one data line against the file's header. Returns a reason on
/// failure so the caller can log it.
pub fn parse_row(header: &CsvHeader, line: &str) -> Result<OutputRow, String> {
    let fields: Vec<&str> = line.split(',').collect();
    let num = |name: &str| {
        header
            .number(&fields, name)
            .ok_or_else(|| format!("missing or invalid {}", name))
    };

    let timestamp = header
        .cell(&fields, "timestamp")
        .and_then(parse_timestamp)
        .ok_or("missing or invalid timestamp")?;
    let node_id = header
        .cell(&fields, "node_id")
        .filter(|s| !s.is_empty())
        .ok_or("missing node_id")?;
    let stage = header
        .cell(&fields, "stage")
        .ok_or("missing stage")?
        .parse::<Stage>()
        .map_err(|e| e.to_string())?;

    let row = OutputRow {
        timestamp,
        node_id: node_id.to_string(),
        lat: num("lat")?,
        lon: num("lon")?,
        surface: SurfaceReading {
            temperature: num("temperature")?,
            pressure: num("pressure")?,
            humidity: num("humidity")?,
            rainfall_mm: num("rainfall_mm")?,
            wind_speed: num("wind_speed")?,
        },
        deltas: RollingDeltas {
            pressure_drop_5: num("pressure_drop_5")?,
            pressure_drop_15: num("pressure_drop_15")?,
            humidity_change_15: num("humidity_change_15")?,
        },
        stage,
        cloud: CloudEnvironment {
            pwv: num("cloud_env_pwv")?,
            cloud_base: num("cloud_env_cloud_base")?,
            radar_dbz: num("cloud_env_radar_dbz")?,
            echo_top: num("cloud_env_echo_top")?,
            lightning: num("cloud_env_lightning")?,
            sat_bt: num("cloud_env_sat_bt")?,
            ctc: num("cloud_env_ctc")?,
            moisture_column: num("cloud_env_moisture_column")?,
            convective_index: num("cloud_env_convective_index")?,
        },
        stage2: Stage2Fields {
            micro_lwc: num("micro_lwc")?,
            micro_droplet_size: num("micro_droplet_size")?,
            micro_vertical_wind: num("micro_vertical_wind")?,
            micro_turbulence: num("micro_turbulence")?,
            micro_moisture_gradient: num("micro_moisture_gradient")?,
            micro_temp_gradient: num("micro_temp_gradient")?,
        },
        stage3: Stage3Fields {
            burst_dbz_growth: num("burst_dbz_growth")?,
            burst_updraft_surge: num("burst_updraft_surge")?,
            burst_lightning_burst: num("burst_lightning_burst")?.max(0.0) as u32,
            burst_lwc_spike: num("burst_lwc_spike")?,
            burst_drop_collapse: num("burst_drop_collapse")?,
            burst_rainfall_burst: num("burst_rainfall_burst")?,
        },
        risk_score: num("risk_score")?,
        notes: header.cell(&fields, "notes").unwrap_or_default().to_string(),
    };
    row.validate().map_err(|e| e.to_string())?;
    Ok(row)
}

/// Parses a whole table. Lines that do not parse are skipped and counted.
pub fn parse_table(text: &str) -> (Vec<OutputRow>, usize) {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let Some(header) = lines.next().map(CsvHeader::parse) else {
        return (Vec::new(), 0);
    };

    let mut rows = Vec::new();
    let mut skipped = 0;
    for line in lines {
        match parse_row(&header, line) {
            Ok(row) => rows.push(row),
            Err(reason) => {
                skipped += 1;
                logging::debug(Component::Table, None, &format!("skipping table line: {}", reason));
            }
        }
    }
    (rows, skipped)
}

pub fn render_table(rows: &[OutputRow]) -> String {
    let mut out = header_line();
    out.push('\n');
    for row in rows {
        out.push_str(&format_row(row));
        out.push('\n');
    }
    out
}

/// Rows of the most recent tick, i.e. the trailing rows sharing the last
/// timestamp.
pub fn latest_tick(rows: &[OutputRow]) -> &[OutputRow] {
    let Some(last) = rows.last() else {
        return rows;
    };
    let start = rows
        .iter()
        .rposition(|r| r.timestamp != last.timestamp)
        .map_or(0, |i| i + 1);
    &rows[start..]
}

/// File-backed live table.
#[derive(Debug, Clone)]
pub struct CsvTableFile {
    path: PathBuf,
}

impl CsvTableFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TableStore for CsvTableFile {
    fn load(&self) -> Result<Vec<OutputRow>, StoreError> {
        let text = read_optional(&self.path)?;
        let (rows, skipped) = parse_table(&text);
        if skipped > 0 {
            logging::warn(
                Component::Table,
                None,
                &format!("{}: skipped {} unreadable rows", self.path.display(), skipped),
            );
        }
        Ok(rows)
    }

    fn save(&self, rows: &[OutputRow]) -> Result<(), StoreError> {
        write_atomic(&self.path, render_table(rows).as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{override_note, EnvironmentSample};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn ts(i: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 14, 0, 0).unwrap() + Duration::seconds(30 * i)
    }

    fn row(node: &str, i: i64, stage: Stage, notes: String) -> OutputRow {
        let env = EnvironmentSample {
            cloud: CloudEnvironment {
                radar_dbz: 47.25,
                pwv: 65.1,
                ..CloudEnvironment::default()
            },
            ..EnvironmentSample::default()
        };
        OutputRow::new(
            ts(i),
            node,
            30.2,
            78.0,
            &env,
            RollingDeltas {
                pressure_drop_5: -2.25,
                pressure_drop_15: -3.5,
                humidity_change_15: 8.75,
            },
            stage,
            Stage2Fields {
                micro_lwc: 0.75,
                ..Stage2Fields::default()
            },
            Stage3Fields {
                burst_lightning_burst: 4,
                ..Stage3Fields::default()
            },
            62.5,
            notes,
        )
        .expect("valid row")
    }

    #[test]
    fn test_header_has_one_column_per_field() {
        let line = format_row(&row("node0", 0, Stage::Watch, String::new()));
        assert_eq!(line.split(',').count(), COLUMNS.len());
    }

    #[test]
    fn test_parsed_row_matches_written_row() {
        let original = row("node2", 3, Stage::Watch, override_note(Stage::Watch));
        let text = render_table(std::slice::from_ref(&original));
        let (rows, skipped) = parse_table(&text);
        assert_eq!(skipped, 0);
        assert_eq!(rows.len(), 1);
        let parsed = &rows[0];
        assert_eq!(parsed.timestamp, original.timestamp);
        assert_eq!(parsed.node_id, "node2");
        assert_eq!(parsed.stage, Stage::Watch);
        assert_eq!(parsed.deltas, original.deltas);
        assert_eq!(parsed.cloud.radar_dbz, 47.25);
        assert_eq!(parsed.stage3.burst_lightning_burst, 4);
        assert_eq!(parsed.notes, "manual_override:2");
    }

    #[test]
    fn test_notes_cannot_break_columns() {
        let line = format_row(&row("node0", 0, Stage::Normal, "a,b\nc".to_string()));
        assert_eq!(line.split(',').count(), COLUMNS.len());
        assert!(line.ends_with("a;b;c"));
    }

    #[test]
    fn test_bad_lines_are_skipped() {
        let good = format_row(&row("node1", 0, Stage::Normal, String::new()));
        let text = format!(
            "{}\n{}\ngarbage,line\n{}\n",
            header_line(),
            good,
            good.replacen(",1,", ",7,", 1)
        );
        let (rows, skipped) = parse_table(&text);
        assert_eq!(rows.len(), 1);
        assert_eq!(skipped, 2);
    }

    #[test]
    fn test_columns_are_read_by_name() {
        let text = "node_id,timestamp,stage,lat,lon\nnode1,2025-07-01 14:00:00,1,30.2,78.0\n";
        // Too few columns for a full row, so it is skipped rather than misread.
        let (rows, skipped) = parse_table(text);
        assert!(rows.is_empty());
        assert_eq!(skipped, 1);
    }

    #[test]
    fn test_latest_tick_returns_trailing_rows() {
        let rows = vec![
            row("node0", 0, Stage::Normal, String::new()),
            row("node1", 0, Stage::Normal, String::new()),
            row("node0", 1, Stage::Watch, String::new()),
            row("node1", 1, Stage::Normal, String::new()),
        ];
        let latest = latest_tick(&rows);
        assert_eq!(latest.len(), 2);
        assert!(latest.iter().all(|r| r.timestamp == ts(1)));
        assert!(latest_tick(&[]).is_empty());
        assert_eq!(latest_tick(&rows[..2]).len(), 2);
    }
}
