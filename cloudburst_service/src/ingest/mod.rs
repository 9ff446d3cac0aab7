//! Input sources for the live generator.
//!
//! - `replay`   — the pre-generated Stage-1 environment dataset, replayed cyclically.
//! - `hardware` — the latest reading pushed by the hardware node.
//!
//! Both are flat CSV files with a header row. The helpers below do the
//! column lookup and lenient cell parsing they share with the live table.

pub mod hardware;
pub mod replay;

use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::HashMap;

/// Timestamp layouts seen in the data directory: the Stage-1 generator
/// writes day-first, the live table and hardware writer write ISO order.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%d-%m-%Y %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d-%m-%Y %H:%M",
];

/// Column name → index for one CSV header line.
#[derive(Debug, Clone)]
pub struct CsvHeader {
    columns: HashMap<String, usize>,
}

impl CsvHeader {
    pub fn parse(line: &str) -> Self {
        let columns = line
            .split(',')
            .enumerate()
            .map(|(i, name)| (name.trim().trim_matches('"').to_string(), i))
            .collect();
        Self { columns }
    }

    pub fn has(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Raw cell for `name`, if the column exists and the row is long enough.
    pub fn cell<'a>(&self, fields: &[&'a str], name: &str) -> Option<&'a str> {
        self.columns
            .get(name)
            .and_then(|&i| fields.get(i))
            .map(|s| s.trim().trim_matches('"'))
    }

    /// Numeric cell; empty, "null", "nan" and unparsable cells are `None`.
    pub fn number(&self, fields: &[&str], name: &str) -> Option<f64> {
        self.cell(fields, name).and_then(parse_field)
    }

    pub fn number_or(&self, fields: &[&str], name: &str, default: f64) -> f64 {
        self.number(fields, name).unwrap_or(default)
    }
}

/// Helper to parse values that might be "null" or empty.
pub fn parse_field(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("null") || s.eq_ignore_ascii_case("nan") {
        None
    } else {
        s.parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

/// Parses a timestamp in any of the layouts the data directory uses,
/// including RFC 3339. Naive timestamps are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}
