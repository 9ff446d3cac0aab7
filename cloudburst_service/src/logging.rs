/// Structured logging for the cloudburst service
///
/// Provides context-rich logging with component and node identifiers,
/// timestamps, and severity levels. Supports both console output
/// and file-based logging for daemon operations.

use crate::model::{StageMap, StoreError};
use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Replay,
    Hardware,
    Override,
    Stage,
    Table,
    Tick,
    System,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Replay => write!(f, "REPLAY"),
            Component::Hardware => write!(f, "HW"),
            Component::Override => write!(f, "OVERRIDE"),
            Component::Stage => write!(f, "STAGE"),
            Component::Table => write!(f, "TABLE"),
            Component::Tick => write!(f, "TICK"),
            Component::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - the optional input simply is not there
    Expected,
    /// Unexpected failure - indicates a permissions or disk problem
    Unexpected,
    /// Unknown - the input exists but could not be interpreted
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        let mut slot = LOGGER.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(logger);
    }

    fn log(&self, level: LogLevel, component: Component, node_id: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");

        let node_part = node_id.map(|s| format!(" [{}]", s)).unwrap_or_default();
        let log_entry = format!(
            "{} {} {}{}: {}",
            timestamp, level, component, node_part, message
        );

        if self.console_timestamps {
            match level {
                LogLevel::Error | LogLevel::Warning => eprintln!("{}", log_entry),
                LogLevel::Info | LogLevel::Debug => println!("{}", log_entry),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", component, node_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", component, node_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}{}: {}", component, node_part, message),
            }
        }

        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

fn emit(level: LogLevel, component: Component, node_id: Option<&str>, message: &str) {
    // Logging before init_logger is a no-op.
    let guard = LOGGER.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(logger) = guard.as_ref() {
        logger.log(level, component, node_id, message);
    }
}

/// Log a general informational message
pub fn info(component: Component, node_id: Option<&str>, message: &str) {
    emit(LogLevel::Info, component, node_id, message);
}

/// Log a warning message
pub fn warn(component: Component, node_id: Option<&str>, message: &str) {
    emit(LogLevel::Warning, component, node_id, message);
}

/// Log an error message
pub fn error(component: Component, node_id: Option<&str>, message: &str) {
    emit(LogLevel::Error, component, node_id, message);
}

/// Log a debug message
pub fn debug(component: Component, node_id: Option<&str>, message: &str) {
    emit(LogLevel::Debug, component, node_id, message);
}

// ---------------------------------------------------------------------------
// Input Failure Logging
// ---------------------------------------------------------------------------

/// Classify a failed read of an optional input (override file, hardware
/// feed, previous table).
pub fn classify_input_failure(err: &StoreError) -> FailureType {
    match err {
        StoreError::NotFound(_) => FailureType::Expected,
        StoreError::Malformed { .. } => FailureType::Unknown,
        StoreError::Io { .. } => FailureType::Unexpected,
    }
}

/// Log a transient input failure with automatic classification.
///
/// Missing optional files are routine and only show up at debug level.
pub fn log_input_failure(component: Component, operation: &str, err: &StoreError) {
    let failure_type = classify_input_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => debug(component, None, &message),
        FailureType::Unexpected => error(component, None, &message),
        FailureType::Unknown => warn(component, None, &message),
    }
}

// ---------------------------------------------------------------------------
// Tick Summary Logging
// ---------------------------------------------------------------------------

/// Formats a stage map compactly, e.g. `node0=1 node1=2`.
pub fn format_stages(stages: &StageMap) -> String {
    stages
        .iter()
        .map(|(node, stage)| format!("{}={}", node, stage))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Log the one-line summary written after every tick.
pub fn log_tick_summary(tick: u64, rows_written: usize, table_len: usize, stages: &StageMap) {
    let message = format!(
        "tick {}: wrote {} rows (table {}) | stages: {}",
        tick,
        rows_written,
        table_len,
        format_stages(stages)
    );

    if rows_written == 0 {
        warn(Component::Tick, None, &message);
    } else {
        info(Component::Tick, None, &message);
    }
}
