#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! JSON-lines operational log for the fleet services.
//!
//! Every record carries the wall-clock timestamp and, when the simulated clock
//! is running, the simulated calendar date the record belongs to.

use std::{
    fs::{self, File},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Log severity level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Debug information.
    Debug,
    /// Informational events.
    Info,
    /// Recoverable anomaly.
    Warn,
    /// Failed operation.
    Error,
}

/// Structured log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// Wall-clock timestamp.
    pub timestamp: DateTime<Utc>,
    /// Simulated date the record refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sim_date: Option<NaiveDate>,
    /// Component emitting the log.
    pub module: String,
    /// Severity.
    pub level: LogLevel,
    /// Human-readable message.
    pub message: String,
    /// Structured fields.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl LogRecord {
    /// Creates a record with the provided info.
    #[must_use]
    pub fn new(module: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            sim_date: None,
            module: module.into(),
            level,
            message: message.into(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Stamps the record with a simulated date.
    #[must_use]
    pub const fn at_sim_date(mut self, date: Option<NaiveDate>) -> Self {
        self.sim_date = date;
        self
    }

    /// Replaces the metadata with the fields of a JSON object; other values are ignored.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = metadata {
            self.metadata = map;
        }
        self
    }

    /// Forwards the record to the active `tracing` subscriber.
    pub fn emit(&self) {
        let sim_date = self.sim_date.map(|d| d.to_string()).unwrap_or_default();
        let fields = serde_json::Value::Object(self.metadata.clone());
        match self.level {
            LogLevel::Debug => {
                tracing::debug!(module = %self.module, sim_date = %sim_date, %fields, "{}", self.message);
            }
            LogLevel::Info => {
                tracing::info!(module = %self.module, sim_date = %sim_date, %fields, "{}", self.message);
            }
            LogLevel::Warn => {
                tracing::warn!(module = %self.module, sim_date = %sim_date, %fields, "{}", self.message);
            }
            LogLevel::Error => {
                tracing::error!(module = %self.module, sim_date = %sim_date, %fields, "{}", self.message);
            }
        }
    }
}

/// Thread-safe JSON logger with append-only semantics.
#[derive(Debug)]
pub struct JsonLogger {
    path: PathBuf,
    writer: Mutex<File>,
}

impl JsonLogger {
    /// Creates or opens a logger at the desired path.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating log directory {}", parent.display()))?;
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        Ok(Self {
            path,
            writer: Mutex::new(file),
        })
    }

    /// Writes a log record as a JSON line.
    pub fn log(&self, record: &LogRecord) -> Result<()> {
        let mut writer = self.writer.lock();
        serde_json::to_writer(&mut *writer, record)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Returns the underlying file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Reads back every record of a JSON-lines log file, skipping blank lines.
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<LogRecord>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening log file {}", path.display()))?;
    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .with_context(|| format!("parsing line {} of {}", index + 1, path.display()))?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn writes_records_with_sim_date() {
        let dir = tempdir().unwrap();
        let logger = JsonLogger::new(dir.path().join("fleet.log")).unwrap();
        let date = NaiveDate::from_ymd_opt(2050, 1, 3).unwrap();
        logger
            .log(
                &LogRecord::new("autonomy", LogLevel::Info, "day processed")
                    .at_sim_date(Some(date))
                    .with_metadata(json!({ "plans": 2 })),
            )
            .unwrap();
        let content = fs::read_to_string(logger.path()).unwrap();
        assert!(content.contains("\"sim_date\":\"2050-01-03\""));
        assert!(content.contains("\"level\":\"INFO\""));

        let records = read_records(logger.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metadata["plans"], json!(2));
    }

    #[test]
    fn omits_sim_date_before_clock_starts() {
        let dir = tempdir().unwrap();
        let logger = JsonLogger::new(dir.path().join("nested/boot.log")).unwrap();
        logger
            .log(&LogRecord::new("bootstrap", LogLevel::Warn, "bank unreachable"))
            .unwrap();
        logger
            .log(&LogRecord::new("bootstrap", LogLevel::Error, "loan rejected"))
            .unwrap();
        let records = read_records(logger.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.sim_date.is_none()));
        assert_eq!(records[1].level, LogLevel::Error);
    }

    #[test]
    fn non_object_metadata_is_ignored() {
        let record = LogRecord::new("m", LogLevel::Debug, "x").with_metadata(json!([1, 2]));
        assert!(record.metadata.is_empty());
    }
}
