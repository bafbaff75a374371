//! Sample history logging
//!
//! A log sink durably appends `(device, timestamp, value)` records and can
//! hand back the most recent records for a device, newest first.

use super::sample::reading;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Log error types
#[derive(Error, Debug)]
pub enum LogError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV framing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// On-disk record format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// CSV with header
    #[default]
    Csv,
    /// JSON lines
    JsonLines,
}

impl LogFormat {
    /// Get file extension for format
    pub fn extension(&self) -> &'static str {
        match self {
            LogFormat::Csv => "csv",
            LogFormat::JsonLines => "jsonl",
        }
    }
}

/// CSV column names, in [`LogRecord`] field order
const CSV_HEADER: [&str; 3] = ["timestamp", "device_id", "value"];

/// A single history record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Sample time
    pub timestamp: DateTime<Utc>,
    /// Device identifier
    pub device_id: String,
    /// Sample value
    #[serde(with = "reading")]
    pub value: f64,
}

impl LogRecord {
    /// Create new record
    pub fn new(device_id: &str, timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            timestamp,
            device_id: device_id.to_string(),
            value,
        }
    }
}

/// Durable store for sample history
pub trait LogSink: Send + Sync {
    /// Append one record. Failures are logged, not returned.
    fn append(&self, device_id: &str, timestamp: DateTime<Utc>, value: f64);

    /// Up to `limit` most recent records for `device_id`, newest first
    fn query_history(&self, device_id: &str, limit: usize) -> Result<Vec<LogRecord>, LogError>;
}

/// Bounded in-memory history
#[derive(Debug)]
pub struct MemoryLog {
    records: Mutex<VecDeque<LogRecord>>,
    max_records: usize,
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new(10000)
    }
}

impl MemoryLog {
    /// Create a log holding at most `max_records` records
    pub fn new(max_records: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            max_records: max_records.max(1),
        }
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Is the log empty?
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Clear all records
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl LogSink for MemoryLog {
    fn append(&self, device_id: &str, timestamp: DateTime<Utc>, value: f64) {
        let mut records = self.records.lock();
        records.push_back(LogRecord::new(device_id, timestamp, value));
        while records.len() > self.max_records {
            records.pop_front();
        }
    }

    fn query_history(&self, device_id: &str, limit: usize) -> Result<Vec<LogRecord>, LogError> {
        Ok(self
            .records
            .lock()
            .iter()
            .rev()
            .filter(|r| r.device_id == device_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Append-only history file
#[derive(Debug)]
pub struct FileLog {
    path: PathBuf,
    format: LogFormat,
    file: Mutex<File>,
}

impl FileLog {
    /// Open (or create) a history file
    pub fn open(path: impl AsRef<Path>, format: LogFormat) -> Result<Self, LogError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        if format == LogFormat::Csv && file.metadata()?.len() == 0 {
            let mut writer = csv::Writer::from_writer(&file);
            writer.write_record(CSV_HEADER)?;
            writer.flush()?;
        }

        Ok(Self {
            path,
            format,
            file: Mutex::new(file),
        })
    }

    /// Get log path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get log format
    pub fn format(&self) -> LogFormat {
        self.format
    }

    fn write_record(&self, record: &LogRecord) -> Result<(), LogError> {
        let mut file = self.file.lock();
        match self.format {
            LogFormat::Csv => {
                let mut writer = csv::WriterBuilder::new()
                    .has_headers(false)
                    .from_writer(&mut *file);
                writer.serialize(record)?;
                writer.flush()?;
            }
            LogFormat::JsonLines => {
                let mut line = serde_json::to_vec(record).map_err(std::io::Error::from)?;
                line.push(b'\n');
                file.write_all(&line)?;
            }
        }
        Ok(())
    }

    fn read_csv(&self, device_id: &str, newest: &mut Newest) -> Result<(), LogError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)?;

        for row in reader.deserialize::<LogRecord>() {
            match row {
                Ok(record) if record.device_id == device_id => newest.push(record),
                Ok(_) => {}
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = e.position().map(|p| p.line()),
                    error = %e,
                    "skipping unreadable history record"
                ),
            }
        }
        Ok(())
    }

    fn read_json_lines(&self, device_id: &str, newest: &mut Newest) -> Result<(), LogError> {
        let reader = BufReader::new(File::open(&self.path)?);

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LogRecord>(&line) {
                Ok(record) if record.device_id == device_id => newest.push(record),
                Ok(_) => {}
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = index + 1,
                    error = %e,
                    "skipping unreadable history record"
                ),
            }
        }
        Ok(())
    }
}

impl LogSink for FileLog {
    fn append(&self, device_id: &str, timestamp: DateTime<Utc>, value: f64) {
        let record = LogRecord::new(device_id, timestamp, value);
        if let Err(e) = self.write_record(&record) {
            warn!(path = %self.path.display(), error = %e, "history append failed");
        }
    }

    fn query_history(&self, device_id: &str, limit: usize) -> Result<Vec<LogRecord>, LogError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut newest = Newest::new(limit);
        match self.format {
            LogFormat::Csv => self.read_csv(device_id, &mut newest)?,
            LogFormat::JsonLines => self.read_json_lines(device_id, &mut newest)?,
        }
        Ok(newest.into_newest_first())
    }
}

/// Keeps the last `limit` records of a forward scan
struct Newest {
    records: VecDeque<LogRecord>,
    limit: usize,
}

impl Newest {
    fn new(limit: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(limit.min(1024)),
            limit,
        }
    }

    fn push(&mut self, record: LogRecord) {
        if self.records.len() == self.limit {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    fn into_newest_first(self) -> Vec<LogRecord> {
        self.records.into_iter().rev().collect()
    }
}
