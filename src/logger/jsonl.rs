//! JSONL activity log: one JSON object per line, appended to a single file.
//!
//! If the file cannot be opened or written, lines go to stderr with a
//! `[CSW-JSONL]` prefix instead. Logging never fails a scan or clean.

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, LineWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SweepError};

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Event kinds written to the activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RuleScan,
    FileAction,
    RuleClean,
    CleanComplete,
    EmptyDirs,
    ScheduleFire,
    ScheduleSkip,
    Purge,
    RulesChange,
    Error,
}

/// A single JSONL log entry. Everything except `ts`, `event`, `severity` and
/// `message` is optional and omitted when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339 UTC timestamp, millisecond precision.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    /// Human-readable rendering of the event.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Number of files (or locations) involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    /// Bytes involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failures: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    /// CSW error code if the action failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            message: message.into(),
            rule: None,
            path: None,
            action: None,
            count: None,
            size: None,
            failures: None,
            dry_run: None,
            ok: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }
}

enum Sink {
    File(LineWriter<File>),
    Stderr,
}

/// Appends [`LogEntry`] lines to the activity log.
pub struct JsonlWriter {
    path: PathBuf,
    sink: Sink,
}

impl JsonlWriter {
    /// Open `path` for appending, creating parent directories as needed.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let sink = match open_append(&path) {
            Ok(file) => Sink::File(LineWriter::new(file)),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[CSW-JSONL] {e}; logging to stderr");
                Sink::Stderr
            }
        };
        Self { path, sink }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether lines still reach the log file.
    pub fn is_file_backed(&self) -> bool {
        matches!(self.sink, Sink::File(_))
    }

    /// Write one entry as a single line.
    pub fn write_entry(&mut self, entry: &LogEntry) {
        let mut line = match serde_json::to_string(entry) {
            Ok(json) => json,
            Err(e) => {
                let _ = writeln!(io::stderr(), "[CSW-JSONL] serialize error: {e}");
                return;
            }
        };
        line.push('\n');

        if let Sink::File(w) = &mut self.sink {
            match w.write_all(line.as_bytes()) {
                Ok(()) => return,
                Err(e) => {
                    let _ = writeln!(
                        io::stderr(),
                        "[CSW-JSONL] write to {} failed: {e}; logging to stderr",
                        self.path.display()
                    );
                    self.sink = Sink::Stderr;
                }
            }
        }
        let _ = write!(io::stderr(), "[CSW-JSONL] {line}");
    }

    /// Flush buffered output and sync the file to disk.
    pub fn finish(&mut self) {
        if let Sink::File(w) = &mut self.sink {
            let _ = w.flush();
            let _ = w.get_ref().sync_data();
        }
    }
}

fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| SweepError::io(parent, source))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| SweepError::io(path, source))
}

fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
