//! Activity logging: typed events, a non-blocking handle, and the logger thread.
//!
//! Architecture: a dedicated logger thread owns the `JsonlWriter`. Engine,
//! scheduler and purge code send `ActivityEvent`s through a bounded crossbeam
//! channel with `try_send()`, so a slow disk never stalls a scan or clean.

#![allow(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::config::SweepPaths;
use crate::core::errors::{Result, SweepError};
use crate::logger::jsonl::{EventType, JsonlWriter, LogEntry, Severity};

// ──────────────────── channel capacity ────────────────────

const CHANNEL_CAPACITY: usize = 1024;

// ──────────────────── public event type ────────────────────

/// Events emitted by the sweeper.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityEvent {
    RuleScanned {
        rule: String,
        files: usize,
        total_bytes: u64,
        cancelled: bool,
    },
    FileActionFailed {
        rule: String,
        path: String,
        action: String,
        error_code: String,
        error_message: String,
    },
    RuleCleaned {
        rule: String,
        files_acted: usize,
        bytes_freed: u64,
        failures: usize,
        dry_run: bool,
    },
    CleanCompleted {
        rules: usize,
        files_acted: usize,
        bytes_freed: u64,
        failures: usize,
        dry_run: bool,
        cancelled: bool,
    },
    EmptyDirsRemoved {
        rule: String,
        removed: usize,
    },
    ScheduleFired {
        name: String,
        action: String,
        time: String,
    },
    ScheduleSkipped {
        name: String,
        time: String,
        reason: String,
    },
    PurgeCompleted {
        tool: String,
        command_ok: bool,
        locations_cleaned: usize,
    },
    PurgeLocationFailed {
        tool: String,
        path: String,
        error_message: String,
    },
    RulesChanged {
        details: String,
    },
    Error {
        code: String,
        message: String,
    },
    /// Sentinel to request graceful shutdown of the logger thread.
    Shutdown,
}

impl ActivityEvent {
    /// One-line human rendering, used for console echo and the JSONL `message` field.
    pub fn message(&self) -> String {
        match self {
            Self::RuleScanned {
                rule,
                files,
                total_bytes,
                cancelled,
            } => {
                let suffix = if *cancelled { " (stopped early)" } else { "" };
                format!(
                    "[{rule}] scanned {files} file(s), {}{suffix}",
                    format_bytes(*total_bytes)
                )
            }
            Self::FileActionFailed {
                path,
                action,
                error_message,
                ..
            } => format!("Failed to {action}: {path} → {error_message}"),
            Self::RuleCleaned {
                rule,
                files_acted,
                bytes_freed,
                failures,
                dry_run,
            } => {
                let mode = if *dry_run { " [dry run]" } else { "" };
                format!(
                    "[{rule}] acted on {files_acted} file(s), freed {}, {failures} failure(s){mode}",
                    format_bytes(*bytes_freed)
                )
            }
            Self::CleanCompleted {
                rules,
                files_acted,
                bytes_freed,
                failures,
                dry_run,
                cancelled,
            } => {
                let mode = if *dry_run { " [dry run]" } else { "" };
                let stopped = if *cancelled { " (cancelled)" } else { "" };
                format!(
                    "Clean complete: {files_acted} file(s) across {rules} rule(s), freed {}, {failures} failure(s){mode}{stopped}",
                    format_bytes(*bytes_freed)
                )
            }
            Self::EmptyDirsRemoved { rule, removed } => {
                format!("[{rule}] removed {removed} empty director(ies)")
            }
            Self::ScheduleFired { name, action, time } => {
                format!("Schedule {name:?} fired {action} at {time}")
            }
            Self::ScheduleSkipped { name, time, reason } => {
                format!("Schedule {name:?} ({time}) skipped: {reason}")
            }
            Self::PurgeCompleted {
                tool,
                locations_cleaned,
                ..
            } => format!("{tool} cache: cleaned {locations_cleaned} location(s)"),
            Self::PurgeLocationFailed {
                tool,
                path,
                error_message,
            } => format!("{tool} cache: failed to remove {path} → {error_message}"),
            Self::RulesChanged { details } => format!("Rules changed: {details}"),
            Self::Error { code, message } => format!("{code}: {message}"),
            Self::Shutdown => "logger shutdown".to_string(),
        }
    }
}

/// Human-readable byte size using binary units.
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

// ──────────────────── public handle ────────────────────

/// Thread-safe, cheaply-cloneable handle for sending log events.
///
/// `send()` uses `try_send()` so callers are never blocked by logging
/// back-pressure.
#[derive(Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// Send an event to the logger thread. Non-blocking.
    ///
    /// If the channel is full the event is dropped and the dropped-events
    /// counter is incremented.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
        // Disconnected is fine during shutdown.
    }

    /// Number of events dropped due to channel back-pressure.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Ask the logger thread to flush and exit.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }

    /// A handle whose events land in the returned receiver instead of a file.
    pub fn capture(capacity: usize) -> (Self, Receiver<ActivityEvent>) {
        let (tx, rx) = bounded(capacity);
        (
            Self {
                tx,
                dropped_events: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }
}

impl std::fmt::Debug for ActivityLoggerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityLoggerHandle")
            .field("dropped_events", &self.dropped_events())
            .finish_non_exhaustive()
    }
}

// ──────────────────── configuration ────────────────────

/// Options for building the activity logger.
pub struct LoggerConfig {
    /// JSONL activity log file.
    pub log_path: PathBuf,
    pub channel_capacity: usize,
    /// Mirror each event's message to stderr.
    pub echo_stderr: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_path: SweepPaths::default().activity_log,
            channel_capacity: CHANNEL_CAPACITY,
            echo_stderr: false,
        }
    }
}

// ──────────────────── spawn ────────────────────

/// Spawn the logger thread and return a handle.
///
/// The thread runs until `handle.shutdown()` is called or all senders are
/// dropped.
pub fn spawn_logger(
    config: LoggerConfig,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<ActivityEvent>(config.channel_capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    let dropped_clone = Arc::clone(&dropped);

    let handle = ActivityLoggerHandle {
        tx,
        dropped_events: dropped,
    };

    let join = thread::Builder::new()
        .name("csw-logger".to_string())
        .spawn(move || {
            logger_thread_main(&rx, config.log_path, config.echo_stderr, &dropped_clone);
        })
        .map_err(|e| SweepError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

// ──────────────────── logger thread ────────────────────

fn logger_thread_main(
    rx: &Receiver<ActivityEvent>,
    log_path: PathBuf,
    echo_stderr: bool,
    dropped: &AtomicU64,
) {
    let mut jsonl = JsonlWriter::open(log_path);

    while let Ok(event) = rx.recv() {
        let d = dropped.swap(0, Ordering::Relaxed);
        if d > 0 {
            let mut warn = LogEntry::new(
                EventType::Error,
                Severity::Warning,
                format!("{d} log events dropped due to back-pressure"),
            );
            warn.count = Some(usize::try_from(d).unwrap_or(usize::MAX));
            jsonl.write_entry(&warn);
        }

        if matches!(event, ActivityEvent::Shutdown) {
            break;
        }

        if echo_stderr {
            eprintln!("{}", event.message());
        }
        if let Some(entry) = event_to_log_entry(&event) {
            jsonl.write_entry(&entry);
        }
    }

    jsonl.finish();
}

// ──────────────────── event conversion ────────────────────

fn event_to_log_entry(event: &ActivityEvent) -> Option<LogEntry> {
    let message = event.message();
    let entry = match event {
        ActivityEvent::RuleScanned {
            rule,
            files,
            total_bytes,
            cancelled,
        } => {
            let mut e = LogEntry::new(EventType::RuleScan, Severity::Info, message);
            e.rule = Some(rule.clone());
            e.count = Some(*files);
            e.size = Some(*total_bytes);
            e.ok = Some(!cancelled);
            e
        }
        ActivityEvent::FileActionFailed {
            rule,
            path,
            action,
            error_code,
            error_message,
        } => {
            let mut e = LogEntry::new(EventType::FileAction, Severity::Warning, message);
            e.rule = Some(rule.clone());
            e.path = Some(path.clone());
            e.action = Some(action.clone());
            e.ok = Some(false);
            e.error_code = Some(error_code.clone());
            e.error_message = Some(error_message.clone());
            e
        }
        ActivityEvent::RuleCleaned {
            rule,
            files_acted,
            bytes_freed,
            failures,
            dry_run,
        } => {
            let mut e = LogEntry::new(EventType::RuleClean, Severity::Info, message);
            e.rule = Some(rule.clone());
            e.count = Some(*files_acted);
            e.size = Some(*bytes_freed);
            e.failures = Some(*failures);
            e.dry_run = Some(*dry_run);
            e.ok = Some(*failures == 0);
            e
        }
        ActivityEvent::CleanCompleted {
            files_acted,
            bytes_freed,
            failures,
            dry_run,
            cancelled,
            ..
        } => {
            let mut e = LogEntry::new(EventType::CleanComplete, Severity::Info, message);
            e.count = Some(*files_acted);
            e.size = Some(*bytes_freed);
            e.failures = Some(*failures);
            e.dry_run = Some(*dry_run);
            e.ok = Some(!cancelled);
            e
        }
        ActivityEvent::EmptyDirsRemoved { rule, removed } => {
            let mut e = LogEntry::new(EventType::EmptyDirs, Severity::Info, message);
            e.rule = Some(rule.clone());
            e.count = Some(*removed);
            e
        }
        ActivityEvent::ScheduleFired { action, .. } => {
            let mut e = LogEntry::new(EventType::ScheduleFire, Severity::Info, message);
            e.action = Some(action.clone());
            e.ok = Some(true);
            e
        }
        ActivityEvent::ScheduleSkipped { reason, .. } => {
            let mut e = LogEntry::new(EventType::ScheduleSkip, Severity::Warning, message);
            e.details = Some(reason.clone());
            e.ok = Some(false);
            e
        }
        ActivityEvent::PurgeCompleted {
            tool,
            command_ok,
            locations_cleaned,
        } => {
            let mut e = LogEntry::new(EventType::Purge, Severity::Info, message);
            e.action = Some(format!("purge_{tool}"));
            e.count = Some(*locations_cleaned);
            e.ok = Some(*command_ok);
            e
        }
        ActivityEvent::PurgeLocationFailed {
            tool,
            path,
            error_message,
        } => {
            let mut e = LogEntry::new(EventType::Purge, Severity::Warning, message);
            e.action = Some(format!("purge_{tool}"));
            e.path = Some(path.clone());
            e.ok = Some(false);
            e.error_message = Some(error_message.clone());
            e
        }
        ActivityEvent::RulesChanged { details } => {
            let mut e = LogEntry::new(EventType::RulesChange, Severity::Info, message);
            e.details = Some(details.clone());
            e
        }
        ActivityEvent::Error { code, message: msg } => {
            let mut e = LogEntry::new(EventType::Error, Severity::Critical, message);
            e.error_code = Some(code.clone());
            e.error_message = Some(msg.clone());
            e.ok = Some(false);
            e
        }
        ActivityEvent::Shutdown => return None,
    };
    Some(entry)
}

// ──────────────────── tests ────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &std::path::Path, capacity: usize) -> LoggerConfig {
        LoggerConfig {
            log_path: dir.join("test.jsonl"),
            channel_capacity: capacity,
            echo_stderr: false,
        }
    }

    fn scanned(rule: &str) -> ActivityEvent {
        ActivityEvent::RuleScanned {
            rule: rule.to_string(),
            files: 2,
            total_bytes: 4096,
            cancelled: false,
        }
    }

    #[test]
    fn spawn_and_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, join) = spawn_logger(test_config(dir.path(), 64)).unwrap();
        handle.send(scanned("Temp"));
        handle.shutdown();
        join.join().unwrap();

        let contents = std::fs::read_to_string(dir.path().join("test.jsonl")).unwrap();
        assert!(contents.contains("rule_scan"));
        assert!(contents.contains("\"rule\":\"Temp\""));
    }

    #[test]
    fn events_from_cloned_handles_are_all_written() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, join) = spawn_logger(test_config(dir.path(), 64)).unwrap();
        let h2 = handle.clone();

        handle.send(scanned("A"));
        h2.send(ActivityEvent::FileActionFailed {
            rule: "A".to_string(),
            path: "/x/a.tmp".to_string(),
            action: "delete".to_string(),
            error_code: "CSW-3001".to_string(),
            error_message: "permission denied".to_string(),
        });
        handle.send(ActivityEvent::PurgeCompleted {
            tool: "pip".to_string(),
            command_ok: false,
            locations_cleaned: 1,
        });
        handle.shutdown();
        join.join().unwrap();

        let contents = std::fs::read_to_string(dir.path().join("test.jsonl")).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1]["error_code"], "CSW-3001");
        assert_eq!(lines[2]["message"], "pip cache: cleaned 1 location(s)");
    }

    #[test]
    fn capture_handle_receives_events() {
        let (handle, rx) = ActivityLoggerHandle::capture(4);
        handle.send(scanned("A"));
        assert_eq!(rx.try_recv().unwrap(), scanned("A"));
    }

    #[test]
    fn full_channel_counts_drops() {
        let (handle, _rx) = ActivityLoggerHandle::capture(1);
        handle.send(scanned("A"));
        handle.send(scanned("B"));
        handle.send(scanned("C"));
        assert_eq!(handle.dropped_events(), 2);
    }

    #[test]
    fn messages_are_human_readable() {
        assert_eq!(
            scanned("Temp").message(),
            "[Temp] scanned 2 file(s), 4.0 KB"
        );
        let failed = ActivityEvent::FileActionFailed {
            rule: "R".to_string(),
            path: "/x/a".to_string(),
            action: "quarantine".to_string(),
            error_code: "CSW-3002".to_string(),
            error_message: "gone".to_string(),
        };
        assert_eq!(failed.message(), "Failed to quarantine: /x/a → gone");
    }

    #[test]
    fn byte_formatting() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.0 GB");
    }
}
