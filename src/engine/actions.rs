//! Act phase: apply each rule's effective action to its scanned files.
//!
//! Per-file failures are recorded and logged, never propagated. The only
//! things that end a run early are a stop request and the total cap.

#![allow(missing_docs)]

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{CleanerEngine, ScanResult};
use crate::core::errors::{Result, SweepError};
use crate::logger::activity::ActivityEvent;
use crate::rules::rule::RuleAction;

/// One file the engine could not act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionFailure {
    pub path: PathBuf,
    pub action: RuleAction,
    /// CSW error code.
    pub code: String,
    pub message: String,
}

/// Outcome of acting on one [`ScanResult`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActReport {
    pub rule: String,
    pub files_acted: usize,
    pub bytes_freed: u64,
    pub failures: Vec<ActionFailure>,
    /// A stop request ended the run.
    pub cancelled: bool,
    /// The run-wide total cap ended the run.
    pub cap_reached: bool,
    pub dry_run: bool,
}

impl ActReport {
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }
}

/// Outcome of a full clean run over several scan results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanSummary {
    pub reports: Vec<ActReport>,
    pub files_acted: usize,
    pub bytes_freed: u64,
    pub failures: usize,
    pub empty_dirs_removed: usize,
    pub cancelled: bool,
    pub cap_reached: bool,
    pub dry_run: bool,
}

impl CleanerEngine {
    /// Act on one scan result with the full `maxTotalDelete` budget.
    pub fn act(&self, scan: &ScanResult) -> ActReport {
        self.act_with_budget(scan, self.config.max_total_delete)
    }

    /// Act on every scan result in order, sharing one `maxTotalDelete` budget,
    /// and tidy up empty directories for rules that ask for it.
    pub fn act_all(&self, scans: &[ScanResult]) -> CleanSummary {
        let mut summary = CleanSummary {
            dry_run: self.config.dry_run,
            ..CleanSummary::default()
        };
        for scan in scans {
            if self.control.is_stopped() {
                summary.cancelled = true;
                break;
            }
            let budget = self
                .config
                .max_total_delete
                .saturating_sub(summary.files_acted);
            let report = self.act_with_budget(scan, budget);

            if scan.rule.remove_empty_dirs && !report.cancelled {
                let removed = self.cleanup_empty_directories(&scan.base);
                if removed > 0 {
                    self.log(ActivityEvent::EmptyDirsRemoved {
                        rule: scan.rule.name.clone(),
                        removed,
                    });
                }
                summary.empty_dirs_removed += removed;
            }

            summary.files_acted += report.files_acted;
            summary.bytes_freed += report.bytes_freed;
            summary.failures += report.failure_count();
            summary.cancelled |= report.cancelled;
            summary.cap_reached |= report.cap_reached;
            let stop_here = report.cancelled || report.cap_reached;
            summary.reports.push(report);
            if stop_here {
                break;
            }
        }

        self.log(ActivityEvent::CleanCompleted {
            rules: summary.reports.len(),
            files_acted: summary.files_acted,
            bytes_freed: summary.bytes_freed,
            failures: summary.failures,
            dry_run: summary.dry_run,
            cancelled: summary.cancelled,
        });
        summary
    }

    fn act_with_budget(&self, scan: &ScanResult, budget: usize) -> ActReport {
        let action = self.effective_action(&scan.rule);
        let dry_run = self.config.dry_run;
        let mut report = ActReport {
            rule: scan.rule.name.clone(),
            dry_run,
            ..ActReport::default()
        };

        for path in &scan.files {
            if !self.control.checkpoint() {
                report.cancelled = true;
                break;
            }
            if report.files_acted >= budget {
                report.cap_reached = true;
                break;
            }
            let size = file_size(path);
            let outcome = if dry_run {
                Ok(())
            } else {
                self.apply(action, scan, path)
            };
            match outcome {
                Ok(()) => {
                    report.files_acted += 1;
                    report.bytes_freed += size;
                }
                Err(err) => {
                    self.log(ActivityEvent::FileActionFailed {
                        rule: scan.rule.name.clone(),
                        path: path.display().to_string(),
                        action: action.to_string(),
                        error_code: err.code().to_string(),
                        error_message: err.to_string(),
                    });
                    report.failures.push(ActionFailure {
                        path: path.clone(),
                        action,
                        code: err.code().to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }

        self.log(ActivityEvent::RuleCleaned {
            rule: report.rule.clone(),
            files_acted: report.files_acted,
            bytes_freed: report.bytes_freed,
            failures: report.failure_count(),
            dry_run,
        });
        report
    }

    fn apply(&self, action: RuleAction, scan: &ScanResult, path: &Path) -> Result<()> {
        match action {
            RuleAction::Recycle => match &self.recycle_bin {
                Some(bin) => bin.recycle(path),
                None => delete_file(path),
            },
            RuleAction::Delete => delete_file(path),
            RuleAction::Quarantine => {
                let dest = self.quarantine_destination(scan, path);
                move_file(path, &dest)
            }
        }
    }

    /// `quarantineRoot/<rule>/<path relative to base>`, or the bare file name
    /// when `path` is not under the rule's base.
    pub fn quarantine_destination(&self, scan: &ScanResult, path: &Path) -> PathBuf {
        let relative = path
            .strip_prefix(&scan.base)
            .ok()
            .filter(|rel| !rel.as_os_str().is_empty())
            .map_or_else(
                || path.file_name().map(PathBuf::from).unwrap_or_default(),
                Path::to_path_buf,
            );
        self.quarantine_root
            .join(scan.rule.folder_name())
            .join(relative)
    }

    /// Remove directories under `base` left without entries, deepest first.
    /// `base` itself is kept. Returns the number removed; always 0 in dry-run.
    pub fn cleanup_empty_directories(&self, base: &Path) -> usize {
        if self.config.dry_run || !base.is_dir() {
            return 0;
        }

        // Pre-order listing; reversed, every directory follows its descendants.
        let mut ordered = Vec::new();
        let mut stack = vec![base.to_path_buf()];
        while let Some(dir) = stack.pop() {
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                if entry.file_type().is_ok_and(|t| t.is_dir()) {
                    stack.push(entry.path());
                }
            }
            ordered.push(dir);
        }

        let mut removed = 0;
        for dir in ordered.iter().skip(1).rev() {
            if !self.control.checkpoint() {
                break;
            }
            let is_empty = fs::read_dir(dir).is_ok_and(|mut it| it.next().is_none());
            if is_empty && fs::remove_dir(dir).is_ok() {
                removed += 1;
            }
        }
        removed
    }
}

fn file_size(path: &Path) -> u64 {
    fs::metadata(path)
        .or_else(|_| fs::symlink_metadata(path))
        .map(|m| m.len())
        .unwrap_or(0)
}

/// Remove a file, clearing a read-only attribute first.
fn delete_file(path: &Path) -> Result<()> {
    if let Ok(meta) = fs::symlink_metadata(path)
        && !meta.file_type().is_symlink()
        && meta.permissions().readonly()
    {
        let mut perms = meta.permissions();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt as _;
            perms.set_mode(perms.mode() | 0o200);
        }
        #[cfg(not(unix))]
        #[allow(clippy::permissions_set_readonly_false)]
        perms.set_readonly(false);
        let _ = fs::set_permissions(path, perms);
    }
    fs::remove_file(path).map_err(|e| SweepError::io(path, e))
}

/// Move a file, falling back to copy + remove across filesystems.
fn move_file(src: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| SweepError::io(parent, e))?;
    }
    match fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(SweepError::io(src, e)),
        Err(_) => {
            fs::copy(src, dest).map_err(|e| SweepError::io(src, e))?;
            fs::remove_file(src).map_err(|e| SweepError::io(src, e))
        }
    }
}
