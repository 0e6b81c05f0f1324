//! Enumeration phase: walk a rule's base directory once per pattern.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::fs::{self, DirEntry, Metadata};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use super::{CleanerEngine, ScanResult};
use crate::core::paths::resolve_absolute_path;
use crate::logger::activity::ActivityEvent;
use crate::rules::glob::RulePattern;
use crate::rules::rule::Rule;

const SECS_PER_DAY: u64 = 86_400;

/// Outcome of walking one pattern.
enum PatternWalk {
    Finished,
    CapReached,
    Stopped,
}

impl CleanerEngine {
    /// Enumerate the files `rule` currently matches.
    ///
    /// Never fails: a disabled rule, a missing base or an uncompilable pattern
    /// yields an empty result, and unreadable entries are skipped.
    pub fn enumerate(&self, rule: &Rule) -> ScanResult {
        if !rule.enabled {
            return ScanResult::empty(rule, PathBuf::from(&rule.path));
        }
        let base = rule.resolve_base();
        let mut result = ScanResult::empty(rule, base.clone());
        if self.config.max_delete_per_rule == 0 || !base.is_dir() {
            return result;
        }
        let patterns = match rule.compile_patterns() {
            Ok(p) => p,
            Err(e) => {
                self.log(ActivityEvent::Error {
                    code: e.code().to_string(),
                    message: e.to_string(),
                });
                return result;
            }
        };

        let cutoff = (rule.min_age_days > 0).then(|| {
            SystemTime::now()
                .checked_sub(Duration::from_secs(u64::from(rule.min_age_days) * SECS_PER_DAY))
                .unwrap_or(SystemTime::UNIX_EPOCH)
        });
        let mut seen = HashSet::new();

        for pattern in &patterns {
            match self.walk_pattern(&base, pattern, cutoff, &mut seen, &mut result) {
                PatternWalk::Finished => {}
                PatternWalk::CapReached => break,
                PatternWalk::Stopped => {
                    result.cancelled = true;
                    break;
                }
            }
        }

        self.log(ActivityEvent::RuleScanned {
            rule: rule.name.clone(),
            files: result.files.len(),
            total_bytes: result.total_size,
            cancelled: result.cancelled,
        });
        result
    }

    /// Enumerate every rule in order, stopping between rules on a stop request.
    ///
    /// A stop always leaves a `cancelled` result behind, so a partial scan is
    /// never mistaken for a complete one.
    pub fn enumerate_all(&self, rules: &[Rule]) -> Vec<ScanResult> {
        let mut results = Vec::with_capacity(rules.len());
        for rule in rules {
            if self.control.is_stopped() {
                // The first rule not reached marks the scan as cancelled.
                let mut skipped = ScanResult::empty(rule, rule.resolve_base());
                skipped.cancelled = true;
                results.push(skipped);
                break;
            }
            results.push(self.enumerate(rule));
        }
        results
    }

    fn walk_pattern(
        &self,
        base: &Path,
        pattern: &RulePattern,
        cutoff: Option<SystemTime>,
        seen: &mut HashSet<PathBuf>,
        result: &mut ScanResult,
    ) -> PatternWalk {
        let follow = self.config.follow_symlinks;
        // Never descend into the quarantine unless the rule targets it directly.
        let quarantine = resolve_absolute_path(&self.quarantine_root);
        let quarantine = (!base.starts_with(&quarantine)).then_some(quarantine);
        let in_quarantine = |dir: &Path| quarantine.as_ref().is_some_and(|q| dir.starts_with(q));
        let mut visited_dirs: HashSet<PathBuf> = HashSet::new();
        if follow && let Ok(canonical) = fs::canonicalize(base) {
            visited_dirs.insert(canonical);
        }
        let mut stack = vec![base.to_path_buf()];

        while let Some(dir) = stack.pop() {
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            let mut subdirs = Vec::new();
            for entry in entries.flatten() {
                if !self.control.checkpoint() {
                    return PatternWalk::Stopped;
                }
                let Some(meta) = entry_metadata(&entry, follow) else {
                    continue;
                };
                let path = entry.path();
                if meta.is_dir() {
                    if in_quarantine(&path) {
                        continue;
                    }
                    if follow {
                        // Symlinked directories can form cycles.
                        let Ok(canonical) = fs::canonicalize(&path) else {
                            continue;
                        };
                        if in_quarantine(&canonical) || !visited_dirs.insert(canonical) {
                            continue;
                        }
                    }
                    subdirs.push(path);
                    continue;
                }

                let Ok(relative) = path.strip_prefix(base) else {
                    continue;
                };
                if !pattern.matches(relative) {
                    continue;
                }
                if let Some(cutoff) = cutoff
                    && !meta.modified().is_ok_and(|mtime| mtime < cutoff)
                {
                    continue;
                }
                let key = if follow {
                    fs::canonicalize(&path).unwrap_or_else(|_| path.clone())
                } else {
                    path.clone()
                };
                if !seen.insert(key) {
                    continue;
                }

                result.total_size = result.total_size.saturating_add(meta.len());
                result.files.push(path);
                if result.files.len() >= self.config.max_delete_per_rule {
                    return PatternWalk::CapReached;
                }
            }
            // Reverse so the first listed subdirectory is walked first.
            stack.extend(subdirs.into_iter().rev());
        }
        PatternWalk::Finished
    }
}

/// Metadata for a directory entry, or `None` if it must be skipped.
///
/// Symlinks are dropped unless following is enabled, in which case the
/// target's metadata is returned (dangling links are dropped).
fn entry_metadata(entry: &DirEntry, follow_symlinks: bool) -> Option<Metadata> {
    let file_type = entry.file_type().ok()?;
    if file_type.is_symlink() {
        if !follow_symlinks {
            return None;
        }
        return fs::metadata(entry.path()).ok();
    }
    entry.metadata().ok()
}
