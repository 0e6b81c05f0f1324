//! Configuration: the persisted safety policy, env var overrides, and the
//! non-persisted filesystem locations the sweeper works with.

#![allow(missing_docs)]

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SweepError};
use crate::core::paths::home_dir;

/// Global safety and limits policy applied across all rules.
///
/// Serialized camelCase; the snake_case spellings written by older documents
/// are accepted on input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    /// Simulate every action without touching the filesystem.
    #[serde(alias = "dry_run")]
    pub dry_run: bool,
    /// When false, rules configured for quarantine hard-delete instead.
    #[serde(alias = "quarantine_enabled")]
    pub quarantine_enabled: bool,
    /// When false, symlinked entries are skipped during enumeration.
    #[serde(alias = "follow_symlinks")]
    pub follow_symlinks: bool,
    /// Cap on files enumerated per rule.
    #[serde(alias = "max_delete_per_rule")]
    pub max_delete_per_rule: usize,
    /// Cap on files acted upon across one clean run.
    #[serde(alias = "max_total_delete")]
    pub max_total_delete: usize,
    /// Forces every rule's action to recycle for the duration of a run.
    #[serde(alias = "hard_recycle_only")]
    pub hard_recycle_only: bool,
    /// Retention for activity logs, in days.
    #[serde(alias = "log_age_off_days")]
    pub log_age_off_days: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            quarantine_enabled: true,
            follow_symlinks: false,
            max_delete_per_rule: 50_000,
            max_total_delete: 200_000,
            hard_recycle_only: false,
            log_age_off_days: 30,
        }
    }
}

impl AppConfig {
    /// Apply `SWEEP_*` environment overrides on top of the loaded values.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_env_overrides_from(env_var)
    }

    fn apply_env_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        set_bool(&lookup, "SWEEP_DRY_RUN", &mut self.dry_run)?;
        set_bool(
            &lookup,
            "SWEEP_QUARANTINE_ENABLED",
            &mut self.quarantine_enabled,
        )?;
        set_bool(&lookup, "SWEEP_FOLLOW_SYMLINKS", &mut self.follow_symlinks)?;
        set_usize(
            &lookup,
            "SWEEP_MAX_DELETE_PER_RULE",
            &mut self.max_delete_per_rule,
        )?;
        set_usize(&lookup, "SWEEP_MAX_TOTAL_DELETE", &mut self.max_total_delete)?;
        set_bool(
            &lookup,
            "SWEEP_HARD_RECYCLE_ONLY",
            &mut self.hard_recycle_only,
        )?;
        Ok(())
    }

    /// Reject values no run could sensibly use.
    pub fn validate(&self) -> Result<()> {
        if self.log_age_off_days == 0 {
            return Err(SweepError::InvalidConfig {
                details: "logAgeOffDays must be >= 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Filesystem locations used by the sweeper. Not part of the persisted document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepPaths {
    /// `{config, rules}` JSON document.
    pub rules_file: PathBuf,
    /// Schedule-entry JSON document.
    pub schedule_file: PathBuf,
    /// Root of the per-rule quarantine folders.
    pub quarantine_dir: PathBuf,
    /// JSONL activity log.
    pub activity_log: PathBuf,
}

impl Default for SweepPaths {
    fn default() -> Self {
        Self::under_home(&home_dir())
    }
}

impl SweepPaths {
    /// Default layout rooted at a given home directory.
    pub fn under_home(home: &std::path::Path) -> Self {
        let cfg = home.join(".config").join("cache-sweeper");
        let data = home.join(".local").join("share").join("cache-sweeper");
        Self {
            rules_file: cfg.join("clean_rules.json"),
            schedule_file: cfg.join("schedules.json"),
            quarantine_dir: home.join(".cache_sweeper_quarantine"),
            activity_log: data.join("activity.jsonl"),
        }
    }

    /// Layout with every file kept inside one directory (portable installs, tests).
    pub fn in_dir(dir: &std::path::Path) -> Self {
        Self {
            rules_file: dir.join("clean_rules.json"),
            schedule_file: dir.join("schedules.json"),
            quarantine_dir: dir.join("quarantine"),
            activity_log: dir.join("logs").join("activity.jsonl"),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn set_usize<F>(lookup: &F, name: &str, slot: &mut usize) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = raw
            .trim()
            .parse::<usize>()
            .map_err(|error| SweepError::ConfigParse {
                context: "env",
                details: format!("{name}={raw:?}: {error}"),
            })?;
    }
    Ok(())
}

fn set_bool<F>(lookup: &F, name: &str, slot: &mut bool) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = parse_env_bool(name, &raw)?;
    }
    Ok(())
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(SweepError::ConfigParse {
            context: "env",
            details: format!("{name}={other:?}: expected a boolean"),
        }),
    }
}
