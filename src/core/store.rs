//! Durable JSON persistence for `{config, rules}` and the schedule list.
//!
//! Both documents are replaced atomically: serialize, write `<file>.tmp`,
//! fsync, rename over the target. A failed save leaves the previous document
//! intact.

#![allow(missing_docs)]

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::config::{AppConfig, SweepPaths};
use crate::core::errors::{Result, SweepError};
use crate::daemon::schedule::ScheduleEntry;
use crate::rules::providers::default_rules;
use crate::rules::rule::Rule;

#[derive(Deserialize)]
struct RulesDocument {
    #[serde(default)]
    config: AppConfig,
    #[serde(default)]
    rules: Vec<Rule>,
}

#[derive(Serialize)]
struct RulesDocumentRef<'a> {
    config: &'a AppConfig,
    rules: &'a [Rule],
}

/// Loads and saves the rules document and the schedule document.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    rules_file: PathBuf,
    schedule_file: PathBuf,
}

impl ConfigStore {
    pub fn new(rules_file: impl Into<PathBuf>, schedule_file: impl Into<PathBuf>) -> Self {
        Self {
            rules_file: rules_file.into(),
            schedule_file: schedule_file.into(),
        }
    }

    pub fn from_paths(paths: &SweepPaths) -> Self {
        Self::new(&paths.rules_file, &paths.schedule_file)
    }

    pub fn rules_file(&self) -> &Path {
        &self.rules_file
    }

    pub fn schedule_file(&self) -> &Path {
        &self.schedule_file
    }

    /// Load config and rules. A missing document yields the default config
    /// and the built-in seeded rule set.
    pub fn load(&self) -> Result<(AppConfig, Vec<Rule>)> {
        self.load_with(default_rules)
    }

    /// Like [`load`](Self::load) with a caller-supplied seed for the missing-document case.
    pub fn load_with<F>(&self, seed: F) -> Result<(AppConfig, Vec<Rule>)>
    where
        F: FnOnce() -> Vec<Rule>,
    {
        let Some(raw) = read_optional(&self.rules_file)? else {
            return Ok((AppConfig::default(), seed()));
        };
        let doc: RulesDocument =
            serde_json::from_str(&raw).map_err(|e| SweepError::ConfigParse {
                context: "rules document",
                details: format!("{}: {e}", self.rules_file.display()),
            })?;
        Ok((doc.config, doc.rules))
    }

    /// Overwrite the rules document with `config` and `rules`.
    pub fn save(&self, config: &AppConfig, rules: &[Rule]) -> Result<()> {
        let json = serde_json::to_string_pretty(&RulesDocumentRef { config, rules })?;
        write_atomic(&self.rules_file, json.as_bytes())
    }

    /// Load the schedule list; a missing document is an empty list.
    pub fn load_schedules(&self) -> Result<Vec<ScheduleEntry>> {
        let Some(raw) = read_optional(&self.schedule_file)? else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&raw).map_err(|e| SweepError::ConfigParse {
            context: "schedule document",
            details: format!("{}: {e}", self.schedule_file.display()),
        })
    }

    pub fn save_schedules(&self, entries: &[ScheduleEntry]) -> Result<()> {
        let json = serde_json::to_string_pretty(entries)?;
        write_atomic(&self.schedule_file, json.as_bytes())
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SweepError::io(path, e)),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| SweepError::io(parent, e))?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let result = (|| {
        {
            let mut opts = OpenOptions::new();
            opts.write(true).create(true).truncate(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt as _;
                opts.mode(0o644);
            }
            let mut file = opts.open(&tmp_path)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)
    })();

    result.map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        SweepError::io(path, e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::schedule::ScheduledAction;
    use crate::rules::rule::RuleAction;

    fn store(dir: &Path) -> ConfigStore {
        ConfigStore::from_paths(&SweepPaths::in_dir(dir))
    }

    #[test]
    fn missing_document_yields_defaults_and_seed() {
        let dir = tempfile::tempdir().unwrap();
        let (cfg, rules) = store(dir.path())
            .load_with(|| vec![Rule::new("Seed", "/seed")])
            .unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name, "Seed");
    }

    #[test]
    fn default_seed_contains_temp_rule() {
        let dir = tempfile::tempdir().unwrap();
        let (_, rules) = store(dir.path()).load().unwrap();
        assert!(rules.iter().any(|r| r.name == "System TEMP"));
        assert!(rules.iter().any(|r| r.name == "Python __pycache__"));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        let cfg = AppConfig {
            dry_run: false,
            max_total_delete: 9,
            ..AppConfig::default()
        };
        let rules = vec![
            Rule::new("A", "~/a")
                .with_patterns(["*.tmp", "*.log"])
                .with_action(RuleAction::Delete),
            Rule::new("B", "/b").with_enabled(false),
        ];
        s.save(&cfg, &rules).unwrap();

        let (loaded_cfg, loaded_rules) = s.load().unwrap();
        assert_eq!(loaded_cfg, cfg);
        assert_eq!(loaded_rules, rules);
        assert!(!dir.path().join("clean_rules.json.tmp").exists());
    }

    #[test]
    fn document_uses_documented_keys() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        s.save(&AppConfig::default(), &[Rule::new("A", "/a")])
            .unwrap();
        let doc: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(s.rules_file()).unwrap()).unwrap();
        assert_eq!(doc["config"]["dryRun"], true);
        assert_eq!(doc["rules"][0]["path"], "/a");
        assert_eq!(doc["rules"][0]["minAgeDays"], 0);
        assert_eq!(doc["rules"][0]["action"], "quarantine");
    }

    #[test]
    fn present_but_empty_rule_list_is_not_reseeded() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        fs::write(s.rules_file(), r#"{"config": {"dryRun": false}}"#).unwrap();
        let (cfg, rules) = s.load().unwrap();
        assert!(!cfg.dry_run);
        assert!(rules.is_empty());
    }

    #[test]
    fn malformed_document_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        fs::write(s.rules_file(), "{ not json").unwrap();
        assert!(matches!(s.load(), Err(SweepError::ConfigParse { .. })));
    }

    #[test]
    fn failed_save_keeps_previous_document() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        s.save(&AppConfig::default(), &[Rule::new("Keep", "/k")])
            .unwrap();

        // A directory squatting on the temp name makes the write fail.
        fs::create_dir(dir.path().join("clean_rules.json.tmp")).unwrap();
        assert!(s.save(&AppConfig::default(), &[]).is_err());

        let (_, rules) = s.load().unwrap();
        assert_eq!(rules[0].name, "Keep");
    }

    #[test]
    fn schedules_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        assert!(s.load_schedules().unwrap().is_empty());

        let entries = vec![
            ScheduleEntry::new("Nightly", ScheduledAction::Clean, "02:30"),
            ScheduleEntry::new("Pip", ScheduledAction::PurgePip, "03:00"),
        ];
        s.save_schedules(&entries).unwrap();
        assert_eq!(s.load_schedules().unwrap(), entries);

        let raw = fs::read_to_string(s.schedule_file()).unwrap();
        assert!(raw.contains("\"purge_pip\""));
    }
}
