//! Cleaner engine: enumerate files matching a rule, then act on them.
//!
//! A [`CleanerEngine`] is an explicit context object. It binds one
//! [`AppConfig`] snapshot to its own [`EngineControl`], quarantine root,
//! recycle facility and logger, so any number of engines can coexist.

pub mod actions;
pub mod control;
pub mod recycle;
pub mod walker;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::config::{AppConfig, SweepPaths};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::rules::rule::{Rule, RuleAction};

pub use actions::{ActReport, ActionFailure, CleanSummary};
pub use control::EngineControl;
pub use recycle::RecycleBin;

/// Files matched by one rule during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// Snapshot of the rule that produced this result.
    pub rule: Rule,
    /// Resolved base directory the files were found under.
    pub base: PathBuf,
    /// Matched files, in enumeration order.
    pub files: Vec<PathBuf>,
    /// Sum of file sizes at scan time; unreadable files count as 0.
    pub total_size: u64,
    /// Enumeration ended early because of a stop request.
    pub cancelled: bool,
}

impl ScanResult {
    pub fn empty(rule: &Rule, base: PathBuf) -> Self {
        Self {
            rule: rule.clone(),
            base,
            files: Vec::new(),
            total_size: 0,
            cancelled: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Scan-and-act engine bound to one config snapshot.
pub struct CleanerEngine {
    config: AppConfig,
    control: EngineControl,
    quarantine_root: PathBuf,
    recycle_bin: Option<Arc<dyn RecycleBin>>,
    logger: Option<ActivityLoggerHandle>,
}

impl CleanerEngine {
    /// Engine with the default quarantine root and the build's recycle facility.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            control: EngineControl::new(),
            quarantine_root: SweepPaths::default().quarantine_dir,
            recycle_bin: recycle::system_recycle_bin(),
            logger: None,
        }
    }

    #[must_use]
    pub fn with_quarantine_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.quarantine_root = root.into();
        self
    }

    /// Replace the recycle facility; `None` makes recycle degrade to delete.
    #[must_use]
    pub fn with_recycle_bin(mut self, bin: Option<Arc<dyn RecycleBin>>) -> Self {
        self.recycle_bin = bin;
        self
    }

    #[must_use]
    pub fn with_logger(mut self, logger: ActivityLoggerHandle) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Share externally owned stop/pause flags.
    #[must_use]
    pub fn with_control(mut self, control: EngineControl) -> Self {
        self.control = control;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn control(&self) -> &EngineControl {
        &self.control
    }

    pub fn quarantine_root(&self) -> &Path {
        &self.quarantine_root
    }

    pub fn has_recycle_bin(&self) -> bool {
        self.recycle_bin.is_some()
    }

    /// The action actually applied to a rule's files under this config.
    pub fn effective_action(&self, rule: &Rule) -> RuleAction {
        let configured = if self.config.hard_recycle_only {
            RuleAction::Recycle
        } else {
            rule.action
        };
        match configured {
            RuleAction::Recycle if self.recycle_bin.is_none() => RuleAction::Delete,
            RuleAction::Quarantine if !self.config.quarantine_enabled => RuleAction::Delete,
            other => other,
        }
    }

    fn log(&self, event: ActivityEvent) {
        if let Some(logger) = &self.logger {
            logger.send(event);
        }
    }
}

impl std::fmt::Debug for CleanerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanerEngine")
            .field("config", &self.config)
            .field("control", &self.control)
            .field("quarantine_root", &self.quarantine_root)
            .field("recycle_bin", &self.recycle_bin.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::Result;

    struct NoopBin;

    impl RecycleBin for NoopBin {
        fn recycle(&self, _path: &Path) -> Result<()> {
            Ok(())
        }
    }

    fn engine(config: AppConfig, bin: bool) -> CleanerEngine {
        let bin: Option<Arc<dyn RecycleBin>> = if bin { Some(Arc::new(NoopBin)) } else { None };
        CleanerEngine::new(config).with_recycle_bin(bin)
    }

    #[test]
    fn configured_action_is_kept_by_default() {
        let e = engine(AppConfig::default(), true);
        for action in RuleAction::ALL {
            let rule = Rule::new("R", "/r").with_action(action);
            assert_eq!(e.effective_action(&rule), action);
        }
    }

    #[test]
    fn hard_recycle_only_overrides_every_rule() {
        let cfg = AppConfig {
            hard_recycle_only: true,
            ..AppConfig::default()
        };
        let e = engine(cfg, true);
        let rule = Rule::new("R", "/r").with_action(RuleAction::Quarantine);
        assert_eq!(e.effective_action(&rule), RuleAction::Recycle);
    }

    #[test]
    fn recycle_without_facility_degrades_to_delete() {
        let cfg = AppConfig {
            hard_recycle_only: true,
            ..AppConfig::default()
        };
        let e = engine(cfg, false);
        let rule = Rule::new("R", "/r").with_action(RuleAction::Quarantine);
        assert_eq!(e.effective_action(&rule), RuleAction::Delete);
    }

    #[test]
    fn disabled_quarantine_degrades_to_delete() {
        let cfg = AppConfig {
            quarantine_enabled: false,
            ..AppConfig::default()
        };
        let e = engine(cfg, true);
        let rule = Rule::new("R", "/r");
        assert_eq!(e.effective_action(&rule), RuleAction::Delete);
    }

    #[test]
    fn engines_do_not_share_signals() {
        let a = engine(AppConfig::default(), false);
        let b = engine(AppConfig::default(), false);
        a.control().stop();
        assert!(!b.control().is_stopped());
    }
}
