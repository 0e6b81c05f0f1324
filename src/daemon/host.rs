//! Host core: owns the working rule set, the config, the latest scan results
//! and the worker threads that run scans, cleans and purges.
//!
//! Every `start_*` call returns as soon as its worker is spawned. At most one
//! scan or clean runs at a time; a start while either is alive is rejected
//! with [`SweepError::Busy`]. Each run gets a fresh [`CleanerEngine`] built
//! from a snapshot of the rules and config, so edits made while a worker runs
//! only affect the next run.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use crate::core::config::{AppConfig, SweepPaths};
use crate::core::errors::{Result, SweepError};
use crate::core::paths::home_dir;
use crate::core::store::ConfigStore;
use crate::daemon::schedule::{ScheduleEntry, ScheduledAction};
use crate::daemon::scheduler::ScheduleDispatcher;
use crate::engine::recycle::system_recycle_bin;
use crate::engine::{CleanSummary, CleanerEngine, EngineControl, RecycleBin, ScanResult};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::purge::{CommandRunner, PurgeReport, PurgeTool, SystemCommandRunner, purge_cache};
use crate::rules::providers::{OsFamily, merge_rules};
use crate::rules::rule::Rule;

/// Interval at which `shutdown`/`wait_idle` poll worker liveness.
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(20);

struct Worker {
    control: EngineControl,
    join: JoinHandle<()>,
}

impl Worker {
    fn is_alive(&self) -> bool {
        !self.join.is_finished()
    }
}

fn slot_alive(slot: &Option<Worker>) -> bool {
    slot.as_ref().is_some_and(Worker::is_alive)
}

/// Shared state behind the CLI and the scheduler daemon.
pub struct SweepHost {
    store: ConfigStore,
    config: RwLock<AppConfig>,
    env_overrides: bool,
    rules: RwLock<Vec<Rule>>,
    scan_results: Arc<RwLock<Vec<ScanResult>>>,
    last_clean: Arc<RwLock<Option<CleanSummary>>>,
    last_purges: Arc<Mutex<Vec<PurgeReport>>>,
    quarantine_root: PathBuf,
    recycle_bin: Option<Arc<dyn RecycleBin>>,
    logger: Option<ActivityLoggerHandle>,
    purge_runner: Arc<dyn CommandRunner>,
    family: OsFamily,
    home: PathBuf,
    // Lock order: `scan` before `clean`.
    scan: Mutex<Option<Worker>>,
    clean: Mutex<Option<Worker>>,
    purges: Mutex<Vec<JoinHandle<()>>>,
    paused: AtomicBool,
    dry_run_override: Mutex<Option<bool>>,
}

impl SweepHost {
    /// Host over an already-loaded config and rule set.
    pub fn new(store: ConfigStore, config: AppConfig, rules: Vec<Rule>) -> Self {
        Self {
            store,
            config: RwLock::new(config),
            env_overrides: false,
            rules: RwLock::new(rules),
            scan_results: Arc::new(RwLock::new(Vec::new())),
            last_clean: Arc::new(RwLock::new(None)),
            last_purges: Arc::new(Mutex::new(Vec::new())),
            quarantine_root: SweepPaths::default().quarantine_dir,
            recycle_bin: system_recycle_bin(),
            logger: None,
            purge_runner: Arc::new(SystemCommandRunner),
            family: OsFamily::current(),
            home: home_dir(),
            scan: Mutex::new(None),
            clean: Mutex::new(None),
            purges: Mutex::new(Vec::new()),
            paused: AtomicBool::new(false),
            dry_run_override: Mutex::new(None),
        }
    }

    /// Load config and rules from `paths` (seeding defaults when absent).
    /// `SWEEP_*` overrides apply to every run but are never saved.
    pub fn open(paths: &SweepPaths, logger: Option<ActivityLoggerHandle>) -> Result<Self> {
        let store = ConfigStore::from_paths(paths);
        let (config, rules) = store.load()?;
        config.validate()?;
        // Fail early on malformed overrides rather than on the first run.
        config.clone().apply_env_overrides()?;

        let mut host = Self::new(store, config, rules).with_quarantine_root(&paths.quarantine_dir);
        host.env_overrides = true;
        host.logger = logger;
        Ok(host)
    }

    #[must_use]
    pub fn with_quarantine_root(mut self, root: &Path) -> Self {
        self.quarantine_root = root.to_path_buf();
        self
    }

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

    /// Replace how purges run the package managers and where they look.
    #[must_use]
    pub fn with_purge_runner(
        mut self,
        runner: Arc<dyn CommandRunner>,
        family: OsFamily,
        home: impl Into<PathBuf>,
    ) -> Self {
        self.purge_runner = runner;
        self.family = family;
        self.home = home.into();
        self
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn quarantine_root(&self) -> &Path {
        &self.quarantine_root
    }

    // ──────────────────── config and rules ────────────────────

    /// The persisted config, without environment overrides.
    pub fn config(&self) -> AppConfig {
        self.config.read().clone()
    }

    /// The config a run would use right now.
    pub fn effective_config(&self) -> Result<AppConfig> {
        let mut config = self.config.read().clone();
        if self.env_overrides {
            config.apply_env_overrides()?;
        }
        if let Some(dry_run) = *self.dry_run_override.lock() {
            config.dry_run = dry_run;
        }
        Ok(config)
    }

    /// Force `dryRun` for later runs, ahead of env overrides. Not persisted.
    pub fn override_dry_run(&self, dry_run: Option<bool>) {
        *self.dry_run_override.lock() = dry_run;
    }

    pub fn set_config(&self, config: AppConfig) -> Result<()> {
        config.validate()?;
        *self.config.write() = config;
        Ok(())
    }

    pub fn rules(&self) -> Vec<Rule> {
        self.rules.read().clone()
    }

    /// Validate and append a rule. Names must be unique.
    pub fn add_rule(&self, rule: Rule) -> Result<()> {
        rule.validate()?;
        let mut rules = self.rules.write();
        if rules.iter().any(|r| r.name == rule.name) {
            return Err(duplicate_name(&rule.name));
        }
        self.log(ActivityEvent::RulesChanged {
            details: format!("added '{}'", rule.name),
        });
        rules.push(rule);
        Ok(())
    }

    /// Replace the rule at `index`.
    pub fn update_rule(&self, index: usize, rule: Rule) -> Result<()> {
        rule.validate()?;
        let mut rules = self.rules.write();
        check_index(index, rules.len())?;
        if rules
            .iter()
            .enumerate()
            .any(|(i, r)| i != index && r.name == rule.name)
        {
            return Err(duplicate_name(&rule.name));
        }
        self.log(ActivityEvent::RulesChanged {
            details: format!("updated '{}'", rule.name),
        });
        rules[index] = rule;
        Ok(())
    }

    pub fn delete_rule(&self, index: usize) -> Result<Rule> {
        let mut rules = self.rules.write();
        check_index(index, rules.len())?;
        let removed = rules.remove(index);
        self.log(ActivityEvent::RulesChanged {
            details: format!("deleted '{}'", removed.name),
        });
        Ok(removed)
    }

    /// Index of the rule called `name`.
    pub fn find_rule(&self, name: &str) -> Option<usize> {
        self.rules.read().iter().position(|r| r.name == name)
    }

    /// Append provider rules whose names are not taken. Returns how many were added.
    pub fn merge_rules(&self, incoming: Vec<Rule>) -> usize {
        let added = merge_rules(&mut self.rules.write(), incoming);
        if added > 0 {
            self.log(ActivityEvent::RulesChanged {
                details: format!("merged {added} rule(s)"),
            });
        }
        added
    }

    /// Persist the current config and rules.
    pub fn save(&self) -> Result<()> {
        let config = self.config.read();
        let rules = self.rules.read();
        self.store.save(&config, &rules)
    }

    /// Replace config and rules with what is on disk.
    pub fn reload(&self) -> Result<()> {
        let (config, rules) = self.store.load()?;
        config.validate()?;
        *self.config.write() = config;
        *self.rules.write() = rules;
        self.log(ActivityEvent::RulesChanged {
            details: "reloaded from disk".to_string(),
        });
        Ok(())
    }

    // ──────────────────── workers ────────────────────

    /// Start a scan of every rule. The previous results are replaced when it ends.
    pub fn start_scan(&self) -> Result<()> {
        let mut scan = self.scan.lock();
        ensure_idle(&scan, &self.clean.lock())?;
        if let Some(done) = scan.take() {
            let _ = done.join.join();
        }

        let engine = self.engine()?;
        let control = engine.control().clone();
        let rules = self.rules();
        let results = Arc::clone(&self.scan_results);
        let join = spawn_worker("csw-scan", move || {
            let found = engine.enumerate_all(&rules);
            *results.write() = found;
        })?;
        *scan = Some(Worker { control, join });
        Ok(())
    }

    /// Start acting on the latest scan results. Rejected when no scan has run.
    pub fn start_clean(&self) -> Result<()> {
        let scan = self.scan.lock();
        let mut clean = self.clean.lock();
        ensure_idle(&scan, &clean)?;
        drop(scan);

        let scans = self.scan_results.read().clone();
        if scans.is_empty() {
            return Err(SweepError::NothingToClean);
        }
        if let Some(done) = clean.take() {
            let _ = done.join.join();
        }

        let engine = self.engine()?;
        let control = engine.control().clone();
        let last_clean = Arc::clone(&self.last_clean);
        let join = spawn_worker("csw-clean", move || {
            let summary = engine.act_all(&scans);
            *last_clean.write() = Some(summary);
        })?;
        *clean = Some(Worker { control, join });
        Ok(())
    }

    /// Start a purge of `tool`'s cache. Purges are independent of scans and
    /// cleans and are not affected by pause or cancel.
    pub fn start_purge(&self, tool: PurgeTool) -> Result<()> {
        let runner = Arc::clone(&self.purge_runner);
        let family = self.family;
        let home = self.home.clone();
        let logger = self.logger.clone();
        let reports = Arc::clone(&self.last_purges);
        let join = spawn_worker("csw-purge", move || {
            let report = purge_cache(tool, runner.as_ref(), family, &home, logger.as_ref());
            reports.lock().push(report);
        })?;

        let mut purges = self.purges.lock();
        purges.retain(|h| !h.is_finished());
        purges.push(join);
        Ok(())
    }

    /// Pause or resume the running scan and clean. The state carries over
    /// to runs started later.
    pub fn pause(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
        for slot in [&self.scan, &self.clean] {
            if let Some(worker) = slot.lock().as_ref() {
                worker.control.set_paused(paused);
            }
        }
    }

    /// Ask the running scan and clean to stop at their next checkpoint.
    pub fn cancel(&self) {
        for slot in [&self.scan, &self.clean] {
            if let Some(worker) = slot.lock().as_ref() {
                worker.control.stop();
            }
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub fn is_scanning(&self) -> bool {
        slot_alive(&self.scan.lock())
    }

    pub fn is_cleaning(&self) -> bool {
        slot_alive(&self.clean.lock())
    }

    pub fn is_idle(&self) -> bool {
        !self.is_scanning()
            && !self.is_cleaning()
            && self.purges.lock().iter().all(JoinHandle::is_finished)
    }

    /// Wait up to `timeout` for every worker to finish. Returns `true` when idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_idle() {
                self.reap();
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(JOIN_POLL_INTERVAL);
        }
    }

    /// Cancel running work and join every worker within `timeout`.
    /// Workers still alive at the deadline are detached; returns `false` then.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        self.cancel();
        self.pause(false);
        let idle = self.wait_idle(timeout);
        if !idle {
            eprintln!("[CSW-HOST] workers still running after {timeout:?}; detaching");
        }
        idle
    }

    fn reap(&self) {
        for slot in [&self.scan, &self.clean] {
            let mut slot = slot.lock();
            if slot.as_ref().is_some_and(|w| !w.is_alive())
                && let Some(done) = slot.take()
            {
                let _ = done.join.join();
            }
        }
        let finished: Vec<JoinHandle<()>> = {
            let mut purges = self.purges.lock();
            let (done, running) = purges.drain(..).partition(JoinHandle::is_finished);
            *purges = running;
            done
        };
        for handle in finished {
            let _ = handle.join();
        }
    }

    // ──────────────────── results ────────────────────

    pub fn scan_results(&self) -> Vec<ScanResult> {
        self.scan_results.read().clone()
    }

    pub fn last_clean(&self) -> Option<CleanSummary> {
        self.last_clean.read().clone()
    }

    /// Purge reports collected since the last call.
    pub fn take_purge_reports(&self) -> Vec<PurgeReport> {
        std::mem::take(&mut *self.last_purges.lock())
    }

    fn engine(&self) -> Result<CleanerEngine> {
        let engine = CleanerEngine::new(self.effective_config()?)
            .with_quarantine_root(self.quarantine_root.clone())
            .with_recycle_bin(self.recycle_bin.clone());
        engine.control().set_paused(self.is_paused());
        Ok(match &self.logger {
            Some(logger) => engine.with_logger(logger.clone()),
            None => engine,
        })
    }

    fn log(&self, event: ActivityEvent) {
        if let Some(logger) = &self.logger {
            logger.send(event);
        }
    }
}

impl ScheduleDispatcher for SweepHost {
    fn dispatch(&self, entry: &ScheduleEntry) -> Result<()> {
        match entry.action {
            ScheduledAction::Scan => self.start_scan(),
            ScheduledAction::Clean => self.start_clean(),
            ScheduledAction::PurgePip => self.start_purge(PurgeTool::Pip),
            ScheduledAction::PurgeNpm => self.start_purge(PurgeTool::Npm),
        }
    }
}

impl std::fmt::Debug for SweepHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SweepHost")
            .field("store", &self.store)
            .field("rules", &self.rules.read().len())
            .field("scanning", &self.is_scanning())
            .field("cleaning", &self.is_cleaning())
            .finish_non_exhaustive()
    }
}

fn ensure_idle(scan: &Option<Worker>, clean: &Option<Worker>) -> Result<()> {
    if slot_alive(scan) {
        return Err(SweepError::Busy { operation: "scan" });
    }
    if slot_alive(clean) {
        return Err(SweepError::Busy { operation: "clean" });
    }
    Ok(())
}

fn spawn_worker<F>(name: &str, work: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(work)
        .map_err(|source| SweepError::Runtime {
            details: format!("failed to spawn {name} thread: {source}"),
        })
}

fn check_index(index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(SweepError::InvalidRule {
            name: format!("#{index}"),
            details: format!("no rule at index {index} ({len} total)"),
        })
    }
}

fn duplicate_name(name: &str) -> SweepError {
    SweepError::InvalidRule {
        name: name.to_string(),
        details: "a rule with this name already exists".to_string(),
    }
}
