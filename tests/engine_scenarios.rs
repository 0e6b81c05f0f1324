//! End-to-end engine scenarios: enumerate then act against real directories.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use filetime::FileTime;

use cache_sweeper::core::config::AppConfig;
use cache_sweeper::core::errors::Result;
use cache_sweeper::engine::{CleanerEngine, EngineControl, RecycleBin};
use cache_sweeper::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use cache_sweeper::rules::rule::{Rule, RuleAction};

const DAY: u64 = 86_400;

fn write_aged(path: &Path, contents: &[u8], age_secs: u64) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
    let mtime = SystemTime::now() - Duration::from_secs(age_secs);
    filetime::set_file_mtime(path, FileTime::from_system_time(mtime)).unwrap();
}

fn live_config() -> AppConfig {
    AppConfig {
        dry_run: false,
        ..AppConfig::default()
    }
}

fn engine(config: AppConfig, quarantine: &Path) -> CleanerEngine {
    CleanerEngine::new(config)
        .with_quarantine_root(quarantine)
        .with_recycle_bin(None)
}

/// Relative path → contents for every file under `root`.
fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut out = BTreeMap::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).unwrap().flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_path_buf();
                out.insert(rel, fs::read(&path).unwrap());
            }
        }
    }
    out
}

#[test]
fn temp_rule_deletes_only_old_matches() {
    let sandbox = tempfile::tempdir().unwrap();
    let base = sandbox.path().join("x");
    write_aged(&base.join("a.tmp"), b"old", 2 * DAY);
    write_aged(&base.join("b.tmp"), b"new", 0);

    let rule = Rule::new("Temp", base.display().to_string())
        .with_patterns(["*.tmp"])
        .with_min_age_days(1)
        .with_action(RuleAction::Delete);
    let e = engine(live_config(), &sandbox.path().join("q"));

    let scan = e.enumerate(&rule);
    let names: Vec<_> = scan.files.iter().filter_map(|p| p.file_name()).collect();
    assert_eq!(names, ["a.tmp"]);

    let report = e.act(&scan);
    assert_eq!(report.files_acted, 1);
    assert_eq!(report.bytes_freed, 3);
    assert!(report.failures.is_empty());
    assert!(!base.join("a.tmp").exists());
    assert!(base.join("b.tmp").exists());
}

#[test]
fn quarantine_preserves_relative_layout() {
    let sandbox = tempfile::tempdir().unwrap();
    let base = sandbox.path().join("base");
    let quarantine = sandbox.path().join("quarantine");
    write_aged(&base.join("sub/a.txt"), b"payload", 0);

    let rule = Rule::new("R", base.display().to_string());
    let e = engine(live_config(), &quarantine);
    let scan = e.enumerate(&rule);
    let report = e.act(&scan);

    assert_eq!(report.files_acted, 1);
    assert!(!base.join("sub/a.txt").exists());
    assert_eq!(
        fs::read(quarantine.join("R/sub/a.txt")).unwrap(),
        b"payload"
    );
}

#[test]
fn dry_run_leaves_filesystem_byte_for_byte_unchanged() {
    let sandbox = tempfile::tempdir().unwrap();
    let base = sandbox.path().join("base");
    for (i, name) in ["a.tmp", "b.log", "nested/c.tmp", "nested/deeper/d.bin"]
        .iter()
        .enumerate()
    {
        write_aged(&base.join(name), name.as_bytes(), (i as u64) * DAY);
    }
    fs::create_dir_all(base.join("empty")).unwrap();
    let before = snapshot(sandbox.path());

    for action in RuleAction::ALL {
        let rule = Rule::new("All", base.display().to_string()).with_action(action);
        let e = engine(AppConfig::default(), &sandbox.path().join("q"));
        let summary = e.act_all(&[e.enumerate(&rule)]);
        assert!(summary.dry_run);
        assert_eq!(summary.files_acted, 4, "{action}");
        assert_eq!(summary.empty_dirs_removed, 0);
    }

    assert_eq!(snapshot(sandbox.path()), before);
    assert!(base.join("empty").is_dir());
    assert!(!sandbox.path().join("q").exists());
}

#[test]
fn per_rule_cap_limits_enumeration() {
    let sandbox = tempfile::tempdir().unwrap();
    for i in 0..10 {
        write_aged(&sandbox.path().join(format!("f{i}.tmp")), b"x", 0);
    }
    let config = AppConfig {
        max_delete_per_rule: 3,
        ..AppConfig::default()
    };
    let rule = Rule::new("Cap", sandbox.path().display().to_string());
    let scan = engine(config, &sandbox.path().join("q")).enumerate(&rule);
    assert_eq!(scan.files.len(), 3);
    assert_eq!(scan.total_size, 3);
}

#[test]
fn stop_during_enumeration_returns_promptly() {
    let sandbox = tempfile::tempdir().unwrap();
    let base = sandbox.path().join("many");
    for i in 0..1000 {
        write_aged(&base.join(format!("d{}/f{i}.tmp", i % 10)), b"x", 0);
    }
    let rule = Rule::new("Many", base.display().to_string());
    let control = EngineControl::new();
    let e = engine(AppConfig::default(), &sandbox.path().join("q")).with_control(control.clone());

    let result = thread::scope(|s| {
        let worker = s.spawn(|| e.enumerate(&rule));
        // The ten top-level directories pass first, then files.
        let deadline = Instant::now() + Duration::from_secs(10);
        while control.progress() < 20 && Instant::now() < deadline {
            std::hint::spin_loop();
        }
        control.stop();
        let stopped_at = Instant::now();
        let result = worker.join().unwrap();
        assert!(stopped_at.elapsed() < Duration::from_secs(2));
        result
    });

    assert!(result.cancelled);
    assert!(!result.files.is_empty());
    assert!(result.files.len() < 1000, "{} files", result.files.len());
}

#[test]
fn disabled_rule_scans_nothing() {
    let sandbox = tempfile::tempdir().unwrap();
    write_aged(&sandbox.path().join("a.tmp"), b"x", 0);
    let rule = Rule::new("Off", sandbox.path().display().to_string()).with_enabled(false);
    let scan = engine(AppConfig::default(), &sandbox.path().join("q")).enumerate(&rule);
    assert!(scan.is_empty());
    assert_eq!(scan.total_size, 0);
}

#[test]
fn total_cap_is_shared_across_rules() {
    let sandbox = tempfile::tempdir().unwrap();
    let one = sandbox.path().join("one");
    let two = sandbox.path().join("two");
    for i in 0..4 {
        write_aged(&one.join(format!("a{i}")), b"1", 0);
        write_aged(&two.join(format!("b{i}")), b"2", 0);
    }
    let config = AppConfig {
        dry_run: false,
        max_total_delete: 5,
        ..AppConfig::default()
    };
    let e = engine(config, &sandbox.path().join("q"));
    let scans = vec![
        e.enumerate(&Rule::new("One", one.display().to_string()).with_action(RuleAction::Delete)),
        e.enumerate(&Rule::new("Two", two.display().to_string()).with_action(RuleAction::Delete)),
    ];
    let summary = e.act_all(&scans);
    assert_eq!(summary.files_acted, 5);
    assert!(summary.cap_reached);
    assert_eq!(summary.reports.len(), 2);
}

struct RefusingBin;

impl RecycleBin for RefusingBin {
    fn recycle(&self, path: &Path) -> Result<()> {
        Err(cache_sweeper::core::errors::SweepError::Recycle {
            path: path.to_path_buf(),
            details: "bin unavailable".to_string(),
        })
    }
}

#[test]
fn per_file_failures_are_reported_not_fatal() {
    let sandbox = tempfile::tempdir().unwrap();
    let base = sandbox.path().join("base");
    write_aged(&base.join("a"), b"a", 0);
    write_aged(&base.join("b"), b"b", 0);
    let (logger, rx) = ActivityLoggerHandle::capture(64);

    let e = CleanerEngine::new(live_config())
        .with_quarantine_root(sandbox.path().join("q"))
        .with_recycle_bin(Some(Arc::new(RefusingBin) as Arc<dyn RecycleBin>))
        .with_logger(logger);
    let rule = Rule::new("Bin", base.display().to_string()).with_action(RuleAction::Recycle);
    let report = e.act(&e.enumerate(&rule));

    assert_eq!(report.files_acted, 0);
    assert_eq!(report.failure_count(), 2);
    assert!(report.failures.iter().all(|f| f.code == "CSW-3004"));
    assert!(base.join("a").exists());

    let failures = rx
        .try_iter()
        .filter(|e| matches!(e, ActivityEvent::FileActionFailed { .. }))
        .count();
    assert_eq!(failures, 2);
}

#[test]
fn independent_engines_do_not_share_signals() {
    let sandbox = tempfile::tempdir().unwrap();
    write_aged(&sandbox.path().join("a"), b"a", 0);
    let rule = Rule::new("R", sandbox.path().display().to_string());

    let stopped = engine(AppConfig::default(), &sandbox.path().join("q"));
    stopped.control().stop();
    let running = engine(AppConfig::default(), &sandbox.path().join("q"));

    assert!(stopped.enumerate(&rule).is_empty());
    assert_eq!(running.enumerate(&rule).files.len(), 1);
}
