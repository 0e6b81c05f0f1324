//! One-shot purges of third-party package-manager caches (pip, npm).
//!
//! Each purge asks the package manager to clean itself, then removes the
//! well-known cache directories for the host platform. Purges ignore dry-run,
//! rules and the engine's stop/pause signals.

#![allow(missing_docs)]

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;

use crate::core::errors::{Result, SweepError};
use crate::core::paths::home_dir;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::rules::providers::OsFamily;

/// Package managers with a purgeable cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PurgeTool {
    Pip,
    Npm,
}

impl PurgeTool {
    pub const ALL: [Self; 2] = [Self::Pip, Self::Npm];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Pip => "pip",
            Self::Npm => "npm",
        }
    }

    /// The package manager's own purge command: `(program, args)`.
    pub const fn command(self) -> (&'static str, &'static [&'static str]) {
        match self {
            Self::Pip => ("pip", &["cache", "purge"]),
            Self::Npm => ("npm", &["cache", "clean", "--force"]),
        }
    }

    /// Known cache directories for `family`, rooted at `home` where relevant.
    pub fn cache_dirs(self, family: OsFamily, home: &Path) -> Vec<PathBuf> {
        match (self, family) {
            (Self::Pip, OsFamily::Windows) => vec![home.join("AppData/Local/pip/Cache")],
            (Self::Pip, OsFamily::MacOs) => vec![
                PathBuf::from("/Library/Caches/pip"),
                home.join("Library/Caches/pip"),
            ],
            (Self::Pip, OsFamily::Linux) => vec![home.join(".cache/pip")],
            (Self::Npm, OsFamily::Windows) => vec![home.join("AppData/Roaming/npm-cache")],
            (Self::Npm, OsFamily::MacOs) => vec![home.join("Library/Caches/npm")],
            (Self::Npm, OsFamily::Linux) => vec![home.join(".npm"), home.join(".cache/npm")],
        }
    }
}

impl fmt::Display for PurgeTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PurgeTool {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pip" => Ok(Self::Pip),
            "npm" => Ok(Self::Npm),
            other => Err(SweepError::InvalidConfig {
                details: format!("unknown purge tool {other:?}; expected pip or npm"),
            }),
        }
    }
}

// ──────────────────── command execution ────────────────────

/// Runs an external program to completion.
pub trait CommandRunner: Send + Sync {
    /// `Ok(true)` when the program exited successfully.
    fn run(&self, program: &str, args: &[&str]) -> Result<bool>;
}

/// Runs commands on the host with all standard streams discarded.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<bool> {
        // npm and pip are .cmd/.bat shims on Windows; let the shell resolve them.
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(program);
            c
        } else {
            Command::new(program)
        };
        let status = cmd
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| SweepError::Runtime {
                details: format!("failed to run {program}: {e}"),
            })?;
        Ok(status.success())
    }
}

// ──────────────────── purge ────────────────────

/// Outcome of one purge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeReport {
    pub tool: PurgeTool,
    /// The package manager's own purge command ran and succeeded.
    pub command_ok: bool,
    /// Existing cache directories that were removed.
    pub locations_cleaned: usize,
    /// Directories that existed but could not be removed, with the reason.
    pub failures: Vec<(PathBuf, String)>,
}

/// Purge `tool`'s cache: run its purge command (best-effort), then remove
/// every existing directory from [`PurgeTool::cache_dirs`].
pub fn purge_cache(
    tool: PurgeTool,
    runner: &dyn CommandRunner,
    family: OsFamily,
    home: &Path,
    logger: Option<&ActivityLoggerHandle>,
) -> PurgeReport {
    let (program, args) = tool.command();
    let command_ok = runner.run(program, args).unwrap_or(false);

    let mut report = PurgeReport {
        tool,
        command_ok,
        locations_cleaned: 0,
        failures: Vec::new(),
    };
    for dir in tool.cache_dirs(family, home) {
        if !dir.exists() {
            continue;
        }
        match fs::remove_dir_all(&dir) {
            Ok(()) => report.locations_cleaned += 1,
            Err(e) => {
                let message = SweepError::io(&dir, e).to_string();
                if let Some(logger) = logger {
                    logger.send(ActivityEvent::PurgeLocationFailed {
                        tool: tool.name().to_string(),
                        path: dir.display().to_string(),
                        error_message: message.clone(),
                    });
                }
                report.failures.push((dir, message));
            }
        }
    }

    if let Some(logger) = logger {
        logger.send(ActivityEvent::PurgeCompleted {
            tool: tool.name().to_string(),
            command_ok,
            locations_cleaned: report.locations_cleaned,
        });
    }
    report
}

/// Purge `tool`'s cache on this host for the current user.
pub fn purge(tool: PurgeTool, logger: Option<&ActivityLoggerHandle>) -> PurgeReport {
    purge_cache(
        tool,
        &SystemCommandRunner,
        OsFamily::current(),
        &home_dir(),
        logger,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct FakeRunner {
        outcome: fn() -> Result<bool>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeRunner {
        fn new(outcome: fn() -> Result<bool>) -> Self {
            Self {
                outcome,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, program: &str, args: &[&str]) -> Result<bool> {
            self.calls
                .lock()
                .push(format!("{program} {}", args.join(" ")));
            (self.outcome)()
        }
    }

    #[test]
    fn pip_purge_runs_command_and_removes_dirs() {
        let home = tempfile::tempdir().unwrap();
        fs::create_dir_all(home.path().join(".cache/pip/http")).unwrap();
        fs::write(home.path().join(".cache/pip/http/blob"), b"x").unwrap();
        let runner = FakeRunner::new(|| Ok(true));
        let (logger, rx) = ActivityLoggerHandle::capture(8);

        let report = purge_cache(
            PurgeTool::Pip,
            &runner,
            OsFamily::Linux,
            home.path(),
            Some(&logger),
        );
        assert!(report.command_ok);
        assert_eq!(report.locations_cleaned, 1);
        assert!(!home.path().join(".cache/pip").exists());
        assert_eq!(runner.calls.lock().as_slice(), ["pip cache purge"]);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.message(), "pip cache: cleaned 1 location(s)");
    }

    #[test]
    fn missing_command_is_not_fatal() {
        let home = tempfile::tempdir().unwrap();
        fs::create_dir_all(home.path().join(".npm")).unwrap();
        fs::create_dir_all(home.path().join(".cache/npm")).unwrap();
        let runner = FakeRunner::new(|| {
            Err(SweepError::Runtime {
                details: "npm not found".to_string(),
            })
        });

        let report = purge_cache(PurgeTool::Npm, &runner, OsFamily::Linux, home.path(), None);
        assert!(!report.command_ok);
        assert_eq!(report.locations_cleaned, 2);
        assert_eq!(runner.calls.lock().as_slice(), ["npm cache clean --force"]);
    }

    #[test]
    fn absent_dirs_are_not_counted() {
        let home = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new(|| Ok(false));
        let report = purge_cache(PurgeTool::Npm, &runner, OsFamily::Linux, home.path(), None);
        assert_eq!(report.locations_cleaned, 0);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn cache_dirs_per_platform() {
        let home = Path::new("/home/me");
        assert_eq!(
            PurgeTool::Pip.cache_dirs(OsFamily::MacOs, home),
            vec![
                PathBuf::from("/Library/Caches/pip"),
                home.join("Library/Caches/pip")
            ]
        );
        assert_eq!(
            PurgeTool::Npm.cache_dirs(OsFamily::Windows, home),
            vec![home.join("AppData/Roaming/npm-cache")]
        );
    }

    #[test]
    fn tool_names_parse() {
        assert_eq!("PIP".parse::<PurgeTool>().unwrap(), PurgeTool::Pip);
        assert!("cargo".parse::<PurgeTool>().is_err());
    }
}
