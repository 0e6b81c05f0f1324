//! Built-in rule sets: temp directories, bytecode caches, OS caches, browser caches.
//!
//! Providers are pure data producers. The only filesystem access is existence
//! checks so that rules are only offered for locations present on this host.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::rules::rule::Rule;

/// Host operating-system family, used to pick platform cache locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Windows,
    MacOs,
    Linux,
}

impl OsFamily {
    /// Family of the running host. Unix flavors other than macOS use the Linux layout.
    pub const fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Linux
        }
    }
}

fn rule(name: impl Into<String>, path: &Path, patterns: &[&str], min_age_days: u32) -> Rule {
    Rule::new(name, path.to_string_lossy())
        .with_patterns(patterns.iter().copied())
        .with_min_age_days(min_age_days)
}

/// The system temp directory, one day old and up.
pub fn temp_rules() -> Vec<Rule> {
    vec![rule("System TEMP", &env::temp_dir(), &["*"], 1)]
}

/// Language runtime bytecode caches under the home directory.
pub fn bytecode_cache_rules(home: &Path) -> Vec<Rule> {
    vec![rule("Python __pycache__", home, &["**/__pycache__/*"], 0)]
}

/// Platform temp/cache/log locations.
pub fn os_specific_rules(family: OsFamily, home: &Path) -> Vec<Rule> {
    match family {
        OsFamily::Windows => {
            let system_root = env::var_os("SystemRoot")
                .map_or_else(|| PathBuf::from("C:/Windows"), PathBuf::from);
            let local = home.join("AppData").join("Local");
            vec![
                rule("Windows Temp", &local.join("Temp"), &["**/*"], 1),
                rule("Windows Prefetch", &system_root.join("Prefetch"), &["*.pf"], 7),
                rule(
                    "Windows ErrorReports",
                    &local.join("Microsoft/Windows/WER/ReportArchive"),
                    &["**/*"],
                    7,
                ),
                rule(
                    "Edge GPUCache",
                    &local.join("Microsoft/Edge/User Data/Default/GPUCache"),
                    &["**/*"],
                    2,
                ),
            ]
        }
        OsFamily::MacOs => vec![
            rule("macOS User Cache", &home.join("Library/Caches"), &["**/*"], 3),
            rule("macOS Logs", &home.join("Library/Logs"), &["**/*.log"], 7),
        ],
        OsFamily::Linux => vec![
            rule("Linux ~/.cache", &home.join(".cache"), &["**/*"], 3),
            rule(
                "Linux Thumbnail Cache",
                &home.join(".cache/thumbnails"),
                &["**/*"],
                7,
            ),
        ],
    }
}

/// Per-browser cache directories that exist on this host.
pub fn browser_cache_rules(family: OsFamily, home: &Path) -> Vec<Rule> {
    let mut rules = Vec::new();
    match family {
        OsFamily::Windows => {
            let local = home.join("AppData").join("Local");
            for (label, base) in [
                ("Chrome", local.join("Google/Chrome/User Data")),
                ("Edge", local.join("Microsoft/Edge/User Data")),
            ] {
                for profile in child_dirs(&base) {
                    let cache = profile.join("Cache");
                    if cache.exists() {
                        let name = format!("{label} {} Cache", file_name(&profile));
                        rules.push(rule(name, &cache, &["**/*"], 2));
                    }
                }
            }
            let roaming = home.join("AppData/Roaming/Mozilla/Firefox/Profiles");
            for profile in child_dirs(&roaming) {
                let profile_name = file_name(&profile);
                if !profile_name.contains(".default") {
                    continue;
                }
                let cache = local
                    .join("Mozilla/Firefox/Profiles")
                    .join(&profile_name)
                    .join("cache2");
                if cache.exists() {
                    let name = format!("Firefox {profile_name} Cache");
                    rules.push(rule(name, &cache, &["**/*"], 2));
                }
            }
        }
        OsFamily::MacOs | OsFamily::Linux => {
            let bases: Vec<PathBuf> = if family == OsFamily::MacOs {
                vec![
                    home.join("Library/Caches/Google/Chrome"),
                    home.join("Library/Caches/Firefox"),
                    home.join("Library/Caches/Microsoft Edge"),
                ]
            } else {
                vec![
                    home.join(".cache/google-chrome"),
                    home.join(".cache/chromium"),
                    home.join(".cache/mozilla/firefox"),
                ]
            };
            for base in bases.into_iter().filter(|b| b.exists()) {
                let name = format!("Browser Cache ({})", file_name(&base));
                rules.push(rule(name, &base, &["**/*"], 2));
            }
        }
    }
    rules
}

/// The rule set seeded when no rules document exists yet.
pub fn default_rules() -> Vec<Rule> {
    let home = crate::core::paths::home_dir();
    let family = OsFamily::current();
    let mut rules = temp_rules();
    rules.extend(bytecode_cache_rules(&home));
    merge_rules(&mut rules, browser_cache_rules(family, &home));
    merge_rules(&mut rules, os_specific_rules(family, &home));
    rules
}

/// Append rules whose names are not already present. Returns the number added.
pub fn merge_rules(existing: &mut Vec<Rule>, incoming: Vec<Rule>) -> usize {
    let mut added = 0;
    for candidate in incoming {
        if existing.iter().all(|r| r.name != candidate.name) {
            existing.push(candidate);
            added += 1;
        }
    }
    added
}

fn child_dirs(base: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(base) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        .map(|e| e.path())
        .collect();
    dirs.sort();
    dirs
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
