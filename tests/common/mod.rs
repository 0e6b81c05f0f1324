#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

impl CmdResult {
    /// Parse the last stdout line as JSON.
    pub fn json(&self) -> Value {
        let line = self.stdout.lines().last().unwrap_or_default();
        serde_json::from_str(line).unwrap_or_else(|e| {
            panic!(
                "stdout is not JSON ({e}); log: {}",
                self.log_path.display()
            )
        })
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_sweeper") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "sweeper.exe" } else { "sweeper" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve sweeper binary path for integration test"),
    }
}

/// Run the binary with no sandboxing beyond the caller's arguments.
pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    run(case_name, args, None)
}

/// Run the binary with its home, temp dir and state confined to `sandbox`.
pub fn run_cli_case_in(case_name: &str, sandbox: &Path, args: &[&str]) -> CmdResult {
    run(case_name, args, Some(sandbox))
}

fn run(case_name: &str, args: &[&str], sandbox: Option<&Path>) -> CmdResult {
    let root = std::env::temp_dir().join("sweeper-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let mut command = Command::new(&bin_path);
    command
        .args(args)
        .env("RUST_BACKTRACE", "1")
        .env("SWEEP_OUTPUT_FORMAT", "json");
    for key in [
        "SWEEP_DRY_RUN",
        "SWEEP_QUARANTINE_ENABLED",
        "SWEEP_FOLLOW_SYMLINKS",
        "SWEEP_MAX_DELETE_PER_RULE",
        "SWEEP_MAX_TOTAL_DELETE",
        "SWEEP_HARD_RECYCLE_ONLY",
    ] {
        command.env_remove(key);
    }
    if let Some(sandbox) = sandbox {
        let home = sandbox.join("home");
        let tmp = sandbox.join("tmp");
        fs::create_dir_all(&home).expect("create sandbox home");
        fs::create_dir_all(&tmp).expect("create sandbox tmp");
        command
            .env("SWEEP_HOME", &home)
            .env("TMPDIR", &tmp)
            .arg("--dir")
            .arg(sandbox.join("state"));
    }
    let output = command.output().expect("execute sweeper command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// Write a `{config, rules}` document so a sandboxed run never seeds the
/// built-in rules.
pub fn write_rules_document(sandbox: &Path, config: Value, rules: Value) -> PathBuf {
    let state = sandbox.join("state");
    fs::create_dir_all(&state).expect("create sandbox state dir");
    let path = state.join("clean_rules.json");
    let doc = serde_json::json!({ "config": config, "rules": rules });
    fs::write(&path, serde_json::to_string_pretty(&doc).expect("serialize rules doc"))
        .expect("write rules doc");
    path
}
