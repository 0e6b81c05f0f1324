//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use cache_sweeper::core::config::{AppConfig, SweepPaths};
use cache_sweeper::core::errors::SweepError;
use cache_sweeper::core::paths::home_dir;
use cache_sweeper::core::store::ConfigStore;
use cache_sweeper::daemon::host::SweepHost;
use cache_sweeper::daemon::runner::DaemonRunner;
use cache_sweeper::daemon::schedule::{ScheduleEntry, ScheduledAction};
use cache_sweeper::daemon::scheduler::Scheduler;
use cache_sweeper::daemon::signals::SignalHandler;
use cache_sweeper::engine::{CleanSummary, ScanResult};
use cache_sweeper::logger::activity::{
    ActivityLoggerHandle, LoggerConfig, format_bytes, spawn_logger,
};
use cache_sweeper::purge::{PurgeReport, PurgeTool, purge};
use cache_sweeper::rules::providers::{self, OsFamily};
use cache_sweeper::rules::rule::{Rule, RuleAction, parse_pattern_list};

/// Slice used when waiting on workers so an interrupt is noticed promptly.
const WAIT_SLICE: Duration = Duration::from_millis(100);

/// Cache Sweeper: rule-driven cleanup of temp files and caches.
#[derive(Debug, Parser)]
#[command(
    name = "sweeper",
    author,
    version,
    about = "Cache Sweeper - rule-driven temp and cache cleanup",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Keep rules, schedules, quarantine and logs in this directory.
    #[arg(long, global = true, value_name = "DIR")]
    dir: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Mirror activity events to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Enumerate what every rule would clean, without touching anything.
    Scan(ScanArgs),
    /// Scan, then quarantine, recycle or delete the matches.
    Clean(CleanArgs),
    /// List and edit cleaning rules.
    Rules(RulesArgs),
    /// List and edit daily schedule entries.
    Schedule(ScheduleArgs),
    /// Purge a package manager's cache.
    Purge(PurgeArgs),
    /// Run the scheduler in the foreground until interrupted.
    Daemon(DaemonArgs),
    /// View and update the safety policy.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct ScanArgs {
    /// List every matched file.
    #[arg(long)]
    files: bool,
}

#[derive(Debug, Clone, Args, Default)]
struct CleanArgs {
    /// Act for real, overriding dryRun for this run.
    #[arg(long, conflicts_with = "dry_run")]
    live: bool,
    /// Simulate, overriding dryRun for this run.
    #[arg(long)]
    dry_run: bool,
    /// Confirm a live clean.
    #[arg(short, long)]
    yes: bool,
}

#[derive(Debug, Clone, Args)]
struct RulesArgs {
    #[command(subcommand)]
    command: Option<RulesCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum RulesCommand {
    /// List rules (default).
    List,
    /// Add a rule.
    Add(RuleAddArgs),
    /// Remove a rule by name.
    Remove {
        /// Rule name.
        name: String,
    },
    /// Enable a rule by name.
    Enable {
        /// Rule name.
        name: String,
    },
    /// Disable a rule by name.
    Disable {
        /// Rule name.
        name: String,
    },
    /// Merge built-in rules whose names are not taken yet.
    Seed(SeedArgs),
}

#[derive(Debug, Clone, Args)]
struct RuleAddArgs {
    /// Unique rule name.
    name: String,
    /// Base directory; `~` and environment variables are expanded.
    path: String,
    /// Comma-separated glob patterns.
    #[arg(long, value_name = "GLOBS", default_value = "*")]
    patterns: String,
    /// Minimum file age in days.
    #[arg(long, default_value_t = 0, value_name = "DAYS")]
    min_age: u32,
    /// quarantine, delete or recycle.
    #[arg(long, default_value = "quarantine")]
    action: RuleAction,
    /// Leave empty directories in place after cleaning.
    #[arg(long)]
    keep_empty_dirs: bool,
    /// Add the rule disabled.
    #[arg(long)]
    disabled: bool,
}

#[derive(Debug, Clone, Args, Default)]
struct SeedArgs {
    /// System temp directory.
    #[arg(long)]
    temp: bool,
    /// Language bytecode caches.
    #[arg(long)]
    bytecode: bool,
    /// Platform temp, cache and log locations.
    #[arg(long)]
    os: bool,
    /// Browser caches.
    #[arg(long)]
    browser: bool,
}

#[derive(Debug, Clone, Args)]
struct ScheduleArgs {
    #[command(subcommand)]
    command: Option<ScheduleCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ScheduleCommand {
    /// List schedule entries (default).
    List,
    /// Add a daily entry.
    Add {
        /// scan, clean, purge_pip or purge_npm.
        action: ScheduledAction,
        /// Local time of day, HH:MM.
        time: String,
        /// Entry name; defaults to `Task N`.
        #[arg(long)]
        name: Option<String>,
    },
    /// Remove an entry by its number in `schedule list`.
    Remove {
        #[arg(value_name = "NUMBER")]
        number: usize,
    },
}

#[derive(Debug, Clone, Args)]
struct PurgeArgs {
    /// pip or npm.
    tool: PurgeTool,
}

#[derive(Debug, Clone, Args)]
struct DaemonArgs {
    /// Seconds to wait for running work on shutdown.
    #[arg(long, default_value_t = 30, value_name = "SECONDS")]
    shutdown_timeout: u64,
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Show the persisted and effective policy (default).
    Show,
    /// Show where rules, schedules, quarantine and logs live.
    Path,
    /// Set one policy key, e.g. `config set dryRun false`.
    Set {
        /// Key in camelCase or snake_case.
        key: String,
        /// New value.
        value: String,
    },
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// Operation partially succeeded.
    #[error("{0}")]
    Partial(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
            Self::Partial(_) => 4,
        }
    }
}

impl From<SweepError> for CliError {
    fn from(err: SweepError) -> Self {
        match err {
            SweepError::InvalidConfig { .. }
            | SweepError::InvalidRule { .. }
            | SweepError::InvalidSchedule { .. }
            | SweepError::ConfigParse { .. }
            | SweepError::Busy { .. }
            | SweepError::NothingToClean => Self::User(err.to_string()),
            _ => Self::Runtime(err.to_string()),
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Scan(args) => run_scan(cli, args),
        Command::Clean(args) => run_clean(cli, args),
        Command::Rules(args) => run_rules(cli, args),
        Command::Schedule(args) => run_schedule(cli, args),
        Command::Purge(args) => run_purge(cli, args),
        Command::Daemon(args) => run_daemon(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

// ──────────────────── shared plumbing ────────────────────

fn sweep_paths(cli: &Cli) -> SweepPaths {
    cli.dir
        .as_deref()
        .map_or_else(SweepPaths::default, SweepPaths::in_dir)
}

/// Activity logger for one command; flushed and joined on drop.
struct LogSession {
    handle: ActivityLoggerHandle,
    join: Option<JoinHandle<()>>,
}

impl LogSession {
    fn start(paths: &SweepPaths, verbose: bool) -> Result<Self, CliError> {
        let config = LoggerConfig {
            log_path: paths.activity_log.clone(),
            echo_stderr: verbose,
            ..LoggerConfig::default()
        };
        let (handle, join) = spawn_logger(config)?;
        Ok(Self {
            handle,
            join: Some(join),
        })
    }

    fn handle(&self) -> ActivityLoggerHandle {
        self.handle.clone()
    }
}

impl Drop for LogSession {
    fn drop(&mut self) {
        self.handle.shutdown();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Block until the host is idle, cancelling running work on SIGINT/SIGTERM.
fn wait_for_host(host: &SweepHost, signals: &SignalHandler) -> bool {
    let mut interrupted = false;
    while !host.wait_idle(WAIT_SLICE) {
        if !interrupted && signals.should_shutdown() {
            eprintln!("sweeper: interrupt received, stopping at the next file");
            host.cancel();
            interrupted = true;
        }
    }
    interrupted || signals.should_shutdown()
}

fn open_host(cli: &Cli, log: &LogSession) -> Result<SweepHost, CliError> {
    Ok(SweepHost::open(&sweep_paths(cli), Some(log.handle()))?)
}

// ──────────────────── scan / clean ────────────────────

fn run_scan(cli: &Cli, args: &ScanArgs) -> Result<(), CliError> {
    let log = LogSession::start(&sweep_paths(cli), cli.verbose)?;
    let host = open_host(cli, &log)?;
    let signals = SignalHandler::install();

    host.start_scan()?;
    wait_for_host(&host, &signals);
    let results = host.scan_results();
    emit_scan(cli, &results, args.files)?;

    if results.iter().any(|r| r.cancelled) {
        return Err(CliError::Partial(
            "scan stopped before every rule was enumerated".to_string(),
        ));
    }
    Ok(())
}

fn run_clean(cli: &Cli, args: &CleanArgs) -> Result<(), CliError> {
    if args.live && !args.yes {
        return Err(CliError::User(
            "a live clean changes the filesystem; add --yes to confirm".to_string(),
        ));
    }

    let log = LogSession::start(&sweep_paths(cli), cli.verbose)?;
    let host = open_host(cli, &log)?;
    if args.live {
        host.override_dry_run(Some(false));
    } else if args.dry_run {
        host.override_dry_run(Some(true));
    }
    let signals = SignalHandler::install();

    host.start_scan()?;
    if wait_for_host(&host, &signals) {
        return Err(CliError::Partial(
            "interrupted during scan; nothing was cleaned".to_string(),
        ));
    }
    if host.scan_results().is_empty() {
        emit_message(cli, "clean", "no rules configured; nothing to clean")?;
        return Ok(());
    }

    host.start_clean()?;
    wait_for_host(&host, &signals);
    let summary = host
        .last_clean()
        .ok_or_else(|| CliError::Internal("clean finished without a summary".to_string()))?;
    emit_clean(cli, &summary)?;

    if summary.cancelled {
        return Err(CliError::Partial("clean stopped before completion".to_string()));
    }
    if summary.failures > 0 {
        return Err(CliError::Partial(format!(
            "{} file(s) could not be cleaned",
            summary.failures
        )));
    }
    Ok(())
}

fn emit_scan(cli: &Cli, results: &[ScanResult], list_files: bool) -> Result<(), CliError> {
    let total_files: usize = results.iter().map(|r| r.files.len()).sum();
    let total_bytes: u64 = results.iter().map(|r| r.total_size).sum();

    match output_mode(cli) {
        OutputMode::Human => {
            println!("{}", "Scan results".bold());
            for result in results {
                let marker = if result.rule.enabled { "" } else { " (disabled)" };
                println!(
                    "  {:<32} {:>8} file(s) {:>10}{marker}",
                    result.rule.name,
                    result.files.len(),
                    format_bytes(result.total_size),
                );
                if list_files {
                    for file in &result.files {
                        println!("      {}", file.display());
                    }
                }
            }
            println!(
                "\nTotal: {} file(s), {}",
                total_files,
                format_bytes(total_bytes).green()
            );
        }
        OutputMode::Json => {
            let rules: Vec<Value> = results
                .iter()
                .map(|r| {
                    let mut entry = json!({
                        "rule": r.rule.name,
                        "base": r.base.to_string_lossy(),
                        "files": r.files.len(),
                        "total_bytes": r.total_size,
                        "cancelled": r.cancelled,
                    });
                    if list_files {
                        entry["paths"] = r
                            .files
                            .iter()
                            .map(|f| Value::from(f.to_string_lossy().into_owned()))
                            .collect();
                    }
                    entry
                })
                .collect();
            write_json_line(&json!({
                "command": "scan",
                "rules": rules,
                "total_files": total_files,
                "total_bytes": total_bytes,
            }))?;
        }
    }
    Ok(())
}

fn emit_clean(cli: &Cli, summary: &CleanSummary) -> Result<(), CliError> {
    match output_mode(cli) {
        OutputMode::Human => {
            let title = if summary.dry_run {
                "Clean (dry run)".yellow()
            } else {
                "Clean".bold()
            };
            println!("{title}");
            for report in &summary.reports {
                println!(
                    "  {:<32} {:>8} file(s) {:>10}  {} failure(s)",
                    report.rule,
                    report.files_acted,
                    format_bytes(report.bytes_freed),
                    report.failure_count(),
                );
                for failure in &report.failures {
                    println!(
                        "      {} {}: {}",
                        failure.action,
                        failure.path.display(),
                        failure.message.red()
                    );
                }
            }
            if summary.empty_dirs_removed > 0 {
                println!("  removed {} empty director(ies)", summary.empty_dirs_removed);
            }
            if summary.cap_reached {
                println!("  {}", "stopped at maxTotalDelete".yellow());
            }
            println!(
                "\nDONE. Freed approx {} (dry_run={})",
                format_bytes(summary.bytes_freed).green(),
                summary.dry_run
            );
        }
        OutputMode::Json => {
            let reports: Vec<Value> = summary
                .reports
                .iter()
                .map(|r| {
                    let failures: Vec<Value> = r
                        .failures
                        .iter()
                        .map(|f| {
                            json!({
                                "path": f.path.to_string_lossy(),
                                "action": f.action.as_str(),
                                "code": f.code,
                                "message": f.message,
                            })
                        })
                        .collect();
                    json!({
                        "rule": r.rule,
                        "files_acted": r.files_acted,
                        "bytes_freed": r.bytes_freed,
                        "failures": failures,
                        "cancelled": r.cancelled,
                        "cap_reached": r.cap_reached,
                    })
                })
                .collect();
            write_json_line(&json!({
                "command": "clean",
                "dry_run": summary.dry_run,
                "files_acted": summary.files_acted,
                "bytes_freed": summary.bytes_freed,
                "failures": summary.failures,
                "empty_dirs_removed": summary.empty_dirs_removed,
                "cancelled": summary.cancelled,
                "cap_reached": summary.cap_reached,
                "reports": reports,
            }))?;
        }
    }
    Ok(())
}

// ──────────────────── rules ────────────────────

fn run_rules(cli: &Cli, args: &RulesArgs) -> Result<(), CliError> {
    let log = LogSession::start(&sweep_paths(cli), cli.verbose)?;
    let host = open_host(cli, &log)?;

    match &args.command {
        None | Some(RulesCommand::List) => emit_rules(cli, &host.rules()),
        Some(RulesCommand::Add(add)) => {
            let rule = Rule::new(add.name.trim(), add.path.trim())
                .with_patterns(parse_pattern_list(&add.patterns))
                .with_min_age_days(add.min_age)
                .with_action(add.action)
                .with_remove_empty_dirs(!add.keep_empty_dirs)
                .with_enabled(!add.disabled);
            host.add_rule(rule)?;
            host.save()?;
            emit_message(cli, "rules add", &format!("added rule '{}'", add.name.trim()))
        }
        Some(RulesCommand::Remove { name }) => {
            let index = rule_index(&host, name)?;
            host.delete_rule(index)?;
            host.save()?;
            emit_message(cli, "rules remove", &format!("removed rule '{name}'"))
        }
        Some(RulesCommand::Enable { name }) => set_rule_enabled(cli, &host, name, true),
        Some(RulesCommand::Disable { name }) => set_rule_enabled(cli, &host, name, false),
        Some(RulesCommand::Seed(seed)) => {
            let home = home_dir();
            let family = OsFamily::current();
            let everything = !(seed.temp || seed.bytecode || seed.os || seed.browser);
            let mut incoming = Vec::new();
            if everything || seed.temp {
                incoming.extend(providers::temp_rules());
            }
            if everything || seed.bytecode {
                incoming.extend(providers::bytecode_cache_rules(&home));
            }
            if everything || seed.browser {
                incoming.extend(providers::browser_cache_rules(family, &home));
            }
            if everything || seed.os {
                incoming.extend(providers::os_specific_rules(family, &home));
            }
            let added = host.merge_rules(incoming);
            host.save()?;
            emit_message(cli, "rules seed", &format!("added {added} rule(s)"))
        }
    }
}

fn rule_index(host: &SweepHost, name: &str) -> Result<usize, CliError> {
    host.find_rule(name)
        .ok_or_else(|| CliError::User(format!("no rule named '{name}'")))
}

fn set_rule_enabled(cli: &Cli, host: &SweepHost, name: &str, enabled: bool) -> Result<(), CliError> {
    let index = rule_index(host, name)?;
    let rule = host.rules()[index].clone().with_enabled(enabled);
    host.update_rule(index, rule)?;
    host.save()?;
    let verb = if enabled { "enabled" } else { "disabled" };
    emit_message(cli, "rules", &format!("{verb} rule '{name}'"))
}

fn emit_rules(cli: &Cli, rules: &[Rule]) -> Result<(), CliError> {
    match output_mode(cli) {
        OutputMode::Human => {
            if rules.is_empty() {
                println!("No rules configured. Try `sweeper rules seed`.");
            }
            for rule in rules {
                let state = if rule.enabled {
                    "on ".green()
                } else {
                    "off".red()
                };
                println!(
                    "  [{state}] {:<28} {:<10} age>={:<3} {}  ({})",
                    rule.name,
                    rule.action.as_str(),
                    rule.min_age_days,
                    rule.path,
                    rule.effective_patterns().join(", "),
                );
            }
        }
        OutputMode::Json => {
            write_json_line(&json!({
                "command": "rules list",
                "rules": serde_json::to_value(rules)?,
            }))?;
        }
    }
    Ok(())
}

// ──────────────────── schedule ────────────────────

fn run_schedule(cli: &Cli, args: &ScheduleArgs) -> Result<(), CliError> {
    let scheduler = Scheduler::load(ConfigStore::from_paths(&sweep_paths(cli)))?;

    match &args.command {
        None | Some(ScheduleCommand::List) => {
            let entries = scheduler.entries();
            match output_mode(cli) {
                OutputMode::Human => {
                    if entries.is_empty() {
                        println!("No schedule entries.");
                    }
                    for (i, entry) in entries.iter().enumerate() {
                        println!(
                            "  {:>2}. {} {:<10} {}",
                            i + 1,
                            entry.time,
                            entry.action.as_str(),
                            entry.name
                        );
                    }
                }
                OutputMode::Json => {
                    write_json_line(&json!({
                        "command": "schedule list",
                        "entries": serde_json::to_value(&entries)?,
                    }))?;
                }
            }
            Ok(())
        }
        Some(ScheduleCommand::Add { action, time, name }) => {
            let entry = ScheduleEntry::new(name.clone().unwrap_or_default(), *action, time.trim());
            let added = scheduler.add(entry)?;
            emit_message(
                cli,
                "schedule add",
                &format!("'{}' will {} daily at {}", added.name, added.action, added.time),
            )
        }
        Some(ScheduleCommand::Remove { number }) => {
            let index = number
                .checked_sub(1)
                .ok_or_else(|| CliError::User("entry numbers start at 1".to_string()))?;
            let removed = scheduler.remove(index)?;
            emit_message(cli, "schedule remove", &format!("removed '{}'", removed.name))
        }
    }
}

// ──────────────────── purge ────────────────────

fn run_purge(cli: &Cli, args: &PurgeArgs) -> Result<(), CliError> {
    let log = LogSession::start(&sweep_paths(cli), cli.verbose)?;
    let report = purge(args.tool, Some(&log.handle()));
    emit_purge(cli, &report)?;
    if report.failures.is_empty() {
        Ok(())
    } else {
        Err(CliError::Partial(format!(
            "{} {} cache location(s) could not be removed",
            report.failures.len(),
            report.tool
        )))
    }
}

fn emit_purge(cli: &Cli, report: &PurgeReport) -> Result<(), CliError> {
    match output_mode(cli) {
        OutputMode::Human => {
            let command = if report.command_ok {
                "ok".green()
            } else {
                "unavailable or failed".yellow()
            };
            println!("{} cache purge: command {command}", report.tool);
            println!("  cleaned {} location(s)", report.locations_cleaned);
            for (path, message) in &report.failures {
                println!("  {}: {}", path.display(), message.red());
            }
        }
        OutputMode::Json => {
            let failures: Vec<Value> = report
                .failures
                .iter()
                .map(|(path, message)| json!({ "path": path.to_string_lossy(), "message": message }))
                .collect();
            write_json_line(&json!({
                "command": "purge",
                "tool": report.tool.name(),
                "command_ok": report.command_ok,
                "locations_cleaned": report.locations_cleaned,
                "failures": failures,
            }))?;
        }
    }
    Ok(())
}

// ──────────────────── daemon ────────────────────

fn run_daemon(cli: &Cli, args: &DaemonArgs) -> Result<(), CliError> {
    let paths = sweep_paths(cli);
    let log = LogSession::start(&paths, cli.verbose)?;
    let host = Arc::new(SweepHost::open(&paths, Some(log.handle()))?);
    let scheduler = Scheduler::load(ConfigStore::from_paths(&paths))?.with_logger(log.handle());

    let runner = DaemonRunner::new(host, scheduler, SignalHandler::install())
        .with_logger(log.handle())
        .with_shutdown_timeout(Duration::from_secs(args.shutdown_timeout));
    if runner.run()? {
        Ok(())
    } else {
        Err(CliError::Partial(
            "some workers were still running at the shutdown timeout".to_string(),
        ))
    }
}

// ──────────────────── config ────────────────────

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    let paths = sweep_paths(cli);

    match &args.command {
        None | Some(ConfigCommand::Show) => {
            let (config, _) = ConfigStore::from_paths(&paths).load_with(Vec::new)?;
            let mut effective = config.clone();
            effective.apply_env_overrides()?;
            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", serde_json::to_string_pretty(&config)?);
                    if effective != config {
                        println!("\n{}", "Effective (after SWEEP_* overrides):".bold());
                        println!("{}", serde_json::to_string_pretty(&effective)?);
                    }
                }
                OutputMode::Json => {
                    write_json_line(&json!({
                        "command": "config show",
                        "config": serde_json::to_value(&config)?,
                        "effective": serde_json::to_value(&effective)?,
                    }))?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Path) => {
            match output_mode(cli) {
                OutputMode::Human => {
                    println!("rules:      {}", paths.rules_file.display());
                    println!("schedules:  {}", paths.schedule_file.display());
                    println!("quarantine: {}", paths.quarantine_dir.display());
                    println!("log:        {}", paths.activity_log.display());
                }
                OutputMode::Json => {
                    write_json_line(&json!({
                        "command": "config path",
                        "rules_file": paths.rules_file.to_string_lossy(),
                        "schedule_file": paths.schedule_file.to_string_lossy(),
                        "quarantine_dir": paths.quarantine_dir.to_string_lossy(),
                        "activity_log": paths.activity_log.to_string_lossy(),
                    }))?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Set { key, value }) => {
            let store = ConfigStore::from_paths(&paths);
            let (config, rules) = store.load()?;
            let updated = set_config_value(&config, key, value)?;
            updated.validate()?;
            store.save(&updated, &rules)?;
            emit_message(cli, "config set", &format!("{} = {}", camel_case(key), value.trim()))
        }
    }
}

/// Apply `key = raw` to a copy of `config`, typed after the current value.
fn set_config_value(config: &AppConfig, key: &str, raw: &str) -> Result<AppConfig, CliError> {
    let mut doc = serde_json::to_value(config)?;
    let Value::Object(map) = &mut doc else {
        return Err(CliError::Internal("config did not serialize to an object".to_string()));
    };
    let key = camel_case(key);
    let Some(slot) = map.get_mut(&key) else {
        let known: Vec<&str> = map.keys().map(String::as_str).collect();
        return Err(CliError::User(format!(
            "unknown config key '{key}'; expected one of: {}",
            known.join(", ")
        )));
    };

    let raw = raw.trim();
    *slot = match slot {
        Value::Bool(_) => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Value::Bool(true),
            "false" | "0" | "no" | "off" => Value::Bool(false),
            _ => return Err(CliError::User(format!("{key} expects true or false, got '{raw}'"))),
        },
        Value::Number(_) => raw
            .parse::<u64>()
            .map(Value::from)
            .map_err(|_| CliError::User(format!("{key} expects a non-negative integer, got '{raw}'")))?,
        _ => Value::from(raw),
    };

    serde_json::from_value(doc).map_err(|e| CliError::User(format!("invalid value for {key}: {e}")))
}

/// `max_total_delete` → `maxTotalDelete`; camelCase input is returned unchanged.
fn camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for c in key.trim().chars() {
        if c == '_' || c == '-' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

// ──────────────────── output ────────────────────

fn emit_message(cli: &Cli, command: &str, message: &str) -> Result<(), CliError> {
    match output_mode(cli) {
        OutputMode::Human => println!("{message}"),
        OutputMode::Json => write_json_line(&json!({ "command": command, "message": message }))?,
    }
    Ok(())
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("SWEEP_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}
