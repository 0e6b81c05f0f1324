//! Signal handling for the foreground scheduler daemon: SIGTERM/SIGINT
//! graceful shutdown, SIGHUP rules/schedule reload, SIGUSR1 immediate scan.
//!
//! Uses `signal-hook` for safe registration. The daemon loop polls the flags
//! rather than blocking on signals.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use signal_hook::consts::{SIGINT, SIGTERM};

// ──────────────────── signal handler ────────────────────

/// Signal state shared between the OS handlers and the daemon loop.
#[derive(Clone, Default)]
pub struct SignalHandler {
    shutdown_flag: Arc<AtomicBool>,
    reload_flag: Arc<AtomicBool>,
    scan_flag: Arc<AtomicBool>,
}

impl SignalHandler {
    /// Create a handler and register OS signal hooks.
    ///
    /// Registration is best-effort; failures are reported on stderr.
    pub fn install() -> Self {
        let handler = Self::default();
        handler.register_signals();
        handler
    }

    pub fn should_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::Relaxed)
    }

    /// Check (and clear) whether a reload has been requested.
    pub fn should_reload(&self) -> bool {
        self.reload_flag.swap(false, Ordering::Relaxed)
    }

    /// Check (and clear) whether an immediate scan has been requested.
    pub fn should_scan(&self) -> bool {
        self.scan_flag.swap(false, Ordering::Relaxed)
    }

    pub fn request_shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
    }

    pub fn request_reload(&self) {
        self.reload_flag.store(true, Ordering::Relaxed);
    }

    pub fn request_scan(&self) {
        self.scan_flag.store(true, Ordering::Relaxed);
    }

    fn register_signals(&self) {
        for (signal, name) in [(SIGTERM, "SIGTERM"), (SIGINT, "SIGINT")] {
            if let Err(e) = signal_hook::flag::register(signal, Arc::clone(&self.shutdown_flag)) {
                eprintln!("[CSW-SIGNAL] failed to register {name}: {e}");
            }
        }

        #[cfg(unix)]
        {
            use signal_hook::consts::{SIGHUP, SIGUSR1};
            if let Err(e) = signal_hook::flag::register(SIGHUP, Arc::clone(&self.reload_flag)) {
                eprintln!("[CSW-SIGNAL] failed to register SIGHUP: {e}");
            }
            if let Err(e) = signal_hook::flag::register(SIGUSR1, Arc::clone(&self.scan_flag)) {
                eprintln!("[CSW-SIGNAL] failed to register SIGUSR1: {e}");
            }
        }
    }
}

// ──────────────────── shutdown coordinator ────────────────────

/// Runs named shutdown steps in order under an overall time budget.
pub struct ShutdownCoordinator {
    pub timeout: Duration,
}

impl ShutdownCoordinator {
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Time left before the budget runs out.
    pub fn remaining(&self, started: Instant) -> Duration {
        self.timeout.saturating_sub(started.elapsed())
    }

    /// Execute the steps. Each receives the remaining budget and reports
    /// success. Returns `true` when every step succeeded in time.
    pub fn execute(&self, steps: &[(&str, &dyn Fn(Duration) -> bool)]) -> bool {
        let started = Instant::now();
        let mut all_ok = true;

        for (name, step) in steps {
            let remaining = self.remaining(started);
            if remaining.is_zero() {
                eprintln!("[CSW-SHUTDOWN] timeout reached, abandoning remaining steps");
                return false;
            }
            if step(remaining) {
                eprintln!("[CSW-SHUTDOWN] {name}: ok");
            } else {
                eprintln!("[CSW-SHUTDOWN] {name}: incomplete");
                all_ok = false;
            }
        }
        all_ok
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

// ──────────────────── tests ────────────────────
