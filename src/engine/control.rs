//! Cooperative stop/pause signalling shared between an engine and its caller.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

/// Interval at which a paused loop re-checks its signals.
pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Stop (one-shot) and pause (toggle) flags, plus a count of passed checkpoints.
///
/// Clones share the same flags, so the caller keeps one and hands another to
/// the worker. Separate `EngineControl::new()` instances never interfere.
#[derive(Debug, Clone, Default)]
pub struct EngineControl {
    stop: Arc<AtomicBool>,
    pause: Arc<AtomicBool>,
    passed: Arc<AtomicU64>,
}

impl EngineControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request termination. Never cleared; also releases a paused loop.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn set_paused(&self, paused: bool) {
        self.pause.store(paused, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.pause.load(Ordering::SeqCst)
    }

    /// Per-file check point. Blocks while paused; returns `false` once stop is set.
    pub fn checkpoint(&self) -> bool {
        while self.is_paused() && !self.is_stopped() {
            thread::sleep(PAUSE_POLL_INTERVAL);
        }
        if self.is_stopped() {
            return false;
        }
        self.passed.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Entries let through so far, across every run sharing these flags.
    pub fn progress(&self) -> u64 {
        self.passed.load(Ordering::Relaxed)
    }
}
