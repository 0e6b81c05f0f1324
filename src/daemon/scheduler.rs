//! Daily scheduler: a polling timer thread that fires schedule entries.
//!
//! Two states. `Idle`: no timer thread. `Armed`: a thread ticks every
//! [`TICK_INTERVAL`] and fires each entry whose `HH:MM` fell within the last
//! [`FIRE_WINDOW_SECS`] seconds. An entry fires at most once per calendar day.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveDateTime};
use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use parking_lot::{Mutex, RwLock};

use crate::core::errors::{Result, SweepError};
use crate::core::store::ConfigStore;
use crate::daemon::schedule::{ScheduleEntry, ScheduledAction};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};

/// Time between scheduler ticks.
pub const TICK_INTERVAL: Duration = Duration::from_secs(15);

/// Trailing window after an entry's time during which it may fire.
pub const FIRE_WINDOW_SECS: i64 = 30;

/// Receives fired entries. Implementations must return promptly; long work
/// belongs on a worker thread.
pub trait ScheduleDispatcher: Send + Sync {
    fn dispatch(&self, entry: &ScheduleEntry) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Armed,
}

type FiringKey = (String, ScheduledAction, String, NaiveDate);

struct Shared {
    entries: RwLock<Vec<ScheduleEntry>>,
    fired: Mutex<HashSet<FiringKey>>,
    logger: Option<ActivityLoggerHandle>,
}

struct Timer {
    cancel: Sender<()>,
    join: JoinHandle<()>,
}

/// Owns the schedule list and the timer thread.
pub struct Scheduler {
    shared: Arc<Shared>,
    store: Option<ConfigStore>,
    tick_interval: Duration,
    timer: Mutex<Option<Timer>>,
}

impl Scheduler {
    pub fn new(entries: Vec<ScheduleEntry>) -> Self {
        Self {
            shared: Arc::new(Shared {
                entries: RwLock::new(entries),
                fired: Mutex::new(HashSet::new()),
                logger: None,
            }),
            store: None,
            tick_interval: TICK_INTERVAL,
            timer: Mutex::new(None),
        }
    }

    /// Scheduler over the entries persisted in `store`; later edits are saved back.
    pub fn load(store: ConfigStore) -> Result<Self> {
        let entries = store.load_schedules()?;
        let mut scheduler = Self::new(entries);
        scheduler.store = Some(store);
        Ok(scheduler)
    }

    #[must_use]
    pub fn with_logger(mut self, logger: ActivityLoggerHandle) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.logger = Some(logger);
        }
        self
    }

    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn entries(&self) -> Vec<ScheduleEntry> {
        self.shared.entries.read().clone()
    }

    /// Validate, name if unnamed, append, and persist. Returns the stored entry.
    pub fn add(&self, mut entry: ScheduleEntry) -> Result<ScheduleEntry> {
        let mut entries = self.shared.entries.write();
        if entry.name.trim().is_empty() {
            entry.name = ScheduleEntry::default_name(entries.len());
        }
        entry.validate()?;
        entries.push(entry.clone());
        if let Err(e) = self.persist(&entries) {
            entries.pop();
            return Err(e);
        }
        Ok(entry)
    }

    /// Remove the entry at `index` and persist.
    pub fn remove(&self, index: usize) -> Result<ScheduleEntry> {
        let mut entries = self.shared.entries.write();
        if index >= entries.len() {
            return Err(SweepError::InvalidSchedule {
                name: format!("#{index}"),
                details: format!("no schedule entry at index {index} ({} total)", entries.len()),
            });
        }
        let removed = entries.remove(index);
        if let Err(e) = self.persist(&entries) {
            entries.insert(index, removed);
            return Err(e);
        }
        Ok(removed)
    }

    /// Re-read the persisted entries, replacing the in-memory list. Returns
    /// the number of entries loaded; a no-op without a store.
    pub fn reload(&self) -> Result<usize> {
        let Some(store) = &self.store else {
            return Ok(self.shared.entries.read().len());
        };
        let loaded = store.load_schedules()?;
        let count = loaded.len();
        *self.shared.entries.write() = loaded;
        Ok(count)
    }

    fn persist(&self, entries: &[ScheduleEntry]) -> Result<()> {
        match &self.store {
            Some(store) => store.save_schedules(entries),
            None => Ok(()),
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.timer.lock().is_some() {
            SchedulerState::Armed
        } else {
            SchedulerState::Idle
        }
    }

    /// Idle → Armed. A no-op when already armed.
    pub fn start(&self, dispatcher: Arc<dyn ScheduleDispatcher>) -> Result<()> {
        let mut timer = self.timer.lock();
        if timer.is_some() {
            return Ok(());
        }
        let (cancel, cancelled) = bounded::<()>(1);
        let shared = Arc::clone(&self.shared);
        let interval = self.tick_interval;
        let join = thread::Builder::new()
            .name("csw-scheduler".to_string())
            .spawn(move || {
                loop {
                    shared.tick(Local::now().naive_local(), dispatcher.as_ref());
                    match cancelled.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .map_err(|e| SweepError::Runtime {
                details: format!("failed to spawn scheduler thread: {e}"),
            })?;
        *timer = Some(Timer { cancel, join });
        Ok(())
    }

    /// Armed → Idle. Waits for an in-progress tick to finish.
    pub fn stop(&self) {
        let Some(timer) = self.timer.lock().take() else {
            return;
        };
        let _ = timer.cancel.send(());
        let _ = timer.join.join();
    }

    /// Evaluate every entry at `now` and dispatch the due ones. Returns the
    /// entries fired by this tick.
    pub fn tick(&self, now: NaiveDateTime, dispatcher: &dyn ScheduleDispatcher) -> Vec<ScheduleEntry> {
        self.shared.tick(now, dispatcher)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Shared {
    fn tick(&self, now: NaiveDateTime, dispatcher: &dyn ScheduleDispatcher) -> Vec<ScheduleEntry> {
        let window = chrono::Duration::seconds(FIRE_WINDOW_SECS);
        let today = now.date();
        let entries = self.entries.read().clone();
        let mut fired_now = Vec::new();

        let mut fired = self.fired.lock();
        fired.retain(|key| key.3 == today);

        for entry in entries {
            let due = match entry.is_due(now, window) {
                Ok(due) => due,
                Err(e) => {
                    // Malformed time: skip this entry, report once a day.
                    if fired.insert(entry.firing_key(today)) {
                        self.log(ActivityEvent::ScheduleSkipped {
                            name: entry.name.clone(),
                            time: entry.time.clone(),
                            reason: e.to_string(),
                        });
                    }
                    continue;
                }
            };
            if !due || !fired.insert(entry.firing_key(today)) {
                continue;
            }
            match dispatcher.dispatch(&entry) {
                Ok(()) => self.log(ActivityEvent::ScheduleFired {
                    name: entry.name.clone(),
                    action: entry.action.to_string(),
                    time: entry.time.clone(),
                }),
                Err(e) => self.log(ActivityEvent::ScheduleSkipped {
                    name: entry.name.clone(),
                    time: entry.time.clone(),
                    reason: e.to_string(),
                }),
            }
            fired_now.push(entry);
        }
        fired_now
    }

    fn log(&self, event: ActivityEvent) {
        if let Some(logger) = &self.logger {
            logger.send(event);
        }
    }
}
