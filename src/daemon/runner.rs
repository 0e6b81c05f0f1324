//! Foreground daemon: arms the scheduler over a shared [`SweepHost`] and
//! polls signal flags until asked to shut down.
//!
//! SIGHUP reloads rules, config and schedules from disk. SIGUSR1 starts an
//! immediate scan. SIGTERM/SIGINT stop the scheduler, cancel running work and
//! join every worker under the shutdown budget.

#![allow(missing_docs)]

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::core::errors::{Result, SweepError};
use crate::daemon::host::SweepHost;
use crate::daemon::scheduler::{ScheduleDispatcher, Scheduler};
use crate::daemon::signals::{ShutdownCoordinator, SignalHandler};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};

/// How often the main loop checks the signal flags.
pub const SIGNAL_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct DaemonRunner {
    host: Arc<SweepHost>,
    scheduler: Scheduler,
    signals: SignalHandler,
    logger: Option<ActivityLoggerHandle>,
    poll_interval: Duration,
    shutdown: ShutdownCoordinator,
}

impl DaemonRunner {
    pub fn new(host: Arc<SweepHost>, scheduler: Scheduler, signals: SignalHandler) -> Self {
        Self {
            host,
            scheduler,
            signals,
            logger: None,
            poll_interval: SIGNAL_POLL_INTERVAL,
            shutdown: ShutdownCoordinator::default(),
        }
    }

    #[must_use]
    pub fn with_logger(mut self, logger: ActivityLoggerHandle) -> Self {
        self.logger = Some(logger);
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown = ShutdownCoordinator::new(timeout);
        self
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn signals(&self) -> &SignalHandler {
        &self.signals
    }

    /// Run until a shutdown is requested. Returns `true` when every worker
    /// was joined within the shutdown budget.
    pub fn run(&self) -> Result<bool> {
        let dispatcher: Arc<dyn ScheduleDispatcher> = Arc::clone(&self.host) as _;
        self.scheduler.start(dispatcher)?;
        eprintln!(
            "[CSW-DAEMON] scheduler armed with {} entr{}",
            self.scheduler.entries().len(),
            if self.scheduler.entries().len() == 1 { "y" } else { "ies" }
        );

        while !self.signals.should_shutdown() {
            if self.signals.should_reload() {
                self.reload();
            }
            if self.signals.should_scan() {
                match self.host.start_scan() {
                    Ok(()) => eprintln!("[CSW-DAEMON] scan requested by signal"),
                    Err(e) => self.report(&e),
                }
            }
            thread::sleep(self.poll_interval);
        }

        eprintln!("[CSW-DAEMON] shutdown requested");
        Ok(self.stop())
    }

    fn reload(&self) {
        if let Err(e) = self.host.reload() {
            self.report(&e);
            return;
        }
        match self.scheduler.reload() {
            Ok(count) => eprintln!("[CSW-DAEMON] reloaded rules and {count} schedule entries"),
            Err(e) => self.report(&e),
        }
    }

    fn stop(&self) -> bool {
        let stop_scheduler = |_: Duration| {
            self.scheduler.stop();
            true
        };
        let join_workers = |budget: Duration| self.host.shutdown(budget);
        let steps: [(&str, &dyn Fn(Duration) -> bool); 2] = [
            ("stop scheduler", &stop_scheduler),
            ("join workers", &join_workers),
        ];
        self.shutdown.execute(&steps)
    }

    fn report(&self, err: &SweepError) {
        eprintln!("[CSW-DAEMON] {err}");
        if let Some(logger) = &self.logger {
            logger.send(ActivityEvent::Error {
                code: err.code().to_string(),
                message: err.to_string(),
            });
        }
    }
}
