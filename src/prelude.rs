//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use cache_sweeper::prelude::*;
//! ```

// Core
pub use crate::core::config::{AppConfig, SweepPaths};
pub use crate::core::errors::{Result, SweepError};
pub use crate::core::store::ConfigStore;

// Rules
pub use crate::rules::providers::{OsFamily, default_rules, merge_rules};
pub use crate::rules::rule::{Rule, RuleAction};

// Engine
pub use crate::engine::{
    ActReport, ActionFailure, CleanSummary, CleanerEngine, EngineControl, RecycleBin, ScanResult,
};

// Scheduling
pub use crate::daemon::host::SweepHost;
pub use crate::daemon::schedule::{ScheduleEntry, ScheduledAction};
pub use crate::daemon::scheduler::{ScheduleDispatcher, Scheduler, SchedulerState};

// Purges
pub use crate::purge::{PurgeReport, PurgeTool};

// Logging
pub use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle, format_bytes};
