//! Daemon subsystem: the host core, the daily scheduler, and the foreground
//! runner with signal handling.

pub mod host;
#[cfg(feature = "daemon")]
pub mod runner;
pub mod schedule;
pub mod scheduler;
#[cfg(feature = "daemon")]
pub mod signals;
