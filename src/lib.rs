#![forbid(unsafe_code)]

//! Cache Sweeper (csw): rule-driven cleanup of temp files and caches.
//!
//! Each rule names a base directory, glob patterns, a minimum age and an
//! action. A scan enumerates matching files without touching them; a clean
//! quarantines, recycles or deletes what the scan found, dry-run by default.
//! A daily scheduler can trigger scans, cleans and pip/npm cache purges.
//!
//! # Library usage
//!
//! ```rust,no_run
//! use cache_sweeper::prelude::*;
//!
//! let engine = CleanerEngine::new(AppConfig::default());
//! let scan = engine.enumerate(&Rule::new("Temp", "~/tmp").with_patterns(["*.tmp"]));
//! let report = engine.act(&scan);
//! println!("{} file(s), {}", report.files_acted, format_bytes(report.bytes_freed));
//! ```

pub mod prelude;

pub mod core;
pub mod daemon;
pub mod engine;
pub mod logger;
pub mod purge;
pub mod rules;
