//! Activity logging: typed events over a bounded channel, written as JSONL.

pub mod activity;
pub mod jsonl;
