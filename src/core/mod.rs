//! Core types: errors, configuration, paths, persistence.

pub mod config;
pub mod errors;
pub mod paths;
pub mod store;
