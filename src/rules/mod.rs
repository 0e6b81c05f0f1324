//! Cleaning rules: the rule model, glob pattern matching and the built-in
//! rule providers.

pub mod glob;
pub mod providers;
pub mod rule;

pub use rule::{Rule, RuleAction};
