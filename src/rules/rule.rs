//! The rule model: a named retention policy over one base directory.

#![allow(missing_docs)]

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SweepError};
use crate::core::paths::{expand_placeholders, resolve_absolute_path};
use crate::rules::glob::RulePattern;

/// What a rule does to the files it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    /// Move into the quarantine area, mirroring the rule-relative path.
    #[default]
    Quarantine,
    /// Remove permanently.
    Delete,
    /// Hand over to the OS recycle bin.
    Recycle,
}

impl RuleAction {
    pub const ALL: [Self; 3] = [Self::Quarantine, Self::Delete, Self::Recycle];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quarantine => "quarantine",
            Self::Delete => "delete",
            Self::Recycle => "recycle",
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleAction {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == wanted)
            .ok_or_else(|| SweepError::InvalidConfig {
                details: format!("unknown action {s:?}; expected quarantine, delete or recycle"),
            })
    }
}

fn default_patterns() -> Vec<String> {
    vec!["*".to_string()]
}

const fn default_true() -> bool {
    true
}

/// A declarative retention policy: what to search, how old, what to do.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Unique within a rule set; also names the rule's quarantine folder.
    pub name: String,
    /// Base directory; may contain `~` and environment placeholders.
    pub path: String,
    #[serde(default = "default_patterns")]
    pub patterns: Vec<String>,
    #[serde(default, alias = "min_age_days")]
    pub min_age_days: u32,
    #[serde(default = "default_true", alias = "remove_empty_dirs")]
    pub remove_empty_dirs: bool,
    #[serde(default)]
    pub action: RuleAction,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Rule {
    /// A rule with the default policy: all files, no age filter, quarantine.
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            patterns: default_patterns(),
            min_age_days: 0,
            remove_empty_dirs: true,
            action: RuleAction::default(),
            enabled: true,
        }
    }

    #[must_use]
    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_min_age_days(mut self, days: u32) -> Self {
        self.min_age_days = days;
        self
    }

    #[must_use]
    pub fn with_action(mut self, action: RuleAction) -> Self {
        self.action = action;
        self
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_remove_empty_dirs(mut self, remove: bool) -> Self {
        self.remove_empty_dirs = remove;
        self
    }

    /// Expand placeholders and resolve the base to an absolute path.
    pub fn resolve_base(&self) -> PathBuf {
        resolve_absolute_path(&expand_placeholders(&self.path))
    }

    /// Patterns to evaluate; an empty list means "everything".
    pub fn effective_patterns(&self) -> Vec<&str> {
        if self.patterns.is_empty() {
            vec!["*"]
        } else {
            self.patterns.iter().map(String::as_str).collect()
        }
    }

    /// Compile the effective patterns in rule order.
    pub fn compile_patterns(&self) -> Result<Vec<RulePattern>> {
        self.effective_patterns()
            .into_iter()
            .map(|p| {
                RulePattern::compile(p).map_err(|e| SweepError::InvalidRule {
                    name: self.name.clone(),
                    details: e.to_string(),
                })
            })
            .collect()
    }

    /// Entry-point validation: rejects rules that could never be saved.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SweepError::InvalidRule {
                name: self.name.clone(),
                details: "rule name required".to_string(),
            });
        }
        if self.path.trim().is_empty() {
            return Err(SweepError::InvalidRule {
                name: self.name.clone(),
                details: "rule path required".to_string(),
            });
        }
        self.compile_patterns().map(|_| ())
    }

    /// Rule name reduced to a single safe path component.
    pub fn folder_name(&self) -> String {
        let cleaned: String = self
            .name
            .trim()
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '\0' => '_',
                c => c,
            })
            .collect();
        match cleaned.as_str() {
            "" | "." | ".." => "_".to_string(),
            _ => cleaned,
        }
    }
}

/// Split a comma-separated pattern list the way rule forms enter them.
pub fn parse_pattern_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rule_has_default_policy() {
        let rule = Rule::new("Temp", "/tmp/x");
        assert_eq!(rule.patterns, vec!["*"]);
        assert_eq!(rule.min_age_days, 0);
        assert_eq!(rule.action, RuleAction::Quarantine);
        assert!(rule.enabled);
        assert!(rule.remove_empty_dirs);
    }

    #[test]
    fn deserializes_with_defaults() {
        let rule: Rule = serde_json::from_str(r#"{"name": "A", "path": "/a"}"#).unwrap();
        assert_eq!(rule, Rule::new("A", "/a"));
    }

    #[test]
    fn accepts_both_key_spellings() {
        let camel: Rule = serde_json::from_str(
            r#"{"name":"A","path":"/a","minAgeDays":3,"removeEmptyDirs":false,"action":"delete"}"#,
        )
        .unwrap();
        let snake: Rule = serde_json::from_str(
            r#"{"name":"A","path":"/a","min_age_days":3,"remove_empty_dirs":false,"action":"delete"}"#,
        )
        .unwrap();
        assert_eq!(camel, snake);
        assert_eq!(camel.min_age_days, 3);
        assert_eq!(camel.action, RuleAction::Delete);
    }

    #[test]
    fn unknown_action_is_a_parse_error() {
        let parsed = serde_json::from_str::<Rule>(r#"{"name":"A","path":"/a","action":"shred"}"#);
        assert!(parsed.is_err());
        assert!("shred".parse::<RuleAction>().is_err());
        assert_eq!(" Recycle ".parse::<RuleAction>().unwrap(), RuleAction::Recycle);
    }

    #[test]
    fn validation_rejects_missing_fields() {
        assert!(matches!(
            Rule::new("  ", "/a").validate(),
            Err(SweepError::InvalidRule { .. })
        ));
        assert!(matches!(
            Rule::new("A", "").validate(),
            Err(SweepError::InvalidRule { .. })
        ));
        assert!(Rule::new("A", "/a").validate().is_ok());
    }

    #[test]
    fn empty_pattern_list_means_everything() {
        let rule = Rule::new("A", "/a").with_patterns(Vec::<String>::new());
        assert_eq!(rule.effective_patterns(), vec!["*"]);
        assert_eq!(rule.compile_patterns().unwrap().len(), 1);
    }

    #[test]
    fn folder_name_is_single_component() {
        assert_eq!(Rule::new("Chrome/Default Cache", "/a").folder_name(), "Chrome_Default Cache");
        assert_eq!(Rule::new("..", "/a").folder_name(), "_");
        assert_eq!(Rule::new("R", "/a").folder_name(), "R");
    }

    #[test]
    fn pattern_list_parsing() {
        assert_eq!(parse_pattern_list("*.tmp, *.log ,,"), vec!["*.tmp", "*.log"]);
        assert!(parse_pattern_list(" , ").is_empty());
    }
}
