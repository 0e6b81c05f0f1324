//! Rule patterns: shell-style globs compiled to anchored regexes.
//!
//! Patterns are evaluated relative to a rule's base directory and match at any
//! depth, the way a recursive glob (`rglob`) does: `*.tmp` matches `a.tmp` as
//! well as `x/y/a.tmp`.

#![allow(missing_docs)]

use std::path::Path;

use regex::Regex;

use crate::core::errors::{Result, SweepError};

/// A compiled rule pattern.
#[derive(Debug, Clone)]
pub struct RulePattern {
    original: String,
    compiled: Regex,
}

impl RulePattern {
    /// Compile a pattern for recursive matching under a base directory.
    pub fn compile(pattern: &str) -> Result<Self> {
        let normalized = pattern.trim().replace('\\', "/");
        let relative = normalized.trim_start_matches("./").trim_start_matches('/');
        if relative.is_empty() {
            return Err(SweepError::InvalidConfig {
                details: format!("empty glob pattern {pattern:?}"),
            });
        }
        let recursive = if relative.starts_with("**/") || relative == "**" {
            relative.to_string()
        } else {
            format!("**/{relative}")
        };
        Ok(Self {
            original: pattern.to_string(),
            compiled: glob_to_regex(&recursive)?,
        })
    }

    /// The pattern as written in the rule.
    pub fn as_str(&self) -> &str {
        &self.original
    }

    /// Match a path relative to the rule's base directory.
    pub fn matches(&self, relative: &Path) -> bool {
        let text = relative.to_string_lossy().replace('\\', "/");
        self.compiled.is_match(&text)
    }
}

/// Convert a shell-style glob pattern to a regex.
///
/// Supports:
/// - `**` → matches any path (including separators)
/// - `*`  → matches anything except `/`
/// - `?`  → matches a single character except `/`
/// - `[abc]`, `[a-z]`, `[!abc]` → character classes within one component
fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut regex_str = String::with_capacity(pattern.len() * 2);
    regex_str.push('^');

    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' if i + 1 < chars.len() && chars[i + 1] == '*' => {
                if i + 2 < chars.len() && chars[i + 2] == '/' {
                    regex_str.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    regex_str.push_str(".*");
                    i += 2;
                }
            }
            '*' => {
                regex_str.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                regex_str.push_str("[^/]");
                i += 1;
            }
            '[' => {
                if let Some(len) = chars[i + 1..].iter().position(|c| *c == ']')
                    && len > 0
                {
                    let body: String = chars[i + 1..i + 1 + len].iter().collect();
                    let (negated, body) = body
                        .strip_prefix('!')
                        .map_or((false, body.as_str()), |rest| (true, rest));
                    regex_str.push('[');
                    if negated {
                        regex_str.push('^');
                    }
                    for c in body.chars() {
                        if matches!(c, '\\' | '[' | ']' | '^') {
                            regex_str.push('\\');
                        }
                        regex_str.push(c);
                    }
                    regex_str.push(']');
                    i += len + 2;
                } else {
                    regex_str.push_str("\\[");
                    i += 1;
                }
            }
            '.' | '+' | '(' | ')' | '{' | '}' | ']' | '^' | '$' | '|' | '\\' => {
                regex_str.push('\\');
                regex_str.push(chars[i]);
                i += 1;
            }
            c => {
                regex_str.push(c);
                i += 1;
            }
        }
    }

    regex_str.push('$');

    Regex::new(&regex_str).map_err(|err| SweepError::InvalidConfig {
        details: format!("invalid glob pattern {pattern:?}: {err}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn m(pattern: &str, path: &str) -> bool {
        RulePattern::compile(pattern)
            .unwrap()
            .matches(Path::new(path))
    }

    #[test]
    fn star_matches_everything_recursively() {
        assert!(m("*", "a.txt"));
        assert!(m("*", "deep/nested/b.bin"));
    }

    #[test]
    fn extension_pattern_matches_any_depth() {
        assert!(m("*.tmp", "a.tmp"));
        assert!(m("*.tmp", "x/y/a.tmp"));
        assert!(!m("*.tmp", "a.tmpx"));
        assert!(!m("*.tmp", "a.txt"));
    }

    #[test]
    fn directory_component_pattern() {
        assert!(m("**/__pycache__/*", "__pycache__/mod.cpython-312.pyc"));
        assert!(m("**/__pycache__/*", "proj/pkg/__pycache__/mod.pyc"));
        assert!(!m("**/__pycache__/*", "proj/pkg/mod.pyc"));
        assert!(!m("**/__pycache__/*", "proj/__pycache__extra/mod.pyc"));
    }

    #[test]
    fn double_star_respects_component_boundary() {
        assert!(m("src/**/main.rs", "src/main.rs"));
        assert!(m("src/**/main.rs", "src/foo/main.rs"));
        assert!(!m("src/**/main.rs", "src/badmain.rs"));
    }

    #[test]
    fn question_mark_and_classes() {
        assert!(m("log?.txt", "log1.txt"));
        assert!(!m("log?.txt", "log12.txt"));
        assert!(m("*.[ch]", "src/a.c"));
        assert!(m("*.[ch]", "src/a.h"));
        assert!(!m("*.[ch]", "src/a.o"));
        assert!(m("*.[!o]", "src/a.c"));
        assert!(!m("*.[!o]", "src/a.o"));
    }

    #[test]
    fn leading_slash_and_backslashes_are_normalized() {
        assert!(m("/*.pf", "PREFETCH.pf"));
        assert!(m("cache\\*.bin", "cache/x.bin"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        assert!(m("a+b(1).log", "a+b(1).log"));
        assert!(!m("a+b(1).log", "aab1.log"));
    }

    #[test]
    fn empty_pattern_is_rejected() {
        assert!(RulePattern::compile("").is_err());
        assert!(RulePattern::compile("  ").is_err());
    }

    proptest! {
        #[test]
        fn extension_glob_matches_any_depth(
            dirs in proptest::collection::vec("[a-z]{1,6}", 0..4),
            stem in "[a-z0-9_]{1,8}",
        ) {
            let mut path = dirs.join("/");
            if !path.is_empty() {
                path.push('/');
            }
            path.push_str(&stem);
            path.push_str(".tmp");
            prop_assert!(m("*.tmp", &path));
            prop_assert!(!m("*.log", &path));
        }
    }
}
