//! Exact-name plus glob-pattern matching for archive allow/deny lists.
//!
//! `*` expands to `.*`, a literal `.` is escaped, and the resulting pattern
//! is anchored at both ends.

use std::collections::HashSet;

use regex::Regex;

#[derive(Debug, Clone)]
pub(crate) struct GlobSet {
    exact: HashSet<String>,
    patterns: Vec<Regex>,
}

impl GlobSet {
    pub(crate) fn new(exact: HashSet<String>, globs: Vec<String>) -> Self {
        let patterns = globs.iter().map(|g| compile(g)).collect();
        Self { exact, patterns }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.patterns.is_empty()
    }

    pub(crate) fn matches(&self, name: &str) -> bool {
        self.exact.contains(name) || self.patterns.iter().any(|re| re.is_match(name))
    }
}

fn compile(glob: &str) -> Regex {
    let mut pattern = String::from("^");
    for ch in glob.chars() {
        match ch {
            '*' => pattern.push_str(".*"),
            '.' => pattern.push_str("\\."),
            other => {
                if regex_syntax::is_meta_character(other) {
                    pattern.push('\\');
                }
                pattern.push(other);
            }
        }
    }
    pattern.push('$');
    Regex::new(&pattern).expect("glob-derived pattern is always valid")
}

/// Minimal stand-in for the bits of `regex-syntax` we need, so the glob
/// compiler doesn't have to special-case every metacharacter by hand.
mod regex_syntax {
    pub(crate) fn is_meta_character(c: char) -> bool {
        matches!(
            c,
            '\\' | '+' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$'
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_expands_and_dot_is_literal() {
        let set = GlobSet::new(HashSet::new(), vec!["app-*.jar".to_string()]);
        assert!(set.matches("app-1.2.3.jar"));
        assert!(!set.matches("app-1x2x3xjar"));
        assert!(!set.matches("xapp-1.jarx"));
    }

    #[test]
    fn exact_set_takes_plain_names() {
        let mut exact = HashSet::new();
        exact.insert("lib.jar".to_string());
        let set = GlobSet::new(exact, vec![]);
        assert!(set.matches("lib.jar"));
        assert!(!set.matches("other.jar"));
    }
}
