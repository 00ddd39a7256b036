//! Wildcard matching for index, action and credential patterns
//!
//! A pattern is either a literal or contains `*`:
//! - `logs-2020` - matches only the exact name
//! - `logs-*` - `*` stands for any sequence; the compiled expression is searched for
//!   anywhere inside the candidate and is not anchored at either end
//!
//! A leading `+` is stripped (`+logs` is `logs`). An entry with a leading `-` is dropped.

use crate::error::{GateError, Result};
use regex::RegexSet;
use std::collections::BTreeSet;
use tracing::warn;

/// Compiled set of literal and wildcard patterns
#[derive(Debug, Clone)]
pub struct Matcher {
    /// Every normalized pattern, wildcards included
    patterns: BTreeSet<String>,
    /// One compiled expression per wildcard pattern
    wildcards: RegexSet,
}

impl Matcher {
    /// Build a matcher from raw pattern strings
    ///
    /// Entries that normalize to nothing are skipped silently.
    ///
    /// # Examples
    /// ```
    /// use indexgate::Matcher;
    ///
    /// let matcher = Matcher::new(["logs-*", "metrics", "-secret"]).unwrap();
    /// assert!(matcher.matches("logs-2021"));
    /// assert!(matcher.matches("metrics"));
    /// assert!(!matcher.matches("secret"));
    /// ```
    pub fn new<I, S>(raw: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut patterns = BTreeSet::new();
        let mut wildcard_patterns = Vec::new();

        for entry in raw {
            let Some(pattern) = Self::normalize(entry.as_ref()) else {
                continue;
            };

            if pattern.contains('*') {
                wildcard_patterns.push(pattern.to_string());
                patterns.insert(pattern.to_string());
            } else {
                patterns.insert(pattern.trim().to_string());
            }
        }

        let expressions: Vec<String> = wildcard_patterns
            .iter()
            .map(|p| Self::wildcard_expression(p))
            .collect();

        let wildcards = RegexSet::new(&expressions).map_err(|source| GateError::InvalidPattern {
            pattern: wildcard_patterns.join(", "),
            source,
        })?;

        Ok(Matcher {
            patterns,
            wildcards,
        })
    }

    /// Normalize a raw pattern or candidate
    ///
    /// Returns `None` for blank entries, entries starting with `-`, and a bare `+`.
    pub fn normalize(raw: &str) -> Option<&str> {
        if raw.trim().is_empty() || raw.starts_with('-') {
            return None;
        }

        match raw.strip_prefix('+') {
            Some(rest) if rest.trim().is_empty() => {
                warn!("invalid pattern: {:?}", raw);
                None
            }
            Some(rest) => Some(rest),
            None => Some(raw),
        }
    }

    /// Escape every literal run and turn each `*` into `.*`, without anchors
    fn wildcard_expression(pattern: &str) -> String {
        pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*")
    }

    /// Check whether a candidate matches any pattern
    ///
    /// Literal equality is tried first, then wildcard containment.
    pub fn matches(&self, candidate: &str) -> bool {
        let Some(candidate) = Self::normalize(candidate) else {
            return false;
        };

        if self.patterns.contains(candidate) {
            return true;
        }

        self.wildcards.is_match(candidate)
    }

    /// Keep the members of `haystack` that match
    pub fn filter(&self, haystack: &BTreeSet<String>) -> BTreeSet<String> {
        if haystack.is_empty() {
            return BTreeSet::new();
        }

        haystack
            .iter()
            .filter(|name| self.matches(name))
            .cloned()
            .collect()
    }

    /// Normalized patterns this matcher was built from
    pub fn patterns(&self) -> &BTreeSet<String> {
        &self.patterns
    }

    /// Whether `pattern` was configured verbatim (after normalization)
    pub fn contains_pattern(&self, pattern: &str) -> bool {
        self.patterns.contains(pattern)
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
