//! Command prefixes and the rule compiled from them.
//!
//! A [`PrefixSet`] is the ordered list of literal tokens that may open a
//! command invocation. [`PrefixMatcher::compile`] turns it into a single
//! anchored, case-insensitive rule that splits a message into the command
//! token and the raw argument string.

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::Value;
use tracing::warn;

/// Ordered, de-duplicated prefix tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixSet(Vec<String>);

impl PrefixSet {
    /// Builds a set, dropping empty tokens and later duplicates.
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for prefix in prefixes {
            let prefix = prefix.into();
            if prefix.is_empty() || out.contains(&prefix) {
                continue;
            }
            out.push(prefix);
        }
        Self(out)
    }

    /// Reads a prefix payload as delivered by the config store.
    ///
    /// Accepts an array of strings, a single string, or an index-keyed object
    /// (`{"0": "!", "1": "?"}`) ordered by its numeric keys. Anything else is an
    /// empty set.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Array(items) => Self::new(items.iter().filter_map(Value::as_str)),
            Value::String(s) => Self::new([s.as_str()]),
            Value::Object(map) => {
                let ordered: BTreeMap<u64, &str> = map
                    .iter()
                    .filter_map(|(k, v)| Some((k.parse().ok()?, v.as_str()?)))
                    .collect();
                Self::new(ordered.into_values())
            }
            Value::Null => Self::default(),
            Value::Bool(_) | Value::Number(_) => {
                warn!(payload = %value, "Ignoring prefix payload that is not a list");
                Self::default()
            }
        }
    }

    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// A successful prefix match: the command token and everything after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandMatch<'a> {
    pub name: &'a str,
    pub args: &'a str,
}

/// Message-matching rule derived from a [`PrefixSet`].
///
/// An empty set compiles to a rule that matches nothing.
#[derive(Debug, Clone, Default)]
pub struct PrefixMatcher {
    rule: Option<Regex>,
}

impl PrefixMatcher {
    #[must_use]
    pub fn compile(prefixes: &PrefixSet) -> Self {
        if prefixes.is_empty() {
            return Self { rule: None };
        }

        // Longest prefix first; the sort is stable so equal lengths keep their
        // configured order.
        let mut ordered: Vec<&str> = prefixes.iter().collect();
        ordered.sort_by_key(|p| core::cmp::Reverse(p.chars().count()));
        let alternation = ordered
            .into_iter()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("|");

        // The command token is ASCII-only: word characters and hyphens.
        let pattern = format!(r"(?is)^(?:{alternation})((?-u:[\w-])+)\s?(.*)");
        match Regex::new(&pattern) {
            Ok(rule) => Self { rule: Some(rule) },
            Err(e) => {
                warn!(error = %e, "Failed to compile command prefix rule; matching disabled");
                Self { rule: None }
            }
        }
    }

    #[must_use]
    pub const fn is_inert(&self) -> bool {
        self.rule.is_none()
    }

    #[must_use]
    pub fn matches<'a>(&self, message: &'a str) -> Option<CommandMatch<'a>> {
        let caps = self.rule.as_ref()?.captures(message)?;
        Some(CommandMatch {
            name: caps.get(1)?.as_str(),
            args: caps.get(2).map_or("", |m| m.as_str()),
        })
    }
}
