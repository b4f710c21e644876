//! Cross-collection link remapping.

use std::collections::BTreeMap;

use regex::{Captures, Regex};
use tracing::debug;

use lessonforge_shared::{LessonForgeError, LinksConfig, Result};

use crate::rules::compile;

/// Old path prefix → new path prefix, matched longest prefix first.
#[derive(Debug, Clone, Default)]
pub struct LinkRemap {
    /// Sorted by descending prefix length, then lexically.
    entries: Vec<(String, String)>,
    pattern: Option<Regex>,
}

/// Rewritten text and the number of replacements per old prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relinked {
    pub text: String,
    pub counts: BTreeMap<String, usize>,
}

impl Relinked {
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

impl LinkRemap {
    pub fn new(map: &BTreeMap<String, String>) -> Result<Self> {
        if map.keys().any(|k| k.is_empty()) {
            return Err(LessonForgeError::config("link remap has an empty prefix"));
        }

        let mut entries: Vec<(String, String)> =
            map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        // Leftmost-first alternation: at any offset the first (longest) prefix wins.
        let pattern = if entries.is_empty() {
            None
        } else {
            let alternation = entries
                .iter()
                .map(|(old, _)| regex::escape(old))
                .collect::<Vec<_>>()
                .join("|");
            Some(compile(&alternation, "link remap")?)
        };

        Ok(Self { entries, pattern })
    }

    pub fn from_config(config: &LinksConfig) -> Result<Self> {
        Self::new(&config.remap)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Old prefixes in matching order.
    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(old, _)| old.as_str())
    }

    /// Replace every old prefix in one pass; replaced text is never rescanned,
    /// so `/10/ → /07/` and `/07/ → /06/` do not chain.
    pub fn rewrite(&self, text: &str) -> Relinked {
        let Some(pattern) = &self.pattern else {
            return Relinked {
                text: text.to_string(),
                counts: BTreeMap::new(),
            };
        };

        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        let out = pattern.replace_all(text, |caps: &Captures| {
            let matched = &caps[0];
            match self.entries.iter().find(|(old, _)| old == matched) {
                Some((old, new)) => {
                    *counts.entry(old.clone()).or_default() += 1;
                    new.clone()
                }
                None => matched.to_string(),
            }
        });

        debug!(replacements = counts.values().sum::<usize>(), "links rewritten");
        Relinked {
            text: out.into_owned(),
            counts,
        }
    }
}
