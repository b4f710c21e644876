//! Class-name normalization (`real_world_example` → `real-world-example`).

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use lessonforge_shared::{ClassesConfig, LessonForgeError, Result};

static CLASS_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(\sclass\s*=\s*)(?:"([^"]*)"|'([^']*)')"#).expect("valid regex")
});

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+").expect("valid regex"));

/// Legacy class token → canonical class token.
///
/// Tokens match whole: `real_world` never rewrites part of `real_world_example`.
#[derive(Debug, Clone, Default)]
pub struct RenameMap {
    table: BTreeMap<String, String>,
    hyphenate_underscores: bool,
}

impl RenameMap {
    /// Build a map, rejecting empty or multi-word tokens and rename cycles.
    pub fn new(table: BTreeMap<String, String>) -> Result<Self> {
        Self::with_options(table, false)
    }

    /// Build a map that also hyphenates any `_` token missing from `table`.
    pub fn with_options(table: BTreeMap<String, String>, hyphenate_underscores: bool) -> Result<Self> {
        for (from, to) in &table {
            for token in [from, to] {
                if token.is_empty() || token.chars().any(char::is_whitespace) {
                    return Err(LessonForgeError::config(format!(
                        "class rename entry '{from}' -> '{to}' must map single tokens"
                    )));
                }
            }
        }

        let map = Self {
            table,
            hyphenate_underscores,
        };
        map.check_acyclic()?;
        Ok(map)
    }

    pub fn from_config(config: &ClassesConfig) -> Result<Self> {
        Self::with_options(config.rename.clone(), config.hyphenate_underscores)
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty() && !self.hyphenate_underscores
    }

    /// One rename step for `token`, if it is a legacy identifier.
    pub fn lookup(&self, token: &str) -> Option<String> {
        if let Some(to) = self.table.get(token) {
            return (to != token).then(|| to.clone());
        }
        if self.hyphenate_underscores && token.contains('_') {
            return Some(token.replace('_', "-"));
        }
        None
    }

    fn check_acyclic(&self) -> Result<()> {
        let limit = self.table.len() + 2;
        for start in self.table.keys() {
            let mut current = start.clone();
            let mut steps = 0;
            while let Some(next) = self.lookup(&current) {
                steps += 1;
                if steps > limit {
                    return Err(LessonForgeError::config(format!(
                        "class rename table has a cycle through '{start}'"
                    )));
                }
                current = next;
            }
        }
        Ok(())
    }
}

/// Rewrite class attribute values until no legacy token remains.
pub fn normalize_classes(fragment: &str, map: &RenameMap) -> String {
    if map.is_empty() {
        return fragment.to_string();
    }

    let mut current = fragment.to_string();
    let mut passes = 0;
    loop {
        let (next, renamed) = normalize_pass(&current, map);
        passes += 1;
        if renamed == 0 {
            break;
        }
        current = next;
    }
    debug!(passes, "class normalization reached fixed point");
    current
}

/// One pass over every `class="…"` value; returns the text and the number of
/// tokens renamed.
pub fn normalize_pass(fragment: &str, map: &RenameMap) -> (String, usize) {
    let mut renamed = 0;
    let out = CLASS_ATTR_RE.replace_all(fragment, |caps: &Captures| {
        let prefix = &caps[1];
        let (quote, value) = match (caps.get(2), caps.get(3)) {
            (Some(v), _) => ('"', v.as_str()),
            (None, Some(v)) => ('\'', v.as_str()),
            (None, None) => ('"', ""),
        };
        let value = TOKEN_RE.replace_all(value, |t: &Captures| match map.lookup(&t[0]) {
            Some(to) => {
                renamed += 1;
                to
            }
            None => t[0].to_string(),
        });
        format!("{prefix}{quote}{value}{quote}")
    });
    (out.into_owned(), renamed)
}
