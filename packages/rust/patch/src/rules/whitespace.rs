use std::sync::LazyLock;

use regex::Regex;

use lessonforge_shared::Result;

use super::name_or;
use crate::engine::{PatchRule, RuleOutcome};

/// A line break followed by two or more blank (whitespace-only) lines.
static BLANK_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\r?\n)(?:[ \t]*\r?\n){2,}").expect("valid regex"));

/// Collapse runs of blank lines to a single blank line.
#[derive(Debug)]
pub struct CollapseBlankLines {
    name: String,
}

impl CollapseBlankLines {
    pub fn new(name: Option<String>) -> Self {
        Self {
            name: name_or(name, || "collapse-blank-lines".to_string()),
        }
    }
}

impl PatchRule for CollapseBlankLines {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_applied(&self, body: &str) -> Result<bool> {
        Ok(!BLANK_RUN_RE.is_match(body))
    }

    fn apply(&self, body: &str) -> Result<RuleOutcome> {
        Ok(RuleOutcome::applied(
            BLANK_RUN_RE.replace_all(body, "${1}${1}").into_owned(),
        ))
    }
}
