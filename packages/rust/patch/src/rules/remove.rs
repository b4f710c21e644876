use regex::Regex;

use lessonforge_shared::{LessonForgeError, Result};

use super::{compile, name_or};
use crate::engine::{PatchRule, RuleOutcome};

/// Delete every match of a regex, repeating until none is left.
#[derive(Debug)]
pub struct Remove {
    name: String,
    pattern: Regex,
}

impl Remove {
    pub fn new(name: Option<String>, pattern: &str) -> Result<Self> {
        let re = compile(pattern, "remove")?;
        if re.is_match("") {
            return Err(LessonForgeError::config(format!(
                "remove pattern `{pattern}` matches the empty string"
            )));
        }
        Ok(Self {
            name: name_or(name, || format!("remove /{pattern}/")),
            pattern: re,
        })
    }
}

impl PatchRule for Remove {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_applied(&self, body: &str) -> Result<bool> {
        Ok(!self.pattern.is_match(body))
    }

    fn apply(&self, body: &str) -> Result<RuleOutcome> {
        let mut text = body.to_string();
        loop {
            let next = self.pattern.replace_all(&text, "").into_owned();
            if next == text {
                break;
            }
            text = next;
        }
        Ok(RuleOutcome::applied(text))
    }
}
