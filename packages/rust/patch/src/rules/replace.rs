use lessonforge_shared::{LessonForgeError, Result};

use super::name_or;
use crate::engine::{PatchRule, RuleOutcome};

/// Upper bound on replacement passes; a replacement can recreate its needle
/// across the seam with neighbouring text (`aab` with `ab → b`).
const MAX_PASSES: usize = 32;

/// Literal replacement of every occurrence of `from`.
#[derive(Debug)]
pub struct Replace {
    name: String,
    from: String,
    to: String,
}

impl Replace {
    pub fn new(name: Option<String>, from: String, to: String) -> Result<Self> {
        if from.is_empty() {
            return Err(LessonForgeError::config("replace rule has an empty `from`"));
        }
        if to.contains(&from) {
            return Err(LessonForgeError::config(format!(
                "replace rule target '{to}' contains '{from}' and would never settle"
            )));
        }
        Ok(Self {
            name: name_or(name, || format!("replace {from}")),
            from,
            to,
        })
    }
}

impl PatchRule for Replace {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_applied(&self, body: &str) -> Result<bool> {
        Ok(!body.contains(&self.from))
    }

    fn apply(&self, body: &str) -> Result<RuleOutcome> {
        let mut text = body.replace(&self.from, &self.to);
        let mut passes = 1;
        while text.contains(&self.from) {
            if passes == MAX_PASSES {
                return Err(LessonForgeError::config(format!(
                    "replace rule '{}' did not settle after {MAX_PASSES} passes",
                    self.name
                )));
            }
            text = text.replace(&self.from, &self.to);
            passes += 1;
        }
        Ok(RuleOutcome::applied(text))
    }
}
