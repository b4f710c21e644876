use lessonforge_markup::classes::normalize_pass;
use lessonforge_markup::{RenameMap, normalize_classes};
use lessonforge_shared::Result;

use super::name_or;
use crate::engine::{PatchRule, RuleOutcome};

/// Run the class normalizer over a whole document.
#[derive(Debug)]
pub struct NormalizeClasses {
    name: String,
    map: RenameMap,
}

impl NormalizeClasses {
    pub fn new(name: Option<String>, map: RenameMap) -> Self {
        Self {
            name: name_or(name, || "normalize-classes".to_string()),
            map,
        }
    }
}

impl PatchRule for NormalizeClasses {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_applied(&self, body: &str) -> Result<bool> {
        Ok(self.map.is_empty() || normalize_pass(body, &self.map).1 == 0)
    }

    fn apply(&self, body: &str) -> Result<RuleOutcome> {
        Ok(RuleOutcome::applied(normalize_classes(body, &self.map)))
    }
}
