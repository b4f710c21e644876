//! Retarget a renamed asset and clean up what earlier runs left behind.

use regex::Regex;

use lessonforge_markup::anchor::splice;
use lessonforge_shared::{LessonForgeError, Result};

use super::{compile, name_or};
use crate::engine::{PatchRule, RuleOutcome};

/// Replace every occurrence of an old asset name with the new one, then
/// collapse adjacent duplicate references to the new asset and stacked
/// duplicate comments.
#[derive(Debug)]
pub struct MigrateReference {
    name: String,
    from: String,
    to: String,
    /// One reference to the new asset, with any leading comments.
    unit: Regex,
    comment: Option<Regex>,
}

impl MigrateReference {
    pub fn new(name: Option<String>, from: String, to: String, comment: Option<&str>) -> Result<Self> {
        if from.is_empty() || to.is_empty() {
            return Err(LessonForgeError::config(
                "migrate_reference needs non-empty `from` and `to`",
            ));
        }
        if to.contains(&from) {
            return Err(LessonForgeError::config(format!(
                "migrate_reference target '{to}' contains '{from}'"
            )));
        }

        let comment_pattern = comment
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|c| format!(r"<!--\s*{}[^>]*-->", regex::escape(c)));
        let prefix = comment_pattern
            .as_ref()
            .map(|p| format!(r"(?:{p}\s*)*"))
            .unwrap_or_default();
        let unit = compile(
            &format!(
                r#"{prefix}<script\b[^>]*\bsrc\s*=\s*["'][^"']*{}[^"']*["'][^>]*>\s*</script>"#,
                regex::escape(&to)
            ),
            "reference",
        )?;
        let comment = comment_pattern
            .map(|p| compile(&p, "reference comment"))
            .transpose()?;

        Ok(Self {
            name: name_or(name, || format!("migrate {from} -> {to}")),
            from,
            to,
            unit,
            comment,
        })
    }

    /// Remove duplicates until none remain; returns the text and the number removed.
    fn remediate(&self, text: String) -> (String, usize) {
        let mut text = text;
        let mut removed = 0;
        loop {
            let next = drop_first_adjacent(&text, &self.unit).or_else(|| {
                self.comment
                    .as_ref()
                    .and_then(|re| drop_first_adjacent(&text, re))
            });
            match next {
                Some(t) => {
                    text = t;
                    removed += 1;
                }
                None => return (text, removed),
            }
        }
    }
}

/// Remove the first match that follows the previous match with only
/// whitespace in between (the gap goes too).
fn drop_first_adjacent(text: &str, re: &Regex) -> Option<String> {
    let mut prev_end: Option<usize> = None;
    for m in re.find_iter(text) {
        if let Some(end) = prev_end {
            if text[end..m.start()].trim().is_empty() {
                return Some(splice(text, end..m.end(), ""));
            }
        }
        prev_end = Some(m.end());
    }
    None
}

impl PatchRule for MigrateReference {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_applied(&self, body: &str) -> Result<bool> {
        if body.contains(&self.from) {
            return Ok(false);
        }
        Ok(self.remediate(body.to_string()).1 == 0)
    }

    fn apply(&self, body: &str) -> Result<RuleOutcome> {
        let migrated = body.replace(&self.from, &self.to);
        let (text, removed) = self.remediate(migrated);
        tracing::debug!(rule = %self.name, removed, "reference migrated");
        Ok(RuleOutcome::applied(text))
    }
}
