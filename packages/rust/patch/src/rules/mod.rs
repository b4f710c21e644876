//! Built-in patch rules.

mod classes;
mod escape;
mod inject;
mod reference;
mod remove;
mod replace;
mod whitespace;

use regex::Regex;

use lessonforge_markup::RenameMap;
use lessonforge_shared::{LessonForgeError, Result, RuleSpec};

use crate::engine::PatchRule;

pub use classes::NormalizeClasses;
pub use escape::EscapeCode;
pub use inject::{Inject, Snippet};
pub use reference::MigrateReference;
pub use remove::Remove;
pub use replace::Replace;
pub use whitespace::CollapseBlankLines;

/// Build the rule described by a `[[patch.rules]]` entry.
pub fn build(spec: &RuleSpec, classes: &RenameMap) -> Result<Box<dyn PatchRule>> {
    let rule: Box<dyn PatchRule> = match spec {
        RuleSpec::Inject {
            name,
            script,
            stylesheet,
            comment,
            anchor,
            position,
            only_if,
        } => {
            let snippet = match (script, stylesheet) {
                (Some(src), None) => Snippet::Script(src.clone()),
                (None, Some(href)) => Snippet::Stylesheet(href.clone()),
                _ => {
                    return Err(LessonForgeError::config(
                        "inject rule needs exactly one of `script` or `stylesheet`",
                    ));
                }
            };
            Box::new(Inject::new(
                name.clone(),
                snippet,
                comment.clone(),
                anchor.clone(),
                *position,
                only_if.as_deref(),
            )?)
        }
        RuleSpec::Replace { name, from, to } => {
            Box::new(Replace::new(name.clone(), from.clone(), to.clone())?)
        }
        RuleSpec::Remove { name, pattern } => Box::new(Remove::new(name.clone(), pattern)?),
        RuleSpec::MigrateReference {
            name,
            from,
            to,
            comment,
        } => Box::new(MigrateReference::new(
            name.clone(),
            from.clone(),
            to.clone(),
            comment.as_deref(),
        )?),
        RuleSpec::EscapeCode { name, language } => {
            Box::new(EscapeCode::new(name.clone(), language)?)
        }
        RuleSpec::CollapseBlankLines { name } => Box::new(CollapseBlankLines::new(name.clone())),
        RuleSpec::NormalizeClasses { name } => {
            Box::new(NormalizeClasses::new(name.clone(), classes.clone()))
        }
    };
    Ok(rule)
}

/// Compile a regex from configuration, reporting failures as config errors.
pub(crate) fn compile(pattern: &str, what: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| LessonForgeError::config(format!("invalid {what} pattern `{pattern}`: {e}")))
}

fn name_or(name: Option<String>, default: impl FnOnce() -> String) -> String {
    name.filter(|n| !n.trim().is_empty()).unwrap_or_else(default)
}
