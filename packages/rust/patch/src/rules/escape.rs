//! Canonical escaping inside `<pre><code class="language-…">` blocks.

use regex::{Captures, Regex};

use lessonforge_shared::{LessonForgeError, Result};

use super::{compile, name_or};
use crate::engine::{PatchRule, RuleOutcome};

/// Make code samples render literally: every block's text is unescaped and
/// escaped again, so already-escaped entities are not escaped twice.
#[derive(Debug)]
pub struct EscapeCode {
    name: String,
    block: Regex,
}

impl EscapeCode {
    pub fn new(name: Option<String>, language: &str) -> Result<Self> {
        let language = language.trim();
        if language.is_empty() || language.chars().any(char::is_whitespace) {
            return Err(LessonForgeError::config(
                "escape_code needs a single-word `language`",
            ));
        }
        let block = compile(
            &format!(
                r#"(?s)(<pre\b[^>]*>\s*<code\b[^>]*\bclass\s*=\s*["'](?:[^"']*\s)?language-{}(?:\s[^"']*)?["'][^>]*>)(.*?)(</code>\s*</pre>)"#,
                regex::escape(language)
            ),
            "escape_code",
        )?;
        Ok(Self {
            name: name_or(name, || format!("escape {language}")),
            block,
        })
    }
}

impl PatchRule for EscapeCode {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_applied(&self, body: &str) -> Result<bool> {
        Ok(self
            .block
            .captures_iter(body)
            .all(|caps| canonical(&caps[2]) == caps[2]))
    }

    fn apply(&self, body: &str) -> Result<RuleOutcome> {
        let text = self.block.replace_all(body, |caps: &Captures| {
            format!("{}{}{}", &caps[1], canonical(&caps[2]), &caps[3])
        });
        Ok(RuleOutcome::applied(text.into_owned()))
    }
}

fn canonical(code: &str) -> String {
    escape(&unescape(code))
}

fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
