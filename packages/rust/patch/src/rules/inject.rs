//! Exactly-once snippet injection next to a unique anchor.

use regex::Regex;

use lessonforge_markup::{
    Literal, Locator, file_name, indent_lines, insert_before, line_indent, script_block,
    splice,
};
use lessonforge_shared::{InjectPosition, LessonForgeError, Result};

use super::{compile, name_or};
use crate::engine::{PatchRule, RuleOutcome, RuleStatus};

/// The reference an [`Inject`] rule maintains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snippet {
    /// `<script src="…"></script>`
    Script(String),
    /// `<link rel="stylesheet" href="…">`
    Stylesheet(String),
}

impl Snippet {
    fn path(&self) -> &str {
        match self {
            Self::Script(p) | Self::Stylesheet(p) => p,
        }
    }

    /// Regex for any reference to the same file name, whatever its path.
    fn tag_pattern(&self) -> String {
        let file = regex::escape(file_name(self.path()));
        match self {
            Self::Script(_) => format!(
                r#"<script\b[^>]*\bsrc\s*=\s*["'](?:[^"']*/)?{file}(?:[?#][^"']*)?["'][^>]*>\s*</script>"#
            ),
            Self::Stylesheet(_) => format!(
                r#"<link\b[^>]*\bhref\s*=\s*["'](?:[^"']*/)?{file}(?:[?#][^"']*)?["'][^>]*>"#
            ),
        }
    }

    fn block(&self, comment: Option<&str>) -> String {
        match self {
            Self::Script(src) => script_block(src, comment),
            Self::Stylesheet(href) => {
                let tag = format!(r#"<link rel="stylesheet" href="{href}">"#);
                match comment {
                    Some(c) => format!("<!-- {c} -->\n{tag}"),
                    None => tag,
                }
            }
        }
    }
}

/// Keep exactly one snippet immediately before or after an anchor.
///
/// Applying first deletes every existing reference to the snippet's file
/// (any path, with any leading copies of its comment) and every orphaned
/// copy of the comment, then inserts one
/// canonical block at the anchor, indented like the anchor's line.
#[derive(Debug)]
pub struct Inject {
    name: String,
    block: String,
    anchor: Literal,
    position: InjectPosition,
    only_if: Option<Regex>,
    instance: Regex,
    removal: Regex,
}

impl Inject {
    pub fn new(
        name: Option<String>,
        snippet: Snippet,
        comment: Option<String>,
        anchor: String,
        position: InjectPosition,
        only_if: Option<&str>,
    ) -> Result<Self> {
        if snippet.path().trim().is_empty() {
            return Err(LessonForgeError::config("inject rule has an empty path"));
        }
        if anchor.is_empty() {
            return Err(LessonForgeError::config("inject rule has an empty anchor"));
        }

        let comment = comment.filter(|c| !c.trim().is_empty());
        let marker = comment
            .as_ref()
            .map(|c| format!(r"<!--\s*{}[^>]*-->", regex::escape(c.trim())));
        let prefix = marker
            .as_ref()
            .map_or_else(String::new, |m| format!(r"(?:{m}\s*)*"));
        let instance_pattern = format!("{prefix}{}", snippet.tag_pattern());
        let instance = compile(&instance_pattern, "inject instance")?;
        // Orphaned comments go too, or they would stack onto the new block.
        let removable = match &marker {
            Some(m) => format!("{instance_pattern}|{m}"),
            None => instance_pattern,
        };
        let removal = compile(
            &format!(r"[ \t]*(?:{removable})[ \t]*(?:\r?\n)?"),
            "inject removal",
        )?;
        let only_if = only_if.map(|p| compile(p, "only_if")).transpose()?;

        Ok(Self {
            name: name_or(name, || format!("inject {}", snippet.path())),
            block: snippet.block(comment.as_deref()),
            anchor: Literal(anchor),
            position,
            only_if,
            instance,
            removal,
        })
    }

    fn wanted(&self, body: &str) -> bool {
        self.only_if.as_ref().is_none_or(|re| re.is_match(body))
    }
}

impl PatchRule for Inject {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_applied(&self, body: &str) -> Result<bool> {
        if !self.wanted(body) {
            return Ok(true);
        }
        let Some(anchor) = self.anchor.locate_unique(body)? else {
            return Ok(false);
        };

        let mut instances = self.instance.find_iter(body);
        let (Some(only), None) = (instances.next(), instances.next()) else {
            return Ok(false);
        };

        let canonical = only
            .as_str()
            .split_whitespace()
            .eq(self.block.split_whitespace());
        let gap = match self.position {
            InjectPosition::Before if only.end() <= anchor.outer.start => {
                &body[only.end()..anchor.outer.start]
            }
            InjectPosition::After if anchor.outer.end <= only.start() => {
                &body[anchor.outer.end..only.start()]
            }
            _ => return Ok(false),
        };
        Ok(canonical && gap.trim().is_empty())
    }

    fn apply(&self, body: &str) -> Result<RuleOutcome> {
        if !self.wanted(body) {
            return Ok(RuleOutcome::unchanged(body, RuleStatus::AlreadyApplied));
        }

        let stripped = self.removal.replace_all(body, "");
        let Some(anchor) = self.anchor.locate_unique(&stripped)? else {
            return Ok(RuleOutcome::unchanged(body, RuleStatus::AnchorMissing));
        };

        let text = match self.position {
            InjectPosition::Before => insert_before(&stripped, anchor.outer.start, &self.block),
            InjectPosition::After => {
                let indent = line_indent(&stripped, anchor.outer.start).map_or("", |(_, i)| i);
                let indented = indent_lines(&self.block, indent);
                let at = anchor.outer.end;
                splice(&stripped, at..at, &format!("\n{indented}"))
            }
        };
        Ok(RuleOutcome::applied(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagram_rule() -> Inject {
        Inject::new(
            None,
            Snippet::Script("/assets/js/mermaid-universal-fix.js".into()),
            Some("Universal Mermaid Fix".into()),
            "</body>".into(),
            InjectPosition::Before,
            None,
        )
        .unwrap()
    }

    #[test]
    fn inserts_before_anchor_with_indent() {
        let body = "<html>\n  <body>\n    <p>x</p>\n  </body>\n</html>";
        let out = diagram_rule().run(body).unwrap();
        assert_eq!(out.status, RuleStatus::Applied);
        assert_eq!(
            out.text,
            "<html>\n  <body>\n    <p>x</p>\n  <!-- Universal Mermaid Fix -->\n  <script src=\"/assets/js/mermaid-universal-fix.js\"></script>\n  </body>\n</html>"
        );
        assert!(diagram_rule().is_applied(&out.text).unwrap());
    }

    #[test]
    fn removes_stray_copies_before_inserting() {
        let body = "<head><script src=\"/js/mermaid-universal-fix.js\"></script></head>\n<body>\n<!-- Universal Mermaid Fix -->\n<script src='/assets/js/mermaid-universal-fix.js'></script>\n<p>x</p>\n<script src=\"/assets/js/mermaid-universal-fix.js\"></script>\n</body>";
        let rule = diagram_rule();
        let out = rule.run(body).unwrap();
        assert_eq!(out.text.matches("mermaid-universal-fix.js").count(), 1);
        assert_eq!(out.text.matches("Universal Mermaid Fix").count(), 1);
        assert!(out.text.starts_with("<head></head>\n<body>\n<p>x</p>\n<!--"));
        assert_eq!(rule.run(&out.text).unwrap().status, RuleStatus::AlreadyApplied);
    }

    #[test]
    fn hand_placed_copy_satisfies_guard() {
        let body = "<p>x</p>\n<!-- Universal Mermaid Fix -->\n    <script src=\"/assets/js/mermaid-universal-fix.js\"></script>\n\n</body>";
        assert!(diagram_rule().is_applied(body).unwrap());
    }

    #[test]
    fn orphaned_comment_does_not_stack() {
        let body = "<p>x</p>\n<!-- Universal Mermaid Fix -->\n</body>";
        let rule = diagram_rule();
        let once = rule.run(body).unwrap();
        assert_eq!(once.status, RuleStatus::Applied);
        assert_eq!(
            once.text,
            "<p>x</p>\n<!-- Universal Mermaid Fix -->\n<script src=\"/assets/js/mermaid-universal-fix.js\"></script>\n</body>"
        );
        assert!(rule.is_applied(&once.text).unwrap());

        let twice = rule.run(&once.text).unwrap();
        assert_eq!(twice.status, RuleStatus::AlreadyApplied);
        assert_eq!(twice.text, once.text);
    }

    #[test]
    fn stylesheet_after_anchor() {
        let anchor = r#"<link rel="stylesheet" href="/assets/css/main.css">"#;
        let rule = Inject::new(
            Some("sidebar-css".into()),
            Snippet::Stylesheet("/assets/css/sidebar-enhanced.css".into()),
            None,
            anchor.into(),
            InjectPosition::After,
            None,
        )
        .unwrap();
        let body = format!("<head>\n    {anchor}\n</head>");
        let out = rule.run(&body).unwrap();
        assert_eq!(
            out.text,
            format!(
                "<head>\n    {anchor}\n    <link rel=\"stylesheet\" href=\"/assets/css/sidebar-enhanced.css\">\n</head>"
            )
        );
        assert_eq!(rule.run(&out.text).unwrap().text, out.text);
    }

    #[test]
    fn only_if_gates_the_rule() {
        let rule = Inject::new(
            None,
            Snippet::Script("/assets/js/mermaid-universal-fix.js".into()),
            None,
            "</body>".into(),
            InjectPosition::Before,
            Some(r#"class="[^"]*\bmermaid\b"#),
        )
        .unwrap();
        let plain = "<body><p>x</p></body>";
        assert!(rule.is_applied(plain).unwrap());
        assert_eq!(rule.run(plain).unwrap().text, plain);

        let diagram = "<body><div class=\"mermaid\">a</div></body>";
        assert_eq!(rule.run(diagram).unwrap().status, RuleStatus::Applied);
    }

    #[test]
    fn missing_anchor_leaves_text_alone() {
        let body = "<div><script src=\"/assets/js/mermaid-universal-fix.js\"></script></div>";
        let out = diagram_rule().run(body).unwrap();
        assert_eq!(out.status, RuleStatus::AnchorMissing);
        assert_eq!(out.text, body);
    }

    #[test]
    fn ambiguous_anchor_is_error() {
        let body = "</body></body>";
        let err = diagram_rule().run(body).unwrap_err();
        assert!(matches!(err, LessonForgeError::AmbiguousAnchor { count: 2, .. }));
    }

    #[test]
    fn invalid_only_if_is_config_error() {
        let err = Inject::new(
            None,
            Snippet::Script("/a.js".into()),
            None,
            "</body>".into(),
            InjectPosition::Before,
            Some("("),
        )
        .unwrap_err();
        assert!(matches!(err, LessonForgeError::Config { .. }));
    }
}
