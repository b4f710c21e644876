//! Anchor locators: named places in a document's text.
//!
//! Every edit the pipeline makes is pinned to an anchor resolved by one of a
//! few locator strategies, so the lookup can be tested apart from the edit:
//!
//! - [`Element`]: an element selected by tag plus optional class or attribute
//! - [`MarkerSpan`]: the text between a literal opening marker and a closing
//!   tag that is followed by a known marker
//! - [`Literal`]: every occurrence of a fixed string
//!
//! Locators work on raw text and report byte ranges so that edits leave the
//! rest of the document byte-for-byte intact.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use lessonforge_shared::{LessonForgeError, Result};

/// Elements that never have a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Elements whose content is raw text and must not be scanned for tags.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!--.*?-->|<(/?)([A-Za-z][A-Za-z0-9-]*)\b[^>]*>").expect("valid regex")
});

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("valid regex")
});

// ---------------------------------------------------------------------------
// Span
// ---------------------------------------------------------------------------

/// Location of an anchor: the whole match and its replaceable interior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    /// Full extent, including any bounding markers.
    pub outer: Range<usize>,
    /// Interior between the bounding markers. Empty for void elements and literals.
    pub inner: Range<usize>,
}

impl Span {
    /// The opening tag or marker (`outer.start..inner.start`).
    pub fn head<'a>(&self, text: &'a str) -> &'a str {
        &text[self.outer.start..self.inner.start]
    }

    pub fn inner_text<'a>(&self, text: &'a str) -> &'a str {
        &text[self.inner.clone()]
    }

    pub fn outer_text<'a>(&self, text: &'a str) -> &'a str {
        &text[self.outer.clone()]
    }
}

// ---------------------------------------------------------------------------
// Locator trait
// ---------------------------------------------------------------------------

/// A strategy for finding anchors in a document.
pub trait Locator {
    /// Human-readable description used in reports and errors.
    fn describe(&self) -> String;

    /// Every match, ordered by start offset.
    fn locate_all(&self, text: &str) -> Vec<Span>;

    /// The first match, if any.
    fn locate_first(&self, text: &str) -> Option<Span> {
        self.locate_all(text).into_iter().next()
    }

    /// The single match. Zero matches is `Ok(None)`; several is `AmbiguousAnchor`.
    fn locate_unique(&self, text: &str) -> Result<Option<Span>> {
        let mut spans = self.locate_all(text);
        match spans.len() {
            0 => Ok(None),
            1 => Ok(spans.pop()),
            n => Err(LessonForgeError::ambiguous_anchor(self.describe(), n)),
        }
    }
}

// ---------------------------------------------------------------------------
// Element locator
// ---------------------------------------------------------------------------

/// Selects elements by tag name, optionally narrowed by class token or attribute.
#[derive(Debug, Clone)]
pub struct Element {
    tag: String,
    class: Option<String>,
    attr: Option<(String, String)>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            class: None,
            attr: None,
        }
    }

    /// Require `class` among the element's class tokens.
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    /// Require an attribute with exactly this value.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attr = Some((name.into(), value.into()));
        self
    }

    fn head_matches(&self, head: &str) -> bool {
        let class_ok = self
            .class
            .as_ref()
            .is_none_or(|class| class_tokens(head).any(|t| t == class.as_str()));
        let attr_ok = self
            .attr
            .as_ref()
            .is_none_or(|(name, value)| attr_value(head, name) == Some(value.as_str()));
        class_ok && attr_ok
    }
}

impl Locator for Element {
    fn describe(&self) -> String {
        let mut s = format!("<{}", self.tag);
        if let Some(class) = &self.class {
            s.push_str(&format!(" class~=\"{class}\""));
        }
        if let Some((name, value)) = &self.attr {
            s.push_str(&format!(" {name}=\"{value}\""));
        }
        s.push('>');
        s
    }

    fn locate_all(&self, text: &str) -> Vec<Span> {
        let is_void = VOID_ELEMENTS.contains(&self.tag.as_str());
        let mut spans = Vec::new();
        // Open tags of `self.tag` awaiting their close: (start, head end, filter match).
        let mut stack: Vec<(usize, usize, bool)> = Vec::new();
        let mut pos = 0;

        while let Some(caps) = TOKEN_RE.captures_at(text, pos) {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            pos = whole.end;

            let Some(name) = caps.get(2) else {
                continue; // comment
            };
            let name = name.as_str().to_ascii_lowercase();
            let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());

            if !closing && RAW_TEXT_ELEMENTS.contains(&name.as_str()) && name != self.tag {
                pos = skip_raw_text(text, pos, &name);
                continue;
            }
            if name != self.tag {
                continue;
            }

            let head = &text[whole.clone()];
            if is_void {
                if !closing && self.head_matches(head) {
                    spans.push(Span {
                        outer: whole.clone(),
                        inner: whole.end..whole.end,
                    });
                }
                continue;
            }

            if closing {
                if let Some((start, head_end, true)) = stack.pop() {
                    spans.push(Span {
                        outer: start..whole.end,
                        inner: head_end..whole.start,
                    });
                }
            } else if head.ends_with("/>") {
                if self.head_matches(head) {
                    spans.push(Span {
                        outer: whole.clone(),
                        inner: whole.end..whole.end,
                    });
                }
            } else {
                stack.push((whole.start, whole.end, self.head_matches(head)));
                if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
                    pos = skip_raw_text(text, pos, &name);
                }
            }
        }

        spans.sort_by_key(|s| s.outer.start);
        spans
    }
}

/// Offset of the closing tag of a raw-text element opened before `from`.
fn skip_raw_text(text: &str, from: usize, name: &str) -> usize {
    let close = format!("</{name}");
    let lower = text[from..].to_ascii_lowercase();
    match lower.find(&close) {
        Some(idx) => from + idx,
        None => text.len(),
    }
}

// ---------------------------------------------------------------------------
// Marker-pair locator
// ---------------------------------------------------------------------------

/// The interior between a literal `open` marker and a `close` tag that is
/// directly followed (modulo whitespace) by the literal `follow` marker.
///
/// Both markers stay outside the interior, so replacing [`Span::inner`]
/// preserves them verbatim.
#[derive(Debug, Clone)]
pub struct MarkerSpan {
    open: String,
    close: String,
    follow: String,
}

impl MarkerSpan {
    pub fn new(
        open: impl Into<String>,
        close: impl Into<String>,
        follow: impl Into<String>,
    ) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
            follow: follow.into(),
        }
    }
}

impl Locator for MarkerSpan {
    fn describe(&self) -> String {
        format!("{} … {} {}", self.open, self.close, self.follow)
    }

    fn locate_all(&self, text: &str) -> Vec<Span> {
        let mut spans = Vec::new();
        for (start, _) in text.match_indices(&self.open) {
            let inner_start = start + self.open.len();
            let Some(follow_rel) = text[inner_start..].find(&self.follow) else {
                continue;
            };
            let region = &text[inner_start..inner_start + follow_rel];
            let trimmed = region.trim_end();
            if !trimmed.ends_with(&self.close) {
                continue;
            }
            let close_start = inner_start + trimmed.len() - self.close.len();
            spans.push(Span {
                outer: start..close_start + self.close.len(),
                inner: inner_start..close_start,
            });
        }
        spans
    }
}

// ---------------------------------------------------------------------------
// Literal locator
// ---------------------------------------------------------------------------

/// Every occurrence of a fixed string, such as `</body>`.
#[derive(Debug, Clone)]
pub struct Literal(pub String);

impl Locator for Literal {
    fn describe(&self) -> String {
        self.0.clone()
    }

    fn locate_all(&self, text: &str) -> Vec<Span> {
        if self.0.is_empty() {
            return Vec::new();
        }
        text.match_indices(&self.0)
            .map(|(idx, m)| Span {
                outer: idx..idx + m.len(),
                inner: idx + m.len()..idx + m.len(),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Value of attribute `name` in an opening tag.
pub fn attr_value<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    attr_value_range(head, name).map(|r| &head[r])
}

fn attr_value_range(head: &str, name: &str) -> Option<Range<usize>> {
    ATTR_RE.captures_iter(head).find_map(|caps| {
        let attr = caps.get(1)?;
        if !attr.as_str().eq_ignore_ascii_case(name) {
            return None;
        }
        caps.get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.range())
    })
}

/// Class tokens of an opening tag.
pub fn class_tokens(head: &str) -> impl Iterator<Item = &str> {
    attr_value(head, "class").unwrap_or("").split_whitespace()
}

/// Rewrite the value of attribute `name` in an opening tag.
///
/// `value` is inserted as-is between the existing quotes; escape it first.
/// Returns `None` if the tag has no such attribute.
pub fn set_attr_value(head: &str, name: &str, value: &str) -> Option<String> {
    let range = attr_value_range(head, name)?;
    let quoted = range.start > 0 && matches!(head.as_bytes()[range.start - 1], b'"' | b'\'');
    let mut out = String::with_capacity(head.len() + value.len());
    out.push_str(&head[..range.start]);
    if quoted {
        out.push_str(value);
    } else {
        out.push('"');
        out.push_str(value);
        out.push('"');
    }
    out.push_str(&head[range.end..]);
    Some(out)
}

/// Replace `range` of `text` with `with`.
pub fn splice(text: &str, range: Range<usize>, with: &str) -> String {
    let mut out = String::with_capacity(text.len() - range.len() + with.len());
    out.push_str(&text[..range.start]);
    out.push_str(with);
    out.push_str(&text[range.end..]);
    out
}

/// Start offset and indentation of the line holding `at`, when only blanks
/// precede `at` on that line.
pub fn line_indent(text: &str, at: usize) -> Option<(usize, &str)> {
    let start = text[..at].rfind('\n').map_or(0, |i| i + 1);
    let lead = &text[start..at];
    lead.chars()
        .all(|c| c == ' ' || c == '\t')
        .then_some((start, lead))
}

/// Prefix every line of `block` with `indent`.
pub fn indent_lines(block: &str, indent: &str) -> String {
    block
        .lines()
        .map(|line| format!("{indent}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Insert `block` on its own lines just before offset `at`.
///
/// When `at` starts a line the block takes that line's indentation and the
/// line itself is left intact; otherwise the block goes in mid-line, followed
/// by a newline.
pub fn insert_before(text: &str, at: usize, block: &str) -> String {
    match line_indent(text, at) {
        Some((start, indent)) => {
            let indented = indent_lines(block, indent);
            splice(text, start..start, &format!("{indented}\n"))
        }
        None => splice(text, at..at, &format!("{block}\n")),
    }
}

/// Remove the outer extent of each span, skipping spans nested in earlier ones.
pub fn remove_spans(text: &str, spans: &[Span]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in spans {
        if span.outer.start < cursor {
            continue;
        }
        out.push_str(&text[cursor..span.outer.start]);
        cursor = span.outer.end;
    }
    out.push_str(&text[cursor..]);
    out
}
