//! Transplant an extracted region into a new lesson template.
//!
//! Only four places in the template change: the `<title>`, the description
//! `<meta>`, the lesson heading and the body slot. A diagram script may be
//! added before `</body>`. Everything else is copied through untouched.

use tracing::{debug, warn};

use lessonforge_shared::{
    ContentRegion, DiagramConfig, LessonForgeError, MigrateConfig, Result, TitleSplit,
};

use crate::anchor::{
    Element, Literal, Locator, MarkerSpan, insert_before, set_attr_value, splice,
};

/// Title separators, in the order they are tried.
const SEPARATORS: [&str; 2] = [" - ", ": "];

/// Marker before which the diagram script is placed.
pub const CLOSING_BODY: &str = "</body>";

/// Options for [`transplant`].
#[derive(Debug, Clone)]
pub struct TransplantOptions {
    /// Suffixes stripped from the end of the legacy title.
    pub course_suffixes: Vec<String>,
    /// Appended to the cleaned title in `<title>`; `None` copies the legacy title.
    pub title_suffix: Option<String>,
    pub title_split: TitleSplit,
    /// Locator for the body slot.
    pub slot: MarkerSpan,
    /// Class of the `<header>` holding the lesson `<h1>`.
    pub heading_container_class: String,
    /// Script added when the region uses diagrams.
    pub diagram_asset: String,
    pub diagram_comment: Option<String>,
}

impl TransplantOptions {
    pub fn from_config(migrate: &MigrateConfig, diagram: &DiagramConfig) -> Self {
        Self {
            course_suffixes: migrate.course_suffixes.clone(),
            title_suffix: migrate.title_suffix.clone(),
            title_split: migrate.title_split,
            slot: MarkerSpan::new(
                migrate.slot_open.clone(),
                migrate.slot_close.clone(),
                migrate.slot_follow.clone(),
            ),
            heading_container_class: migrate.heading_container_class.clone(),
            diagram_asset: diagram.asset.clone(),
            diagram_comment: Some(diagram.comment.clone()).filter(|c| !c.is_empty()),
        }
    }
}

impl Default for TransplantOptions {
    fn default() -> Self {
        Self::from_config(&MigrateConfig::default(), &DiagramConfig::default())
    }
}

/// Result of a successful transplant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transplanted {
    /// The updated template text.
    pub text: String,
    /// Optional anchors that were not found; their steps were skipped.
    pub missing: Vec<&'static str>,
    /// Whether the diagram script was added.
    pub diagram_injected: bool,
}

/// Merge `region` into the template `target`.
///
/// Fails with `Transplant` if the body slot is missing and with
/// `AmbiguousAnchor` if any anchor occurs more than once; in both cases no
/// edit is made. Other missing anchors are listed in [`Transplanted::missing`].
pub fn transplant(
    target: &str,
    region: &ContentRegion,
    opts: &TransplantOptions,
) -> Result<Transplanted> {
    if opts.slot.locate_unique(target)?.is_none() {
        return Err(LessonForgeError::transplant(format!(
            "body slot `{}` not found",
            opts.slot.describe()
        )));
    }

    let clean = clean_title(&region.title, &opts.course_suffixes);
    let mut text = target.to_string();
    let mut missing = Vec::new();

    // <title>
    let full_title = match &opts.title_suffix {
        Some(suffix) => format!("{clean}{suffix}"),
        None => region.title.clone(),
    };
    match Element::new("title").locate_unique(&text)? {
        Some(span) => text = splice(&text, span.inner, &full_title),
        None => missing.push("title"),
    }

    // <meta name="description">
    let description = escape_attr(&describe_title(&clean));
    let meta = Element::new("meta").with_attr("name", "description");
    match meta.locate_unique(&text)? {
        Some(span) => match set_attr_value(span.outer_text(&text), "content", &description) {
            Some(tag) => text = splice(&text, span.outer, &tag),
            None => missing.push("meta description"),
        },
        None => missing.push("meta description"),
    }

    // Lesson heading
    let heading = short_title(&clean, opts.title_split);
    let header = Element::new("header").with_class(&opts.heading_container_class);
    let h1 = match header.locate_unique(&text)? {
        Some(header) => Element::new("h1")
            .locate_first(header.inner_text(&text))
            .map(|h| (header.inner.start + h.inner.start)..(header.inner.start + h.inner.end)),
        None => None,
    };
    match h1 {
        Some(range) => text = splice(&text, range, heading),
        None => missing.push("lesson heading"),
    }

    // Body slot
    let slot = opts
        .slot
        .locate_unique(&text)?
        .ok_or_else(|| LessonForgeError::transplant("body slot disappeared during transplant"))?;
    let old_inner = slot.inner_text(&text);
    let trailing = &old_inner[old_inner.trim_end().len()..];
    let trailing = if trailing.is_empty() { "\n" } else { trailing };
    let new_inner = format!("\n{}{trailing}", region.body);
    text = splice(&text, slot.inner, &new_inner);

    // Diagram script
    let mut diagram_injected = false;
    if region.uses_diagram_language && !text.contains(&opts.diagram_asset) {
        match Literal(CLOSING_BODY.into()).locate_unique(&text)? {
            Some(span) => {
                let block = script_block(&opts.diagram_asset, opts.diagram_comment.as_deref());
                text = insert_before(&text, span.outer.start, &block);
                diagram_injected = true;
            }
            None => missing.push("closing body marker"),
        }
    }

    if !missing.is_empty() {
        warn!(?missing, "transplant skipped steps with missing anchors");
    }
    debug!(heading, diagram_injected, "transplant complete");

    Ok(Transplanted {
        text,
        missing,
        diagram_injected,
    })
}

/// Strip any of `suffixes` from the end of `title`, repeatedly.
pub fn clean_title(title: &str, suffixes: &[String]) -> String {
    let mut current = title.trim();
    loop {
        let stripped = suffixes
            .iter()
            .filter(|s| !s.is_empty())
            .find_map(|s| current.strip_suffix(s.as_str()));
        match stripped {
            Some(rest) => current = rest.trim_end(),
            None => return current.to_string(),
        }
    }
}

/// Heading derived from a title: the text after a `" - "` or `": "` separator.
///
/// `" - "` is tried before `": "`. With [`TitleSplit::First`] the text after
/// the first occurrence is used, with [`TitleSplit::Last`] the text after the
/// last. Titles without a separator are returned whole.
pub fn short_title(title: &str, split: TitleSplit) -> &str {
    for sep in SEPARATORS {
        let parts = match split {
            TitleSplit::First => title.split_once(sep),
            TitleSplit::Last => title.rsplit_once(sep),
        };
        if let Some((_, rest)) = parts {
            let rest = rest.trim();
            if !rest.is_empty() {
                return rest;
            }
        }
    }
    title
}

/// Sentence-style description from a title: separators become full stops.
pub fn describe_title(title: &str) -> String {
    let sentence = title.replace(" - ", ". ").replace(':', ".");
    let mut chars = sentence.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => sentence,
    }
}

/// The script reference (with optional leading comment) added for diagrams.
pub fn script_block(src: &str, comment: Option<&str>) -> String {
    match comment {
        Some(comment) => format!("<!-- {comment} -->\n<script src=\"{src}\"></script>"),
        None => format!("<script src=\"{src}\"></script>"),
    }
}

fn escape_attr(value: &str) -> String {
    value.replace('"', "&quot;")
}
