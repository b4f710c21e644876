//! Region extraction from legacy lesson pages.

use tracing::debug;

use lessonforge_shared::{ContentRegion, LessonForgeError, Result};

use crate::anchor::{Element, Locator, Span, remove_spans};

/// Title used when a legacy page has no (or an empty) `<title>`.
pub const UNTITLED: &str = "Untitled";

/// Options for [`extract_region`].
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Keyword whose presence anywhere in the page marks diagram usage.
    pub diagram_keyword: String,
    /// Drop `<header>` elements that sit inside `<main>`.
    pub strip_main_header: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            diagram_keyword: "mermaid".into(),
            strip_main_header: false,
        }
    }
}

/// Pull the title, main content and diagram flag out of a legacy page.
///
/// Content comes from the first `<main>` element, or failing that from
/// `<body>` with its `<header>`/`<footer>` elements removed. Inner
/// whitespace is left as authored; only the ends are trimmed.
pub fn extract_region(raw: &str, opts: &ExtractOptions) -> Result<ContentRegion> {
    let title = Element::new("title")
        .locate_first(raw)
        .map(|span| span.inner_text(raw).trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    let body = if let Some(main) = Element::new("main").locate_first(raw) {
        let inner = main.inner_text(raw);
        if opts.strip_main_header {
            strip_elements(inner, &["header"])
        } else {
            inner.to_string()
        }
    } else if let Some(body) = Element::new("body").locate_first(raw) {
        strip_elements(body.inner_text(raw), &["header", "footer"])
    } else {
        return Err(LessonForgeError::extraction(
            "no <main> or <body> element found",
        ));
    };

    let uses_diagram_language = mentions(raw, &opts.diagram_keyword);

    debug!(
        title = %title,
        body_len = body.len(),
        uses_diagram_language,
        "extracted content region"
    );

    Ok(ContentRegion {
        title,
        body: body.trim().to_string(),
        uses_diagram_language,
    })
}

/// Case-insensitive substring test. An empty keyword never matches.
pub fn mentions(raw: &str, keyword: &str) -> bool {
    !keyword.is_empty() && raw.to_lowercase().contains(&keyword.to_lowercase())
}

/// Remove every (outermost) element with one of `tags` from a fragment.
fn strip_elements(fragment: &str, tags: &[&str]) -> String {
    let mut spans: Vec<Span> = tags
        .iter()
        .flat_map(|tag| Element::new(*tag).locate_all(fragment))
        .collect();
    spans.sort_by_key(|s| s.outer.start);
    remove_spans(fragment, &spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> ExtractOptions {
        ExtractOptions::default()
    }

    #[test]
    fn extracts_title_and_main() {
        let html = "<html><head><title>  PHP Basics - Variables </title></head>\
            <body><header>Site</header><main>\n  <section class=\"intro\"><p>Hi</p></section>\n</main></body></html>";
        let region = extract_region(html, &opts()).unwrap();
        assert_eq!(region.title, "PHP Basics - Variables");
        assert_eq!(region.body, "<section class=\"intro\"><p>Hi</p></section>");
        assert!(!region.uses_diagram_language);
    }

    #[test]
    fn missing_title_defaults_to_untitled() {
        let html = "<html><body><main><p>x</p></main></body></html>";
        assert_eq!(extract_region(html, &opts()).unwrap().title, UNTITLED);

        let empty = "<html><head><title> </title></head><body><main>x</main></body></html>";
        assert_eq!(extract_region(empty, &opts()).unwrap().title, UNTITLED);
    }

    #[test]
    fn body_fallback_drops_header_and_footer() {
        let html = "<html><head><title>T</title></head><body>\
            <header><h1>Banner</h1></header>\
            <section><p>Lesson text</p></section>\
            <footer><p>Copyright</p></footer>\
            </body></html>";
        let region = extract_region(html, &opts()).unwrap();
        assert_eq!(region.body, "<section><p>Lesson text</p></section>");
    }

    #[test]
    fn main_header_kept_unless_requested() {
        let html = "<main><header><h1>Dup</h1></header><p>Body</p></main>";
        let kept = extract_region(html, &opts()).unwrap();
        assert!(kept.body.contains("Dup"));

        let stripped = extract_region(
            html,
            &ExtractOptions {
                strip_main_header: true,
                ..opts()
            },
        )
        .unwrap();
        assert_eq!(stripped.body, "<p>Body</p>");
    }

    #[test]
    fn no_container_is_extraction_failure() {
        let err = extract_region("<title>Only a title</title>", &opts()).unwrap_err();
        assert!(matches!(err, LessonForgeError::Extraction { .. }));
    }

    #[test]
    fn diagram_detection_is_case_insensitive() {
        let html = "<html><head><script src=\"/js/Mermaid.min.js\"></script></head>\
            <body><main><p>x</p></main></body></html>";
        assert!(extract_region(html, &opts()).unwrap().uses_diagram_language);
        assert!(!mentions(html, ""));
    }

    #[test]
    fn inner_whitespace_is_preserved() {
        let html = "<main>\n<pre>\n  line 1\n\n  line 2\n</pre>\n</main>";
        let region = extract_region(html, &opts()).unwrap();
        assert_eq!(region.body, "<pre>\n  line 1\n\n  line 2\n</pre>");
    }
}
