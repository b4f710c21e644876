//! Lesson navigation derived from an ordered course outline.
//!
//! A [`CourseMap`] flattens one outline into reading order and renders, for
//! any lesson in it, the previous/next pager and the session menu. Both are
//! written into the interior of an element anchor, so regenerating them from
//! the same outline always yields the same text.

use std::collections::HashMap;

use tracing::debug;

use lessonforge_shared::{CourseOutline, LessonForgeError, NavLink, OutlineSession, Result};

use crate::anchor::{Element, Locator, Span, indent_lines, line_indent, splice};

/// A rendered link: where it points and what it says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavTarget {
    pub href: String,
    pub title: String,
}

impl From<&NavLink> for NavTarget {
    fn from(link: &NavLink) -> Self {
        Self {
            href: link.href.clone(),
            title: link.title.clone(),
        }
    }
}

/// Neighbours of one lesson in reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighbours {
    pub prev: Option<NavTarget>,
    pub next: Option<NavTarget>,
}

/// Result of regenerating one document's navigation.
#[derive(Debug, Clone)]
pub struct Navigated {
    pub text: String,
    /// Anchors that were not found in the document.
    pub missing: Vec<&'static str>,
}

/// Position of a lesson: session index and index within the session.
type Slot = (usize, usize);

// ---------------------------------------------------------------------------
// CourseMap
// ---------------------------------------------------------------------------

/// One collection's outline, indexed by lesson file name.
#[derive(Debug, Clone)]
pub struct CourseMap {
    outline: CourseOutline,
    base_href: String,
    order: Vec<Slot>,
    positions: HashMap<String, usize>,
}

impl CourseMap {
    /// Index `outline`. Empty collection names and lessons listed twice are
    /// configuration errors, since reading order would be ambiguous.
    pub fn new(outline: &CourseOutline) -> Result<Self> {
        let collection = outline.collection.trim();
        if collection.is_empty() {
            return Err(LessonForgeError::config(
                "navigation course has an empty collection",
            ));
        }

        let mut order = Vec::new();
        let mut positions = HashMap::new();
        for (s, session) in outline.sessions.iter().enumerate() {
            for (l, lesson) in session.lessons.iter().enumerate() {
                if lesson.file.trim().is_empty() {
                    return Err(LessonForgeError::config(format!(
                        "course '{collection}' has a lesson without a file"
                    )));
                }
                if positions.insert(lesson.file.clone(), order.len()).is_some() {
                    return Err(LessonForgeError::config(format!(
                        "lesson '{}' appears twice in course '{collection}'",
                        lesson.file
                    )));
                }
                order.push((s, l));
            }
        }

        let base_href = outline
            .base_href
            .clone()
            .unwrap_or_else(|| format!("/{collection}/"));
        debug!(collection, lessons = order.len(), "indexed course outline");

        Ok(Self {
            outline: outline.clone(),
            base_href,
            order,
            positions,
        })
    }

    pub fn collection(&self) -> &str {
        self.outline.collection.trim()
    }

    pub fn contains(&self, file: &str) -> bool {
        self.positions.contains_key(file)
    }

    /// Lesson files in reading order.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|&slot| self.file_at(slot))
    }

    /// Previous and next lesson of `file`, falling back to the outline's
    /// outside links at either end. `None` when `file` is not in the outline.
    pub fn neighbours(&self, file: &str) -> Option<Neighbours> {
        let at = *self.positions.get(file)?;
        let prev = match at.checked_sub(1) {
            Some(i) => Some(self.target(self.order[i])),
            None => self.outline.before_first.as_ref().map(NavTarget::from),
        };
        let next = match self.order.get(at + 1) {
            Some(&slot) => Some(self.target(slot)),
            None => self.outline.after_last.as_ref().map(NavTarget::from),
        };
        Some(Neighbours { prev, next })
    }

    /// Pager markup for `file`: a previous and a next link, when they exist.
    pub fn render_pager(&self, file: &str) -> Option<String> {
        let Neighbours { prev, next } = self.neighbours(file)?;
        let mut out = Vec::new();
        for (target, label, class) in [(prev, "Previous", "prev"), (next, "Next", "next")] {
            if let Some(t) = target {
                out.push(format!(
                    "<a class=\"lesson-nav-button {class}\" href=\"{}\">\n    <small>{label}</small>\n    <span>{}</span>\n</a>",
                    escape_html(&t.href),
                    escape_html(&t.title)
                ));
            }
        }
        Some(out.join("\n"))
    }

    /// Session menu markup for `file`: the lessons of its session with the
    /// current one marked active, then links to the neighbouring sessions.
    pub fn render_menu(&self, file: &str) -> Option<String> {
        let (s, _) = self.order[*self.positions.get(file)?];
        let session = &self.outline.sessions[s];

        let mut lines = vec![
            "<nav class=\"session-nav\">".to_string(),
            format!(
                "    <h4 class=\"sidebar-section-title\">{}</h4>",
                escape_html(&session.title)
            ),
            "    <ul class=\"sidebar-menu\">".to_string(),
        ];
        for lesson in &session.lessons {
            let href = escape_html(&self.href(&lesson.file));
            let title = escape_html(&lesson_title(&lesson.file, lesson.title.as_deref()));
            if lesson.file == file {
                lines.push(format!(
                    "        <li class=\"active\"><a class=\"sidebar-link active\" href=\"{href}\" aria-current=\"page\">{title}</a></li>"
                ));
            } else {
                lines.push(format!(
                    "        <li><a class=\"sidebar-link\" href=\"{href}\">{title}</a></li>"
                ));
            }
        }
        lines.push("    </ul>".to_string());

        let prev = s.checked_sub(1).and_then(|i| self.session_entry(i));
        let next = self.session_entry(s + 1);
        if prev.is_some() || next.is_some() {
            lines.push("    <ul class=\"sidebar-menu session-links\">".to_string());
            if let Some(t) = prev {
                lines.push(format!(
                    "        <li><a class=\"sidebar-link prev-session\" href=\"{}\">&larr; {}</a></li>",
                    escape_html(&t.href),
                    escape_html(&t.title)
                ));
            }
            if let Some(t) = next {
                lines.push(format!(
                    "        <li><a class=\"sidebar-link next-session\" href=\"{}\">{} &rarr;</a></li>",
                    escape_html(&t.href),
                    escape_html(&t.title)
                ));
            }
            lines.push("    </ul>".to_string());
        }
        lines.push("</nav>".to_string());
        Some(lines.join("\n"))
    }

    fn file_at(&self, (s, l): Slot) -> &str {
        &self.outline.sessions[s].lessons[l].file
    }

    fn href(&self, file: &str) -> String {
        format!("{}{file}", self.base_href)
    }

    fn target(&self, (s, l): Slot) -> NavTarget {
        let lesson = &self.outline.sessions[s].lessons[l];
        NavTarget {
            href: self.href(&lesson.file),
            title: lesson_title(&lesson.file, lesson.title.as_deref()),
        }
    }

    /// First lesson of session `s`, titled with the session.
    fn session_entry(&self, s: usize) -> Option<NavTarget> {
        let session: &OutlineSession = self.outline.sessions.get(s)?;
        let first = session.lessons.first()?;
        Some(NavTarget {
            href: self.href(&first.file),
            title: session.title.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Document rewriting
// ---------------------------------------------------------------------------

/// Regenerate the pager (and, when given, the session menu) of `file`.
///
/// Returns `Ok(None)` when `file` is not in the outline. A missing anchor is
/// reported in [`Navigated::missing`]; an anchor present more than once is
/// `AmbiguousAnchor`.
pub fn navigate(
    text: &str,
    map: &CourseMap,
    file: &str,
    pager: &Element,
    menu: Option<&Element>,
) -> Result<Option<Navigated>> {
    let (Some(pager_html), Some(menu_html)) = (map.render_pager(file), map.render_menu(file))
    else {
        return Ok(None);
    };

    let mut text = text.to_string();
    let mut missing = Vec::new();

    match pager.locate_unique(&text)? {
        Some(span) => text = fill(&text, &span, &pager_html),
        None => missing.push("lesson pager"),
    }
    if let Some(menu) = menu {
        match menu.locate_unique(&text)? {
            Some(span) => text = fill(&text, &span, &menu_html),
            None => missing.push("session menu"),
        }
    }

    Ok(Some(Navigated { text, missing }))
}

/// Replace the interior of `span` with `content`, one level deeper than the
/// element's own line.
fn fill(text: &str, span: &Span, content: &str) -> String {
    let indent = line_indent(text, span.outer.start).map_or("", |(_, i)| i);
    let body = indent_lines(content, &format!("{indent}    "));
    splice(text, span.inner.clone(), &format!("\n{body}\n{indent}"))
}

/// The configured title, or one derived from the file name
/// (`css_box_model.html` → `Css Box Model`).
pub fn lesson_title(file: &str, title: Option<&str>) -> String {
    if let Some(t) = title.filter(|t| !t.trim().is_empty()) {
        return t.trim().to_string();
    }
    let stem = file.rsplit_once('.').map_or(file, |(stem, _)| stem);
    stem.split(['_', '-'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lessonforge_shared::{OutlineLesson, OutlineSession};

    fn lesson(file: &str, title: Option<&str>) -> OutlineLesson {
        OutlineLesson {
            file: file.into(),
            title: title.map(Into::into),
        }
    }

    fn outline() -> CourseOutline {
        CourseOutline {
            collection: "module-01".into(),
            base_href: None,
            before_first: Some(NavLink {
                href: "/module-01/index.html".into(),
                title: "Module Overview".into(),
            }),
            after_last: None,
            sessions: vec![
                OutlineSession {
                    title: "Session 1: Basics".into(),
                    lessons: vec![
                        lesson("intro.html", Some("Course Introduction")),
                        lesson("how_web_works.html", None),
                    ],
                },
                OutlineSession {
                    title: "Session 2: HTML".into(),
                    lessons: vec![lesson("tags.html", Some("Tags & Attributes"))],
                },
            ],
        }
    }

    const PAGE: &str = "<body>\n    <aside class=\"sidebar\">\n        <nav><a href=\"/old\">Old</a></nav>\n    </aside>\n    <nav class=\"lesson-nav\">\n        <a href=\"/module-01/previous.html\">Previous</a>\n    </nav>\n</body>";

    fn pager() -> Element {
        Element::new("nav").with_class("lesson-nav")
    }

    fn menu() -> Element {
        Element::new("aside").with_class("sidebar")
    }

    #[test]
    fn neighbours_follow_reading_order() {
        let map = CourseMap::new(&outline()).unwrap();
        let files: Vec<_> = map.files().collect();
        assert_eq!(files, vec!["intro.html", "how_web_works.html", "tags.html"]);

        let first = map.neighbours("intro.html").unwrap();
        assert_eq!(first.prev.unwrap().title, "Module Overview");
        assert_eq!(first.next.unwrap().href, "/module-01/how_web_works.html");

        // Crosses the session boundary.
        let middle = map.neighbours("how_web_works.html").unwrap();
        assert_eq!(middle.next.unwrap().title, "Tags & Attributes");

        let last = map.neighbours("tags.html").unwrap();
        assert_eq!(last.prev.unwrap().title, "How Web Works");
        assert!(last.next.is_none());

        assert!(map.neighbours("unknown.html").is_none());
    }

    #[test]
    fn duplicate_lesson_is_config_error() {
        let mut o = outline();
        o.sessions[1].lessons.push(lesson("intro.html", None));
        let err = CourseMap::new(&o).unwrap_err();
        assert!(matches!(err, LessonForgeError::Config { .. }));
    }

    #[test]
    fn pager_omits_absent_ends_and_escapes() {
        let map = CourseMap::new(&outline()).unwrap();
        let html = map.render_pager("tags.html").unwrap();
        assert!(html.contains("lesson-nav-button prev"));
        assert!(!html.contains("lesson-nav-button next"));

        let html = map.render_pager("how_web_works.html").unwrap();
        assert!(html.contains("<span>Tags &amp; Attributes</span>"));
    }

    #[test]
    fn menu_marks_current_lesson_and_links_sessions() {
        let map = CourseMap::new(&outline()).unwrap();
        let html = map.render_menu("how_web_works.html").unwrap();
        assert!(html.contains("<h4 class=\"sidebar-section-title\">Session 1: Basics</h4>"));
        assert!(html.contains(
            "<li class=\"active\"><a class=\"sidebar-link active\" href=\"/module-01/how_web_works.html\" aria-current=\"page\">How Web Works</a></li>"
        ));
        assert!(html.contains("<li><a class=\"sidebar-link\" href=\"/module-01/intro.html\">Course Introduction</a></li>"));
        assert!(html.contains("next-session\" href=\"/module-01/tags.html\">Session 2: HTML &rarr;"));
        assert!(!html.contains("prev-session"));
        assert!(!html.contains("tags.html\">Tags"));
    }

    #[test]
    fn navigate_rewrites_both_anchors_idempotently() {
        let map = CourseMap::new(&outline()).unwrap();
        let once = navigate(PAGE, &map, "intro.html", &pager(), Some(&menu()))
            .unwrap()
            .unwrap();
        assert!(once.missing.is_empty());
        assert!(!once.text.contains("/old"));
        assert!(!once.text.contains("previous.html"));
        assert!(once.text.contains(
            "    <nav class=\"lesson-nav\">\n        <a class=\"lesson-nav-button prev\" href=\"/module-01/index.html\">\n            <small>Previous</small>"
        ));
        assert!(once.text.ends_with("        </a>\n    </nav>\n</body>"));

        let twice = navigate(&once.text, &map, "intro.html", &pager(), Some(&menu()))
            .unwrap()
            .unwrap();
        assert_eq!(twice.text, once.text);
    }

    #[test]
    fn navigate_reports_missing_anchors() {
        let map = CourseMap::new(&outline()).unwrap();
        let out = navigate("<body></body>", &map, "intro.html", &pager(), Some(&menu()))
            .unwrap()
            .unwrap();
        assert_eq!(out.missing, vec!["lesson pager", "session menu"]);
        assert_eq!(out.text, "<body></body>");

        assert!(
            navigate(PAGE, &map, "stray.html", &pager(), None)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn duplicated_pager_is_ambiguous() {
        let map = CourseMap::new(&outline()).unwrap();
        let page = format!("{PAGE}\n<nav class=\"lesson-nav\"></nav>");
        let err = navigate(&page, &map, "intro.html", &pager(), None).unwrap_err();
        assert!(matches!(err, LessonForgeError::AmbiguousAnchor { count: 2, .. }));
    }

    #[test]
    fn derived_titles() {
        assert_eq!(lesson_title("css_box_model.html", None), "Css Box Model");
        assert_eq!(lesson_title("mobile-first.html", Some("  ")), "Mobile First");
        assert_eq!(lesson_title("x.html", Some(" Given ")), "Given");
    }
}
