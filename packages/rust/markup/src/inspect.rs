//! Read-only page inspection for audits.

use std::sync::LazyLock;

use scraper::{Html, Selector};

static SCRIPT_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script[src]").expect("valid selector"));

static CLASSED_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[class]").expect("valid selector"));

/// What an audit needs to know about one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageScan {
    /// `src` of every external script, in document order.
    pub script_srcs: Vec<String>,
    /// Number of elements carrying one of the diagram content classes.
    pub diagram_elements: usize,
}

impl PageScan {
    /// Script sources whose file name is `asset_name` (path ignored).
    pub fn scripts_named<'a>(&'a self, asset_name: &'a str) -> impl Iterator<Item = &'a str> {
        self.script_srcs
            .iter()
            .map(String::as_str)
            .filter(move |src| file_name(src) == asset_name)
    }
}

/// Parse `raw` and collect script references and diagram content.
pub fn scan_page(raw: &str, content_classes: &[String]) -> PageScan {
    let doc = Html::parse_document(raw);

    let script_srcs = doc
        .select(&SCRIPT_SEL)
        .filter_map(|el| el.value().attr("src"))
        .map(|src| src.trim().to_string())
        .collect();

    let diagram_elements = doc
        .select(&CLASSED_SEL)
        .filter(|el| {
            el.value()
                .classes()
                .any(|c| content_classes.iter().any(|want| want == c))
        })
        .count();

    PageScan {
        script_srcs,
        diagram_elements,
    }
}

/// Last path segment of a URL or path, without query or fragment.
pub fn file_name(src: &str) -> &str {
    let path = src.split(['?', '#']).next().unwrap_or(src);
    path.rsplit('/').next().unwrap_or(path)
}
