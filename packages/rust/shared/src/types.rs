//! Core domain types for LessonForge corpora.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DocKey
// ---------------------------------------------------------------------------

/// Identifies one document: a file `name` inside a `collection` directory.
///
/// Collections may be nested (`module-01/backups`); the separator is always `/`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocKey {
    /// Collection (directory) relative to the corpus root.
    pub collection: String,
    /// File name including the extension.
    pub name: String,
}

impl DocKey {
    pub fn new(collection: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            name: name.into(),
        }
    }

    /// The same document name inside another collection.
    pub fn with_collection(&self, collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            name: self.name.clone(),
        }
    }

    /// File name without its final extension.
    pub fn stem(&self) -> &str {
        match self.name.rfind('.') {
            Some(idx) if idx > 0 => &self.name[..idx],
            _ => &self.name,
        }
    }

    /// Final extension including the leading dot, or `""`.
    pub fn extension(&self) -> &str {
        match self.name.rfind('.') {
            Some(idx) if idx > 0 => &self.name[idx..],
            _ => "",
        }
    }
}

impl std::fmt::Display for DocKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.name)
    }
}

// ---------------------------------------------------------------------------
// ContentRegion
// ---------------------------------------------------------------------------

/// The meaningful part of a legacy lesson page.
///
/// Extracted once per source document and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRegion {
    /// Text of the `<title>` element, or `"Untitled"`.
    pub title: String,
    /// Markup of the main content container, trimmed at both ends.
    pub body: String,
    /// Whether the raw page mentions the diagram language anywhere.
    pub uses_diagram_language: bool,
}

// ---------------------------------------------------------------------------
// TitleSplit
// ---------------------------------------------------------------------------

/// Which separator occurrence a lesson heading is derived from.
///
/// Titles look like `Course - Lesson` or `Section: Lesson`. Ambiguous titles
/// such as `Intro - Widgets: Building Blocks` give different headings per mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleSplit {
    /// Everything after the first separator.
    #[default]
    First,
    /// Everything after the last separator.
    Last,
}
