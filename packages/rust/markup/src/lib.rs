//! Markup handling for LessonForge: anchors, region extraction, class
//! normalization, template transplanting, lesson navigation and page
//! inspection.
//!
//! Everything here operates on document text and returns new text; no
//! function touches the filesystem.

pub mod anchor;
pub mod classes;
pub mod extract;
pub mod inspect;
pub mod navigation;
pub mod transplant;

pub use anchor::{
    Element, Literal, Locator, MarkerSpan, Span, indent_lines, insert_before, line_indent,
    splice,
};
pub use classes::{RenameMap, normalize_classes};
pub use extract::{ExtractOptions, UNTITLED, extract_region, mentions};
pub use inspect::{PageScan, file_name, scan_page};
pub use navigation::{CourseMap, NavTarget, Navigated, Neighbours, lesson_title, navigate};
pub use transplant::{
    CLOSING_BODY, TransplantOptions, Transplanted, clean_title, describe_title, script_block,
    short_title, transplant,
};
