//! Application configuration for LessonForge.
//!
//! User config lives at `~/.lessonforge/lessonforge.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LessonForgeError, Result};
use crate::types::TitleSplit;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "lessonforge.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".lessonforge";

// ---------------------------------------------------------------------------
// Config structs (matching lessonforge.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Corpus location and storage policy.
    #[serde(default)]
    pub corpus: CorpusConfig,

    /// Legacy → template migration settings.
    #[serde(default)]
    pub migrate: MigrateConfig,

    /// Diagram asset settings.
    #[serde(default)]
    pub diagram: DiagramConfig,

    /// Class-name normalization table.
    #[serde(default)]
    pub classes: ClassesConfig,

    /// Cross-collection link remapping.
    #[serde(default)]
    pub links: LinksConfig,

    /// Ordered patch rule set.
    #[serde(default)]
    pub patch: PatchConfig,

    /// Course outlines for lesson navigation.
    #[serde(default)]
    pub navigation: NavigationConfig,
}

/// `[corpus]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Directory holding the collections.
    #[serde(default = "default_root")]
    pub root: String,

    /// Markup extension (without the dot) of documents to process.
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Copy each document aside before overwriting it.
    #[serde(default = "default_true")]
    pub backup: bool,

    /// Name of the backup sub-collection inside each collection.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,

    /// Suffix naming a collection's legacy sibling (`module-01` → `module-01_old`).
    #[serde(default = "default_legacy_suffix")]
    pub legacy_suffix: String,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            extension: default_extension(),
            backup: true,
            backup_dir: default_backup_dir(),
            legacy_suffix: default_legacy_suffix(),
        }
    }
}

fn default_root() -> String {
    ".".into()
}
fn default_extension() -> String {
    "html".into()
}
fn default_true() -> bool {
    true
}
fn default_backup_dir() -> String {
    "backups".into()
}
fn default_legacy_suffix() -> String {
    "_old".into()
}

/// `[migrate]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrateConfig {
    /// Course-name suffixes stripped from legacy titles before deriving headings.
    #[serde(default)]
    pub course_suffixes: Vec<String>,

    /// Suffix appended to the cleaned title in the `<title>` element.
    /// When unset the legacy title is copied verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_suffix: Option<String>,

    /// Separator occurrence used for the short heading.
    #[serde(default)]
    pub title_split: TitleSplit,

    /// Drop `<header>` elements found inside the legacy `<main>`.
    #[serde(default)]
    pub strip_main_header: bool,

    /// Opening marker of the lesson body slot.
    #[serde(default = "default_slot_open")]
    pub slot_open: String,

    /// Closing tag of the lesson body slot.
    #[serde(default = "default_slot_close")]
    pub slot_close: String,

    /// Marker that must follow the slot's closing tag.
    #[serde(default = "default_slot_follow")]
    pub slot_follow: String,

    /// Class of the `<header>` holding the lesson `<h1>`.
    #[serde(default = "default_heading_container_class")]
    pub heading_container_class: String,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            course_suffixes: Vec::new(),
            title_suffix: None,
            title_split: TitleSplit::First,
            strip_main_header: false,
            slot_open: default_slot_open(),
            slot_close: default_slot_close(),
            slot_follow: default_slot_follow(),
            heading_container_class: default_heading_container_class(),
        }
    }
}

fn default_slot_open() -> String {
    r#"<div class="lesson-body">"#.into()
}
fn default_slot_close() -> String {
    "</div>".into()
}
fn default_slot_follow() -> String {
    "<!-- Lesson Navigation -->".into()
}
fn default_heading_container_class() -> String {
    "lesson-header".into()
}

/// `[diagram]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagramConfig {
    /// Case-insensitive keyword marking diagram usage in legacy pages.
    #[serde(default = "default_diagram_keyword")]
    pub keyword: String,

    /// Canonical path of the diagram-rendering script.
    #[serde(default = "default_diagram_asset")]
    pub asset: String,

    /// Comment placed before the injected script.
    #[serde(default = "default_diagram_comment")]
    pub comment: String,

    /// Asset file names that were renamed upstream.
    #[serde(default = "default_retired_assets")]
    pub retired_assets: Vec<String>,

    /// Classes that mark diagram content in a page.
    #[serde(default = "default_content_classes")]
    pub content_classes: Vec<String>,
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self {
            keyword: default_diagram_keyword(),
            asset: default_diagram_asset(),
            comment: default_diagram_comment(),
            retired_assets: default_retired_assets(),
            content_classes: default_content_classes(),
        }
    }
}

fn default_diagram_keyword() -> String {
    "mermaid".into()
}
fn default_diagram_asset() -> String {
    "/assets/js/mermaid-universal-fix.js".into()
}
fn default_diagram_comment() -> String {
    "Universal Mermaid Fix".into()
}
fn default_retired_assets() -> Vec<String> {
    vec!["mermaid-fix-v2.js".into()]
}
fn default_content_classes() -> Vec<String> {
    vec![
        "mermaid".into(),
        "mermaid-container".into(),
        "mermaid-diagram".into(),
    ]
}

/// `[classes]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassesConfig {
    /// Legacy class token → canonical class token.
    #[serde(default)]
    pub rename: BTreeMap<String, String>,

    /// Hyphenate any `_`-separated token missing from `rename`.
    #[serde(default)]
    pub hyphenate_underscores: bool,
}

/// `[links]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinksConfig {
    /// Old path prefix → new path prefix.
    #[serde(default)]
    pub remap: BTreeMap<String, String>,
}

/// `[navigation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    /// Element whose interior holds the previous/next links.
    #[serde(default = "default_pager")]
    pub pager: ElementAnchor,

    /// Element whose interior holds the current session's lesson list.
    /// Left untouched when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu: Option<ElementAnchor>,

    /// One ordered outline per collection.
    #[serde(default)]
    pub courses: Vec<CourseOutline>,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            pager: default_pager(),
            menu: None,
            courses: Vec::new(),
        }
    }
}

fn default_pager() -> ElementAnchor {
    ElementAnchor {
        tag: "nav".into(),
        class: "lesson-nav".into(),
    }
}

/// An element picked by tag and class token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementAnchor {
    pub tag: String,
    pub class: String,
}

/// Reading order of one collection, grouped into sessions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourseOutline {
    pub collection: String,

    /// Link prefix for lessons (defaults to `/<collection>/`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_href: Option<String>,

    /// Target of the first lesson's "previous" link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_first: Option<NavLink>,

    /// Target of the last lesson's "next" link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_last: Option<NavLink>,

    #[serde(default)]
    pub sessions: Vec<OutlineSession>,
}

/// A titled group of consecutive lessons.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutlineSession {
    pub title: String,
    #[serde(default)]
    pub lessons: Vec<OutlineLesson>,
}

/// One lesson document. Without a title, one is derived from the file name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutlineLesson {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// A fixed link target outside the outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavLink {
    pub href: String,
    pub title: String,
}

/// `[patch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchConfig {
    /// Rules applied in order to every document.
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            rules: vec![
                RuleSpec::MigrateReference {
                    name: None,
                    from: "mermaid-fix-v2.js".into(),
                    to: "mermaid-universal-fix.js".into(),
                    comment: Some(default_diagram_comment()),
                },
                RuleSpec::Inject {
                    name: Some("diagram-script".into()),
                    script: Some(default_diagram_asset()),
                    stylesheet: None,
                    comment: Some(default_diagram_comment()),
                    anchor: default_inject_anchor(),
                    position: InjectPosition::Before,
                    only_if: Some(r#"class="[^"]*\bmermaid\b"#.into()),
                },
            ],
        }
    }
}

/// Where an injected snippet goes relative to its anchor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectPosition {
    #[default]
    Before,
    After,
}

/// One `[[patch.rules]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleSpec {
    /// Keep exactly one script or stylesheet reference next to an anchor.
    Inject {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        script: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stylesheet: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        comment: Option<String>,
        #[serde(default = "default_inject_anchor")]
        anchor: String,
        #[serde(default)]
        position: InjectPosition,
        /// Regex the document must match for the rule to act.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        only_if: Option<String>,
    },
    /// Replace every literal occurrence of `from` with `to`.
    Replace {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        from: String,
        to: String,
    },
    /// Delete every match of a regex.
    Remove {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        pattern: String,
    },
    /// Retarget a renamed asset and clean up duplicates left by older runs.
    MigrateReference {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        from: String,
        to: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        comment: Option<String>,
    },
    /// Escape markup inside `<pre><code class="language-…">` blocks.
    EscapeCode {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        language: String,
    },
    /// Collapse runs of blank lines.
    CollapseBlankLines {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Apply the `[classes]` table to the whole document.
    NormalizeClasses {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

fn default_inject_anchor() -> String {
    "</body>".into()
}

impl AppConfig {
    /// Reject settings the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.corpus.extension.trim().is_empty() {
            return Err(LessonForgeError::config("corpus.extension must not be empty"));
        }
        if self.corpus.legacy_suffix.is_empty() {
            return Err(LessonForgeError::config(
                "corpus.legacy_suffix must not be empty",
            ));
        }
        let markers = [
            ("migrate.slot_open", &self.migrate.slot_open),
            ("migrate.slot_close", &self.migrate.slot_close),
            ("migrate.slot_follow", &self.migrate.slot_follow),
            ("diagram.asset", &self.diagram.asset),
        ];
        for (field, value) in markers {
            if value.trim().is_empty() {
                return Err(LessonForgeError::config(format!("{field} must not be empty")));
            }
        }
        let anchors = std::iter::once(&self.navigation.pager).chain(&self.navigation.menu);
        for anchor in anchors {
            if anchor.tag.trim().is_empty() || anchor.class.trim().is_empty() {
                return Err(LessonForgeError::config(
                    "navigation anchors need a tag and a class",
                ));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.lessonforge/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LessonForgeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.lessonforge/lessonforge.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LessonForgeError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        LessonForgeError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Write a default config file to `path` (or the user config location).
/// Returns the path to the created file.
pub fn init_config(path: Option<&Path>) -> Result<PathBuf> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| LessonForgeError::io(dir, e))?;
    }

    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LessonForgeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LessonForgeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
