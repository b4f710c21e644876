//! Shared types, error model, and configuration for LessonForge.
//!
//! This crate is the foundation depended on by all other LessonForge crates.
//! It provides:
//! - [`LessonForgeError`]: the unified error type and its [`ErrorKind`] taxonomy
//! - Domain types ([`DocKey`], [`ContentRegion`], [`TitleSplit`])
//! - Configuration ([`AppConfig`], [`RuleSpec`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ClassesConfig, CorpusConfig, CourseOutline, DiagramConfig, ElementAnchor,
    InjectPosition, LinksConfig, MigrateConfig, NavLink, NavigationConfig, OutlineLesson,
    OutlineSession, PatchConfig, RuleSpec, config_dir, config_file_path, init_config, load_config,
    load_config_from,
};
pub use error::{ErrorKind, LessonForgeError, Result};
pub use types::{ContentRegion, DocKey, TitleSplit};
