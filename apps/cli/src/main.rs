//! LessonForge CLI: batch maintenance for static HTML lesson corpora.
//!
//! Migrates legacy lessons into new templates, applies idempotent patch
//! rules, remaps links between modules, rebuilds lesson navigation and
//! audits diagram assets.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
