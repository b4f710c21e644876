//! CLI command definitions, routing, and tracing setup.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::info;

use lessonforge_core::{
    AuditReport, Auditor, BatchReport, Migrator, Navigator, Patcher, ProgressReporter, Relinker,
    RunOptions, resolve_collections,
};
use lessonforge_shared::{AppConfig, DocKey, init_config, load_config, load_config_from};
use lessonforge_store::DocumentStore;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// LessonForge: keep a static lesson corpus migrated and patched.
#[derive(Parser)]
#[command(
    name = "lessonforge",
    version,
    about = "Migrate, patch, relink, navigate and audit a corpus of static HTML lessons.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.lessonforge/lessonforge.toml).
    #[arg(long, env = "LESSONFORGE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Corpus root directory (overrides `corpus.root`).
    #[arg(long, env = "LESSONFORGE_ROOT", global = true)]
    pub root: Option<PathBuf>,

    /// Print the final report as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Flags shared by tasks that write documents.
#[derive(clap::Args, Debug, Clone)]
pub(crate) struct WriteFlags {
    /// Show what would change without writing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Do not ask for confirmation.
    #[arg(short, long)]
    pub yes: bool,

    /// Skip backups even if `corpus.backup` is enabled.
    #[arg(long)]
    pub no_backup: bool,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Transplant legacy lessons into the template documents of a collection.
    Migrate {
        /// Target collection; its legacy sibling is `<collection><legacy_suffix>`.
        collection: String,

        #[command(flatten)]
        flags: WriteFlags,
    },

    /// Apply the configured patch rules.
    Patch {
        /// Collections to patch (defaults to every non-legacy collection).
        collections: Vec<String>,

        #[command(flatten)]
        flags: WriteFlags,
    },

    /// Rewrite link prefixes using `[links.remap]`.
    Relink {
        /// Collections to relink (defaults to every non-legacy collection).
        collections: Vec<String>,

        #[command(flatten)]
        flags: WriteFlags,
    },

    /// Rebuild lesson pagers and session menus from `[navigation]` outlines.
    Navigate {
        /// Collections to update (defaults to every outlined collection).
        collections: Vec<String>,

        #[command(flatten)]
        flags: WriteFlags,
    },

    /// Report diagram asset problems without changing anything.
    Audit {
        /// Collections to audit (defaults to every non-legacy collection).
        collections: Vec<String>,
    },

    /// List the collections of the corpus.
    List,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so reports on
/// stdout stay machine-readable.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "lessonforge=info",
        1 => "lessonforge=debug",
        _ => "lessonforge=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let json = cli.json;
    match cli.command {
        Command::Migrate { collection, flags } => {
            let (config, store) = open_corpus(cli.config, cli.root)?;
            cmd_migrate(&store, &config, &collection, &flags, json)
        }
        Command::Patch { collections, flags } => {
            let (config, store) = open_corpus(cli.config, cli.root)?;
            cmd_patch(&store, &config, &collections, &flags, json)
        }
        Command::Relink { collections, flags } => {
            let (config, store) = open_corpus(cli.config, cli.root)?;
            cmd_relink(&store, &config, &collections, &flags, json)
        }
        Command::Navigate { collections, flags } => {
            let (config, store) = open_corpus(cli.config, cli.root)?;
            cmd_navigate(&store, &config, &collections, &flags, json)
        }
        Command::Audit { collections } => {
            let (config, store) = open_corpus(cli.config, cli.root)?;
            cmd_audit(&store, &config, &collections, json)
        }
        Command::List => {
            let (config, store) = open_corpus(cli.config, cli.root)?;
            cmd_list(&store, &config)
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(cli.config),
            ConfigAction::Show => cmd_config_show(&resolve_config(cli.config, cli.root)?),
        },
    }
}

/// Resolve the config and open its corpus. A missing root is fatal.
fn open_corpus(path: Option<PathBuf>, root: Option<PathBuf>) -> Result<(AppConfig, DocumentStore)> {
    let config = resolve_config(path, root)?;
    let store = DocumentStore::from_config(&config.corpus)?;
    info!(root = %store.root().display(), "opened corpus");
    Ok((config, store))
}

/// Load the config file and apply flag overrides.
fn resolve_config(path: Option<PathBuf>, root: Option<PathBuf>) -> Result<AppConfig> {
    let mut config = match path {
        Some(p) => load_config_from(&p)?,
        None => load_config()?,
    };
    if let Some(root) = root {
        config.corpus.root = root.to_string_lossy().to_string();
    }
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_migrate(
    store: &DocumentStore,
    config: &AppConfig,
    collection: &str,
    flags: &WriteFlags,
    json: bool,
) -> Result<()> {
    let migrator = Migrator::new(store, config)?;
    let sources = migrator.sources(collection)?;
    let prompt = format!(
        "Migrate {} document(s) from '{}' into '{collection}'?",
        sources.len(),
        migrator.legacy_collection(collection),
    );
    if !confirm(&prompt, flags)? {
        println!("Aborted.");
        return Ok(());
    }

    info!(collection, dry_run = flags.dry_run, "migrating collection");
    let progress = CliProgress::new(json);
    let report = migrator.run(collection, run_options(config, flags), &progress)?;
    finish_batch(&report, json)
}

fn cmd_patch(
    store: &DocumentStore,
    config: &AppConfig,
    requested: &[String],
    flags: &WriteFlags,
    json: bool,
) -> Result<()> {
    let collections = resolve_collections(store, requested, &config.corpus.legacy_suffix)?;
    let patcher = Patcher::new(store, config)?;
    let rules: Vec<&str> = patcher.rules().names().collect();
    let prompt = format!(
        "Apply {} rule(s) [{}] to {} collection(s)?",
        rules.len(),
        rules.join(", "),
        collections.len()
    );
    if !confirm(&prompt, flags)? {
        println!("Aborted.");
        return Ok(());
    }

    let progress = CliProgress::new(json);
    let report = patcher.run(&collections, run_options(config, flags), &progress)?;
    finish_batch(&report, json)
}

fn cmd_relink(
    store: &DocumentStore,
    config: &AppConfig,
    requested: &[String],
    flags: &WriteFlags,
    json: bool,
) -> Result<()> {
    let collections = resolve_collections(store, requested, &config.corpus.legacy_suffix)?;
    let relinker = Relinker::new(store, config)?;
    let prompt = format!(
        "Remap {} link prefix(es) in {} collection(s)?",
        config.links.remap.len(),
        collections.len()
    );
    if !confirm(&prompt, flags)? {
        println!("Aborted.");
        return Ok(());
    }

    let progress = CliProgress::new(json);
    let report = relinker.run(&collections, run_options(config, flags), &progress)?;
    finish_batch(&report, json)
}

fn cmd_navigate(
    store: &DocumentStore,
    config: &AppConfig,
    requested: &[String],
    flags: &WriteFlags,
    json: bool,
) -> Result<()> {
    let navigator = Navigator::new(store, &config.navigation)?;
    let outlined: Vec<&str> = navigator.collections().collect();
    if outlined.is_empty() {
        return Err(eyre!("no [[navigation.courses]] configured"));
    }
    let prompt = if requested.is_empty() {
        format!("Rebuild navigation in {} collection(s) [{}]?", outlined.len(), outlined.join(", "))
    } else {
        format!("Rebuild navigation in [{}]?", requested.join(", "))
    };
    if !confirm(&prompt, flags)? {
        println!("Aborted.");
        return Ok(());
    }

    let progress = CliProgress::new(json);
    let report = navigator.run(requested, run_options(config, flags), &progress)?;
    finish_batch(&report, json)
}

fn cmd_audit(
    store: &DocumentStore,
    config: &AppConfig,
    requested: &[String],
    json: bool,
) -> Result<()> {
    let collections = resolve_collections(store, requested, &config.corpus.legacy_suffix)?;
    let progress = CliProgress::new(json);
    let report = Auditor::new(store, &config.diagram).run(&collections, &progress)?;

    if json {
        print_json(&report)?;
    } else {
        print_audit(&report);
    }

    if report.has_findings() {
        return Err(eyre!(
            "{} issue(s), {} failure(s)",
            report.issues.len(),
            report.failures.len()
        ));
    }
    Ok(())
}

fn cmd_list(store: &DocumentStore, config: &AppConfig) -> Result<()> {
    for collection in store.collections()? {
        let count = store.list(&collection)?.len();
        let legacy = collection.ends_with(&config.corpus.legacy_suffix);
        println!(
            "  {collection:<24} {count:>4} document(s){}",
            if legacy { "  (legacy)" } else { "" }
        );
    }
    Ok(())
}

fn cmd_config_init(path: Option<PathBuf>) -> Result<()> {
    let path = init_config(path.as_deref())?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

fn run_options(config: &AppConfig, flags: &WriteFlags) -> RunOptions {
    RunOptions {
        dry_run: flags.dry_run,
        backup: config.corpus.backup && !flags.no_backup,
    }
}

/// Ask on stdin unless `--yes` or `--dry-run` was given.
fn confirm(prompt: &str, flags: &WriteFlags) -> Result<bool> {
    if flags.yes || flags.dry_run {
        return Ok(true);
    }
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print the report and turn recorded failures into a non-zero exit.
fn finish_batch(report: &BatchReport, json: bool) -> Result<()> {
    if json {
        print_json(report)?;
    } else {
        print_batch(report);
    }
    if report.has_failures() {
        return Err(eyre!("{} document(s) failed", report.failures.len()));
    }
    Ok(())
}

fn print_batch(report: &BatchReport) {
    println!();
    println!("  {report}");
    if !report.rule_counts.is_empty() {
        println!();
        for (name, count) in &report.rule_counts {
            println!("  {count:>5}  {name}");
        }
    }
    for note in &report.skipped {
        println!("  skipped  {}: {}", note.key, note.message);
    }
    for note in &report.warnings {
        println!("  warning  {}: {}", note.key, note.message);
    }
    for failure in &report.failures {
        println!("  failed   {} [{}]: {}", failure.key, failure.kind, failure.message);
    }
    println!();
}

fn print_audit(report: &AuditReport) {
    println!();
    println!("  {report}");
    for issue in &report.issues {
        println!("  {:<20} {}: {}", issue.kind.to_string(), issue.key, issue.detail);
    }
    for failure in &report.failures {
        println!("  failed   {} [{}]: {}", failure.key, failure.kind, failure.message);
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif bar.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new(hidden: bool) -> Self {
        let bar = if hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(0)
        };
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn start(&self, task: &str, total: usize) {
        self.bar.set_prefix(task.to_string());
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
    }

    fn document(&self, key: &DocKey, current: usize, _total: usize) {
        self.bar.set_position(current as u64);
        self.bar.set_message(key.to_string());
    }

    fn done(&self, _summary: &str) {
        self.bar.finish_and_clear();
    }
}
