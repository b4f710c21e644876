//! Legacy → template migration.
//!
//! For every document in `<collection><legacy_suffix>`, the content region is
//! extracted, class-normalized, and transplanted into the document of the
//! same name in `<collection>`.

use tracing::{info, instrument, warn};

use lessonforge_markup::{
    ExtractOptions, RenameMap, TransplantOptions, extract_region, normalize_classes, transplant,
};
use lessonforge_shared::{AppConfig, DocKey, LessonForgeError, Result};
use lessonforge_store::DocumentStore;

use crate::report::BatchReport;
use crate::task::{ProgressReporter, RunOptions, persist};

/// Runs the migration task over one collection at a time.
#[derive(Debug)]
pub struct Migrator<'a> {
    store: &'a DocumentStore,
    extract: ExtractOptions,
    transplant: TransplantOptions,
    classes: RenameMap,
    legacy_suffix: String,
}

/// What happened to one migrated document.
struct Migrated {
    modified: bool,
    missing: Vec<&'static str>,
}

impl<'a> Migrator<'a> {
    pub fn new(store: &'a DocumentStore, config: &AppConfig) -> Result<Self> {
        Ok(Self {
            store,
            extract: ExtractOptions {
                diagram_keyword: config.diagram.keyword.clone(),
                strip_main_header: config.migrate.strip_main_header,
            },
            transplant: TransplantOptions::from_config(&config.migrate, &config.diagram),
            classes: RenameMap::from_config(&config.classes)?,
            legacy_suffix: config.corpus.legacy_suffix.clone(),
        })
    }

    /// Name of the legacy sibling of `collection`.
    pub fn legacy_collection(&self, collection: &str) -> String {
        format!("{collection}{}", self.legacy_suffix)
    }

    /// Legacy documents that would be migrated into `collection`, sorted.
    pub fn sources(&self, collection: &str) -> Result<Vec<DocKey>> {
        if !self.store.has_collection(collection) {
            return Err(LessonForgeError::not_found(collection));
        }
        let mut keys = self.store.list(&self.legacy_collection(collection))?;
        keys.sort();
        Ok(keys)
    }

    /// Migrate every legacy document of `collection`.
    #[instrument(skip_all, fields(%collection))]
    pub fn run(
        &self,
        collection: &str,
        opts: RunOptions,
        progress: &dyn ProgressReporter,
    ) -> Result<BatchReport> {
        let sources = self.sources(collection)?;
        let mut report = BatchReport::new("migrate", opts.dry_run);
        progress.start("migrate", sources.len());

        for (i, legacy) in sources.iter().enumerate() {
            let target = legacy.with_collection(collection);
            progress.document(&target, i + 1, sources.len());

            if !self.store.exists(&target) {
                warn!(key = %target, "no target document, skipping");
                report.record_skip(target, "no target document");
                continue;
            }

            match self.migrate_one(legacy, &target, opts) {
                Ok(done) => {
                    report.record_success(done.modified);
                    for anchor in done.missing {
                        report.record_warning(target.clone(), format!("{anchor} not found"));
                    }
                }
                Err(e) => {
                    warn!(key = %target, error = %e, "migration failed");
                    report.record_failure(target, &e);
                }
            }
        }

        info!(
            succeeded = report.succeeded,
            modified = report.modified,
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            "migration complete"
        );
        progress.done(&report.to_string());
        Ok(report)
    }

    fn migrate_one(&self, legacy: &DocKey, target: &DocKey, opts: RunOptions) -> Result<Migrated> {
        let raw = self.store.read(legacy)?;
        let mut region = extract_region(&raw, &self.extract)?;
        region.body = normalize_classes(&region.body, &self.classes);

        let mut doc = self.store.load(target)?;
        let merged = transplant(doc.original(), &region, &self.transplant)?;
        doc.body = merged.text;

        Ok(Migrated {
            modified: persist(self.store, &doc, opts)?,
            missing: merged.missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::SilentProgress;
    use crate::testutil::{fixture, get, put, store, temp_corpus};
    use lessonforge_shared::ErrorKind;

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.migrate.course_suffixes = vec![" - PHP Course".into()];
        config
            .classes
            .rename
            .insert("real_world_example".into(), "real-world-example".into());
        config.classes.hyphenate_underscores = true;
        config
    }

    fn corpus_with(docs: &[(&str, &str)]) -> std::path::PathBuf {
        let root = temp_corpus();
        for (name, legacy) in docs {
            put(&root, "module-01_old", name, &fixture(legacy));
            put(&root, "module-01", name, &fixture("template_lesson.html"));
        }
        root
    }

    #[test]
    fn migrates_content_into_template() {
        let root = corpus_with(&[("variables.html", "legacy_lesson.html")]);
        let s = store(&root);
        let report = Migrator::new(&s, &config())
            .unwrap()
            .run("module-01", RunOptions::default(), &SilentProgress)
            .unwrap();

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.modified, 1);
        let text = get(&root, "module-01", "variables.html");
        assert!(text.contains("<title>PHP Basics - Variables - PHP Course</title>"));
        assert!(text.contains(r#"content="PHP Basics. Variables""#));
        assert!(text.contains("<h1>Variables</h1>"));
        assert!(text.contains(r#"class="panel real-world-example highlighted""#));
        assert!(text.contains(r#"class="intro-box""#));
        assert!(!text.contains("Lesson content goes here."));
        assert!(text.contains(r#"<a href="/module-01/next.html">Next</a>"#));
        assert!(!text.contains("mermaid-universal-fix.js"));
        assert!(root.join("module-01/backups").is_dir());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn diagram_lessons_get_the_script() {
        let root = corpus_with(&[("flow.html", "legacy_diagram_lesson.html")]);
        let s = store(&root);
        Migrator::new(&s, &config())
            .unwrap()
            .run("module-01", RunOptions::default(), &SilentProgress)
            .unwrap();
        let text = get(&root, "module-01", "flow.html");
        assert_eq!(text.matches("mermaid-universal-fix.js").count(), 1);
        assert!(text.contains("<h1>From Browser to PHP</h1>"));
        assert!(text.contains(r#"class="diagram-section""#));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn one_bad_target_does_not_block_the_rest() {
        let root = corpus_with(&[
            ("a.html", "legacy_lesson.html"),
            ("b.html", "legacy_lesson.html"),
            ("c.html", "legacy_lesson.html"),
        ]);
        let broken = fixture("template_no_slot.html");
        put(&root, "module-01", "b.html", &broken);

        let s = store(&root);
        let report = Migrator::new(&s, &config())
            .unwrap()
            .run("module-01", RunOptions::default(), &SilentProgress)
            .unwrap();

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].key, DocKey::new("module-01", "b.html"));
        assert_eq!(report.failures[0].kind, ErrorKind::Transplant);
        assert_eq!(get(&root, "module-01", "b.html"), broken);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_target_is_skipped() {
        let root = corpus_with(&[("a.html", "legacy_lesson.html")]);
        put(&root, "module-01_old", "orphan.html", &fixture("legacy_lesson.html"));
        let s = store(&root);
        let report = Migrator::new(&s, &config())
            .unwrap()
            .run("module-01", RunOptions::default(), &SilentProgress)
            .unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].key.name, "orphan.html");
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn second_run_writes_nothing() {
        let root = corpus_with(&[("a.html", "legacy_diagram_lesson.html")]);
        let s = store(&root);
        let migrator = Migrator::new(&s, &config()).unwrap();
        migrator.run("module-01", RunOptions::default(), &SilentProgress).unwrap();
        let after_first = get(&root, "module-01", "a.html");

        let report = migrator
            .run("module-01", RunOptions::default(), &SilentProgress)
            .unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.modified, 0);
        assert_eq!(get(&root, "module-01", "a.html"), after_first);
        let backups = std::fs::read_dir(root.join("module-01/backups")).unwrap().count();
        assert_eq!(backups, 1);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn dry_run_reports_without_writing() {
        let root = corpus_with(&[("a.html", "legacy_lesson.html")]);
        let s = store(&root);
        let opts = RunOptions {
            dry_run: true,
            backup: true,
        };
        let report = Migrator::new(&s, &config())
            .unwrap()
            .run("module-01", opts, &SilentProgress)
            .unwrap();
        assert_eq!(report.modified, 1);
        assert_eq!(get(&root, "module-01", "a.html"), fixture("template_lesson.html"));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_collection_is_fatal() {
        let root = temp_corpus();
        let s = store(&root);
        let err = Migrator::new(&s, &config())
            .unwrap()
            .run("module-07", RunOptions::default(), &SilentProgress)
            .unwrap_err();
        assert!(matches!(err, LessonForgeError::NotFound { .. }));
        let _ = std::fs::remove_dir_all(&root);
    }
}
