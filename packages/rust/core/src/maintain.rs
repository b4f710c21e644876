//! In-place maintenance tasks: patch rule sets and link remapping.

use tracing::{info, instrument, warn};

use lessonforge_markup::RenameMap;
use lessonforge_patch::{LinkRemap, PatchSet};
use lessonforge_shared::{AppConfig, DocKey, Result};
use lessonforge_store::DocumentStore;

use crate::report::BatchReport;
use crate::task::{ProgressReporter, RunOptions, collect_keys, persist};

// ---------------------------------------------------------------------------
// Patch
// ---------------------------------------------------------------------------

/// Applies the configured rule set to every document of some collections.
#[derive(Debug)]
pub struct Patcher<'a> {
    store: &'a DocumentStore,
    rules: PatchSet,
}

impl<'a> Patcher<'a> {
    /// Build the rule set from `[[patch.rules]]` and `[classes]`.
    pub fn new(store: &'a DocumentStore, config: &AppConfig) -> Result<Self> {
        let classes = RenameMap::from_config(&config.classes)?;
        let rules = PatchSet::from_specs(&config.patch.rules, &classes)?;
        Ok(Self::with_rules(store, rules))
    }

    pub fn with_rules(store: &'a DocumentStore, rules: PatchSet) -> Self {
        Self { store, rules }
    }

    pub fn rules(&self) -> &PatchSet {
        &self.rules
    }

    #[instrument(skip_all, fields(collections = collections.len(), rules = self.rules.len()))]
    pub fn run(
        &self,
        collections: &[String],
        opts: RunOptions,
        progress: &dyn ProgressReporter,
    ) -> Result<BatchReport> {
        let keys = collect_keys(self.store, collections)?;
        let mut report = BatchReport::new("patch", opts.dry_run);
        progress.start("patch", keys.len());

        for (i, key) in keys.iter().enumerate() {
            progress.document(key, i + 1, keys.len());
            if let Err(e) = self.patch_one(key, opts, &mut report) {
                warn!(%key, error = %e, "patch failed");
                report.record_failure(key.clone(), &e);
            }
        }

        info!(
            succeeded = report.succeeded,
            modified = report.modified,
            failed = report.failures.len(),
            "patching complete"
        );
        progress.done(&report.to_string());
        Ok(report)
    }

    fn patch_one(&self, key: &DocKey, opts: RunOptions, report: &mut BatchReport) -> Result<()> {
        let mut doc = self.store.load(key)?;
        let outcome = self.rules.apply(doc.original())?;
        doc.body = outcome.text;
        let modified = persist(self.store, &doc, opts)?;

        report.record_success(modified);
        for rule in &outcome.applied {
            report.count(rule, 1);
        }
        for rule in outcome.anchor_missing {
            report.record_warning(key.clone(), format!("{rule}: anchor missing"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Relink
// ---------------------------------------------------------------------------

/// Rewrites link prefixes across some collections.
#[derive(Debug)]
pub struct Relinker<'a> {
    store: &'a DocumentStore,
    remap: LinkRemap,
}

impl<'a> Relinker<'a> {
    pub fn new(store: &'a DocumentStore, config: &AppConfig) -> Result<Self> {
        Ok(Self::with_remap(store, LinkRemap::from_config(&config.links)?))
    }

    pub fn with_remap(store: &'a DocumentStore, remap: LinkRemap) -> Self {
        Self { store, remap }
    }

    #[instrument(skip_all, fields(collections = collections.len()))]
    pub fn run(
        &self,
        collections: &[String],
        opts: RunOptions,
        progress: &dyn ProgressReporter,
    ) -> Result<BatchReport> {
        let keys = collect_keys(self.store, collections)?;
        let mut report = BatchReport::new("relink", opts.dry_run);
        progress.start("relink", keys.len());

        if self.remap.is_empty() {
            warn!("no link remap configured");
        }

        for (i, key) in keys.iter().enumerate() {
            progress.document(key, i + 1, keys.len());
            let result = self.store.load(key).and_then(|mut doc| {
                let relinked = self.remap.rewrite(doc.original());
                doc.body = relinked.text;
                Ok((persist(self.store, &doc, opts)?, relinked.counts))
            });
            match result {
                Ok((modified, counts)) => {
                    report.record_success(modified);
                    for (prefix, n) in counts {
                        report.count(&prefix, n);
                    }
                }
                Err(e) => {
                    warn!(%key, error = %e, "relink failed");
                    report.record_failure(key.clone(), &e);
                }
            }
        }

        info!(
            modified = report.modified,
            links = report.rule_counts.values().sum::<usize>(),
            "relink complete"
        );
        progress.done(&report.to_string());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::task::SilentProgress;
    use crate::testutil::{get, put, store, temp_corpus};
    use lessonforge_shared::{ErrorKind, RuleSpec};

    const DIAGRAM_PAGE: &str = "<html>\n<body>\n<div class=\"mermaid\">graph TD</div>\n<!-- Universal Mermaid Fix -->\n<script src=\"/assets/js/mermaid-fix-v2.js\"></script>\n<!-- Universal Mermaid Fix -->\n<script src=\"/assets/js/mermaid-universal-fix.js\"></script>\n</body>\n</html>\n";
    const PLAIN_PAGE: &str = "<html>\n<body>\n<p>No diagrams</p>\n</body>\n</html>\n";

    fn collections() -> Vec<String> {
        vec!["module-01".to_string()]
    }

    #[test]
    fn patch_is_idempotent_across_runs() {
        let root = temp_corpus();
        put(&root, "module-01", "a.html", DIAGRAM_PAGE);
        put(&root, "module-01", "b.html", PLAIN_PAGE);
        let s = store(&root);
        let patcher = Patcher::new(&s, &AppConfig::default()).unwrap();

        let first = patcher.run(&collections(), RunOptions::default(), &SilentProgress).unwrap();
        assert_eq!(first.succeeded, 2);
        assert_eq!(first.modified, 1);
        assert_eq!(first.rule_counts["migrate mermaid-fix-v2.js -> mermaid-universal-fix.js"], 1);
        let text = get(&root, "module-01", "a.html");
        assert_eq!(text.matches("mermaid-universal-fix.js").count(), 1);
        assert_eq!(text.matches("<!-- Universal Mermaid Fix -->").count(), 1);
        assert_eq!(get(&root, "module-01", "b.html"), PLAIN_PAGE);

        let second = patcher.run(&collections(), RunOptions::default(), &SilentProgress).unwrap();
        assert_eq!(second.modified, 0);
        assert!(second.rule_counts.is_empty());
        assert_eq!(get(&root, "module-01", "a.html"), text);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn unchanged_documents_get_no_backup() {
        let root = temp_corpus();
        put(&root, "module-01", "b.html", PLAIN_PAGE);
        let s = store(&root);
        Patcher::new(&s, &AppConfig::default())
            .unwrap()
            .run(&collections(), RunOptions::default(), &SilentProgress)
            .unwrap();
        assert!(!root.join("module-01/backups").exists());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn ambiguous_anchor_fails_only_that_document() {
        let root = temp_corpus();
        let doubled = format!("{DIAGRAM_PAGE}</body>\n");
        put(&root, "module-01", "a.html", DIAGRAM_PAGE);
        put(&root, "module-01", "b.html", &doubled);
        let s = store(&root);
        let report = Patcher::new(&s, &AppConfig::default())
            .unwrap()
            .run(&collections(), RunOptions::default(), &SilentProgress)
            .unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, ErrorKind::Configuration);
        assert_eq!(get(&root, "module-01", "b.html"), doubled);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn custom_rule_set() {
        let root = temp_corpus();
        put(&root, "module-01", "a.html", "<p>\n\n\n\nx</p>");
        let s = store(&root);
        let rules = PatchSet::from_specs(
            &[RuleSpec::CollapseBlankLines { name: None }],
            &RenameMap::default(),
        )
        .unwrap();
        let report = Patcher::with_rules(&s, rules)
            .run(&collections(), RunOptions::default(), &SilentProgress)
            .unwrap();
        assert_eq!(report.rule_counts["collapse-blank-lines"], 1);
        assert_eq!(get(&root, "module-01", "a.html"), "<p>\n\nx</p>");
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn relink_counts_per_prefix() {
        let root = temp_corpus();
        put(
            &root,
            "module-01",
            "a.html",
            r#"<a href="/10module/x.html">x</a><a href="/07module/y.html">y</a><a href="/07module/z.html">z</a>"#,
        );
        put(&root, "module-02", "b.html", "<p>no links</p>");
        let s = store(&root);
        let remap: BTreeMap<String, String> = [
            ("/07module/".to_string(), "/06module/".to_string()),
            ("/10module/".to_string(), "/07module/".to_string()),
        ]
        .into_iter()
        .collect();
        let relinker = Relinker::with_remap(&s, LinkRemap::new(&remap).unwrap());
        let report = relinker
            .run(
                &["module-01".to_string(), "module-02".to_string()],
                RunOptions::default(),
                &SilentProgress,
            )
            .unwrap();

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.modified, 1);
        assert_eq!(report.rule_counts["/07module/"], 2);
        assert_eq!(report.rule_counts["/10module/"], 1);
        assert_eq!(
            get(&root, "module-01", "a.html"),
            r#"<a href="/07module/x.html">x</a><a href="/06module/y.html">y</a><a href="/06module/z.html">z</a>"#
        );
        let _ = std::fs::remove_dir_all(&root);
    }
}
