//! Read-only diagram asset audit.

use tracing::{info, instrument, warn};

use lessonforge_markup::{file_name, scan_page};
use lessonforge_shared::{DiagramConfig, DocKey, Result};
use lessonforge_store::DocumentStore;

use crate::report::{AuditIssue, AuditReport, Failure, IssueKind};
use crate::task::{ProgressReporter, collect_keys};

/// Checks every document's diagram asset references. Never writes.
#[derive(Debug)]
pub struct Auditor<'a> {
    store: &'a DocumentStore,
    diagram: DiagramConfig,
}

impl<'a> Auditor<'a> {
    pub fn new(store: &'a DocumentStore, diagram: &DiagramConfig) -> Self {
        Self {
            store,
            diagram: diagram.clone(),
        }
    }

    #[instrument(skip_all, fields(collections = collections.len()))]
    pub fn run(
        &self,
        collections: &[String],
        progress: &dyn ProgressReporter,
    ) -> Result<AuditReport> {
        let keys = collect_keys(self.store, collections)?;
        let mut report = AuditReport::default();
        progress.start("audit", keys.len());

        for (i, key) in keys.iter().enumerate() {
            progress.document(key, i + 1, keys.len());
            match self.store.read(key) {
                Ok(raw) => {
                    report.scanned += 1;
                    let issues = self.check(key, &raw);
                    if issues.is_empty() {
                        report.clean += 1;
                    }
                    report.issues.extend(issues);
                }
                Err(e) => {
                    warn!(%key, error = %e, "audit read failed");
                    report.failures.push(Failure::new(key.clone(), &e));
                }
            }
        }

        info!(
            scanned = report.scanned,
            issues = report.issues.len(),
            "audit complete"
        );
        progress.done(&report.to_string());
        Ok(report)
    }

    /// Issues found in one document's text.
    pub fn check(&self, key: &DocKey, raw: &str) -> Vec<AuditIssue> {
        let scan = scan_page(raw, &self.diagram.content_classes);
        let asset_name = file_name(&self.diagram.asset);
        let mut issues = Vec::new();
        let mut issue = |kind: IssueKind, detail: String| {
            issues.push(AuditIssue {
                key: key.clone(),
                kind,
                detail,
            })
        };

        for retired in &self.diagram.retired_assets {
            for src in scan.scripts_named(retired) {
                issue(IssueKind::RetiredAsset, src.to_string());
            }
        }

        let refs: Vec<&str> = scan.scripts_named(asset_name).collect();
        for &src in &refs {
            let path = src.split(['?', '#']).next().unwrap_or(src);
            if path != self.diagram.asset {
                issue(
                    IssueKind::NonCanonicalPath,
                    format!("{src} (expected {})", self.diagram.asset),
                );
            }
        }
        if refs.len() > 1 {
            issue(
                IssueKind::DuplicateAsset,
                format!("{} references to {asset_name}", refs.len()),
            );
        }
        if refs.is_empty() && scan.diagram_elements > 0 {
            issue(
                IssueKind::MissingAsset,
                format!(
                    "{} diagram elements without {asset_name}",
                    scan.diagram_elements
                ),
            );
        }

        issues
    }
}
