//! Batch and audit reports.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use lessonforge_shared::{DocKey, ErrorKind, LessonForgeError};

/// A document that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub key: DocKey,
    pub kind: ErrorKind,
    pub message: String,
}

impl Failure {
    pub fn new(key: DocKey, err: &LessonForgeError) -> Self {
        Self {
            key,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// A per-document remark: why it was skipped, or what was only partly done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Note {
    pub key: DocKey,
    pub message: String,
}

/// Outcome of a modifying batch task.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub task: String,
    pub dry_run: bool,
    /// Documents processed without error (modified or not).
    pub succeeded: usize,
    /// Documents whose text changed (or would change, in a dry run).
    pub modified: usize,
    pub skipped: Vec<Note>,
    pub failures: Vec<Failure>,
    /// Rule name (patch) or old prefix (relink) → documents or links changed.
    pub rule_counts: BTreeMap<String, usize>,
    pub warnings: Vec<Note>,
}

impl BatchReport {
    pub fn new(task: impl Into<String>, dry_run: bool) -> Self {
        Self {
            task: task.into(),
            dry_run,
            ..Self::default()
        }
    }

    pub fn record_success(&mut self, modified: bool) {
        self.succeeded += 1;
        if modified {
            self.modified += 1;
        }
    }

    pub fn record_skip(&mut self, key: DocKey, reason: impl Into<String>) {
        self.skipped.push(Note {
            key,
            message: reason.into(),
        });
    }

    pub fn record_failure(&mut self, key: DocKey, err: &LessonForgeError) {
        self.failures.push(Failure::new(key, err));
    }

    pub fn record_warning(&mut self, key: DocKey, message: impl Into<String>) {
        self.warnings.push(Note {
            key,
            message: message.into(),
        });
    }

    pub fn count(&mut self, name: &str, by: usize) {
        if by > 0 {
            *self.rule_counts.entry(name.to_string()).or_default() += by;
        }
    }

    /// Documents visited.
    pub fn total(&self) -> usize {
        self.succeeded + self.skipped.len() + self.failures.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.dry_run { "would modify" } else { "modified" };
        write!(
            f,
            "{}: {} succeeded ({} {verb}), {} skipped, {} failed",
            self.task,
            self.succeeded,
            self.modified,
            self.skipped.len(),
            self.failures.len()
        )
    }
}

/// Category of an audit finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A script reference to an asset name that has been renamed.
    RetiredAsset,
    /// The diagram asset referenced through a path other than the canonical one.
    NonCanonicalPath,
    /// Diagram content with no diagram asset reference.
    MissingAsset,
    /// More than one reference to the diagram asset.
    DuplicateAsset,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RetiredAsset => "retired asset",
            Self::NonCanonicalPath => "non-canonical path",
            Self::MissingAsset => "missing asset",
            Self::DuplicateAsset => "duplicate asset",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditIssue {
    pub key: DocKey,
    pub kind: IssueKind,
    pub detail: String,
}

/// Outcome of a read-only audit.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditReport {
    pub scanned: usize,
    /// Documents with no issues.
    pub clean: usize,
    pub issues: Vec<AuditIssue>,
    pub failures: Vec<Failure>,
}

impl AuditReport {
    pub fn has_findings(&self) -> bool {
        !self.issues.is_empty() || !self.failures.is_empty()
    }

    /// Issue counts by kind.
    pub fn counts(&self) -> BTreeMap<IssueKind, usize> {
        let mut counts = BTreeMap::new();
        for issue in &self.issues {
            *counts.entry(issue.kind).or_default() += 1;
        }
        counts
    }
}

impl fmt::Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "audit: {} scanned, {} clean, {} issues, {} failed",
            self.scanned,
            self.clean,
            self.issues.len(),
            self.failures.len()
        )
    }
}
