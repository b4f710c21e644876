//! Pieces shared by every batch task.

use tracing::debug;

use lessonforge_shared::{DocKey, LessonForgeError, Result};
use lessonforge_store::{CommitOutcome, Document, DocumentStore};

/// Progress callback for reporting task status.
pub trait ProgressReporter: Send + Sync {
    /// Called when a task starts, with the number of documents it will visit.
    fn start(&self, task: &str, total: usize);
    /// Called before each document is processed.
    fn document(&self, key: &DocKey, current: usize, total: usize);
    /// Called when the task completes, with a one-line summary.
    fn done(&self, summary: &str);
}

/// No-op progress reporter for tests and non-interactive use.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn start(&self, _task: &str, _total: usize) {}
    fn document(&self, _key: &DocKey, _current: usize, _total: usize) {}
    fn done(&self, _summary: &str) {}
}

/// How a modifying task treats the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Compute and report changes without writing anything.
    pub dry_run: bool,
    /// Back documents up before overwriting them.
    pub backup: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            backup: true,
        }
    }
}

/// Collections to visit: `requested`, or every non-legacy collection.
///
/// A requested collection that does not exist is fatal for the batch.
pub fn resolve_collections(
    store: &DocumentStore,
    requested: &[String],
    legacy_suffix: &str,
) -> Result<Vec<String>> {
    if requested.is_empty() {
        return Ok(store
            .collections()?
            .into_iter()
            .filter(|c| legacy_suffix.is_empty() || !c.ends_with(legacy_suffix))
            .collect());
    }
    for collection in requested {
        if !store.has_collection(collection) {
            return Err(LessonForgeError::not_found(collection));
        }
    }
    Ok(requested.to_vec())
}

/// Every document key in `collections`, sorted and deduplicated.
pub(crate) fn collect_keys(store: &DocumentStore, collections: &[String]) -> Result<Vec<DocKey>> {
    let mut keys = Vec::new();
    for collection in collections {
        keys.extend(store.list(collection)?);
    }
    keys.sort();
    keys.dedup();
    Ok(keys)
}

/// Write `doc` unless this is a dry run. Returns whether it was (or would be) modified.
pub(crate) fn persist(store: &DocumentStore, doc: &Document, opts: RunOptions) -> Result<bool> {
    if opts.dry_run {
        if doc.is_modified() {
            debug!(key = %doc.key(), "dry run, not writing");
        }
        return Ok(doc.is_modified());
    }
    match store.commit(doc, opts.backup)? {
        CommitOutcome::Unchanged => Ok(false),
        CommitOutcome::Written { backup } => {
            debug!(key = %doc.key(), ?backup, "document written");
            Ok(true)
        }
    }
}
