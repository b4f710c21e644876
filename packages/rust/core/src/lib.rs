//! Batch tasks for LessonForge.
//!
//! Each task walks a sorted set of documents one at a time and turns every
//! per-document error into a report entry. Only a missing corpus root or
//! collection stops a batch.

pub mod audit;
pub mod maintain;
pub mod migrate;
pub mod navigate;
pub mod report;
pub mod task;

pub use audit::Auditor;
pub use maintain::{Patcher, Relinker};
pub use migrate::Migrator;
pub use navigate::{NAVIGATION_COUNT, Navigator};
pub use report::{AuditIssue, AuditReport, BatchReport, Failure, IssueKind, Note};
pub use task::{ProgressReporter, RunOptions, SilentProgress, resolve_collections};

#[cfg(test)]
pub(crate) mod testutil {
    use std::path::{Path, PathBuf};

    use lessonforge_store::DocumentStore;

    pub fn temp_corpus() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lf-core-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    pub fn fixture(name: &str) -> String {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../../fixtures/html")
            .join(name);
        std::fs::read_to_string(&path)
            .unwrap_or_else(|_| panic!("missing fixture: {}", path.display()))
    }

    pub fn put(root: &Path, collection: &str, name: &str, text: &str) {
        let dir = root.join(collection);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(name), text).unwrap();
    }

    pub fn get(root: &Path, collection: &str, name: &str) -> String {
        std::fs::read_to_string(root.join(collection).join(name)).unwrap()
    }

    pub fn store(root: &Path) -> DocumentStore {
        DocumentStore::open(root, "html", "backups").unwrap()
    }
}
