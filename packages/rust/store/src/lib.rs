//! Filesystem-backed document store for a lesson corpus.
//!
//! A corpus is a root directory of collections (one directory per course
//! module), each holding markup documents. Documents are read whole, edited in
//! memory, and written back only when their text changed.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, instrument, warn};

use lessonforge_shared::{CorpusConfig, DocKey, LessonForgeError, Result};

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A document loaded for one task: the text as read plus the working body.
#[derive(Debug, Clone)]
pub struct Document {
    key: DocKey,
    original: String,
    /// Working copy mutated by transformation steps.
    pub body: String,
}

impl Document {
    /// Wrap text that was just read for `key`.
    pub fn new(key: DocKey, text: String) -> Self {
        Self {
            key,
            body: text.clone(),
            original: text,
        }
    }

    pub fn key(&self) -> &DocKey {
        &self.key
    }

    /// Text as it was when the document was loaded.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Whether the body differs from what was read.
    pub fn is_modified(&self) -> bool {
        self.body != self.original
    }
}

/// What [`DocumentStore::commit`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Body identical to what was read; nothing written.
    Unchanged,
    /// Body written. `backup` is the copy taken first, if any succeeded.
    Written { backup: Option<DocKey> },
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Read/write access to the documents of one corpus root.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
    extension: String,
    backup_dir: String,
}

impl DocumentStore {
    /// Open a corpus rooted at `root`. Fails with `NotFound` if the root is missing.
    pub fn open(
        root: impl Into<PathBuf>,
        extension: impl Into<String>,
        backup_dir: impl Into<String>,
    ) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(LessonForgeError::not_found(root.display()));
        }
        let extension = extension.into().trim_start_matches('.').to_string();
        Ok(Self {
            root,
            extension,
            backup_dir: backup_dir.into(),
        })
    }

    /// Open the corpus described by the `[corpus]` config section.
    pub fn from_config(config: &CorpusConfig) -> Result<Self> {
        Self::open(&config.root, &config.extension, &config.backup_dir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Name of the backup sub-collection.
    pub fn backup_dir(&self) -> &str {
        &self.backup_dir
    }

    /// Enumerate collection directories under the root, sorted by name.
    ///
    /// Hidden directories and backup directories are not collections.
    pub fn collections(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.root).map_err(|e| LessonForgeError::io(&self.root, e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| LessonForgeError::io(&self.root, e))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') || name == self.backup_dir {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    /// Whether `collection` exists as a directory.
    pub fn has_collection(&self, collection: &str) -> bool {
        self.collection_path(collection)
            .map(|p| p.is_dir())
            .unwrap_or(false)
    }

    /// List documents with the corpus extension inside `collection`.
    ///
    /// Order follows the directory listing and is not stable; sort if needed.
    pub fn list(&self, collection: &str) -> Result<Vec<DocKey>> {
        let dir = self.collection_path(collection)?;
        if !dir.is_dir() {
            return Err(LessonForgeError::not_found(collection));
        }

        let entries = fs::read_dir(&dir).map_err(|e| LessonForgeError::io(&dir, e))?;
        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| LessonForgeError::io(&dir, e))?;
            if !entry.path().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if self.has_extension(&name) {
                keys.push(DocKey::new(collection, name));
            }
        }

        debug!(collection, count = keys.len(), "listed documents");
        Ok(keys)
    }

    /// Whether `key` resolves to an existing document.
    pub fn exists(&self, key: &DocKey) -> bool {
        self.doc_path(key).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Read a document's full text.
    pub fn read(&self, key: &DocKey) -> Result<String> {
        let path = self.doc_path(key)?;
        if !path.is_file() {
            return Err(LessonForgeError::not_found(key));
        }
        fs::read_to_string(&path).map_err(|e| LessonForgeError::io(&path, e))
    }

    /// Overwrite a document with `text`.
    ///
    /// The text goes to a sibling temp file first and is renamed over the
    /// target, so readers see either the old or the new content.
    pub fn write(&self, key: &DocKey, text: &str) -> Result<()> {
        let path = self.doc_path(key)?;
        let dir = path
            .parent()
            .ok_or_else(|| LessonForgeError::not_found(key))?;
        fs::create_dir_all(dir).map_err(|e| LessonForgeError::io(dir, e))?;

        let temp = dir.join(format!(".{}.tmp", key.name));
        fs::write(&temp, text).map_err(|e| LessonForgeError::io(&temp, e))?;
        fs::rename(&temp, &path).map_err(|e| {
            let _ = fs::remove_file(&temp);
            LessonForgeError::io(&path, e)
        })?;

        debug!(%key, bytes = text.len(), "wrote document");
        Ok(())
    }

    /// Copy the persisted content of `key` into the backup sub-collection.
    ///
    /// The copy is named `<stem>_<YYYYmmdd_HHMMSS><ext>`; a `-N` counter is
    /// appended when that name is already taken.
    #[instrument(skip_all, fields(%key))]
    pub fn backup(&self, key: &DocKey) -> Result<DocKey> {
        let source = self.doc_path(key)?;
        if !source.is_file() {
            return Err(LessonForgeError::not_found(key));
        }

        let collection = format!("{}/{}", key.collection, self.backup_dir);
        let dir = self.collection_path(&collection)?;
        fs::create_dir_all(&dir).map_err(|e| LessonForgeError::io(&dir, e))?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let mut name = format!("{}_{stamp}{}", key.stem(), key.extension());
        let mut counter = 1;
        while dir.join(&name).exists() {
            counter += 1;
            name = format!("{}_{stamp}-{counter}{}", key.stem(), key.extension());
        }

        let target = dir.join(&name);
        fs::copy(&source, &target).map_err(|e| LessonForgeError::io(&target, e))?;

        let backup_key = DocKey::new(collection, name);
        debug!(backup = %backup_key, "backed up document");
        Ok(backup_key)
    }

    /// Read `key` into a [`Document`].
    pub fn load(&self, key: &DocKey) -> Result<Document> {
        let text = self.read(key)?;
        Ok(Document::new(key.clone(), text))
    }

    /// Persist `doc` if its body changed, optionally backing it up first.
    ///
    /// A failed backup is logged and does not prevent the write.
    pub fn commit(&self, doc: &Document, backup: bool) -> Result<CommitOutcome> {
        if !doc.is_modified() {
            return Ok(CommitOutcome::Unchanged);
        }

        let backup_key = if backup && self.exists(doc.key()) {
            match self.backup(doc.key()) {
                Ok(k) => Some(k),
                Err(e) => {
                    warn!(key = %doc.key(), error = %e, "backup failed, writing anyway");
                    None
                }
            }
        } else {
            None
        };

        self.write(doc.key(), &doc.body)?;
        Ok(CommitOutcome::Written { backup: backup_key })
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn has_extension(&self, name: &str) -> bool {
        match name.rsplit_once('.') {
            Some((stem, ext)) => !stem.is_empty() && ext.eq_ignore_ascii_case(&self.extension),
            None => false,
        }
    }

    fn collection_path(&self, collection: &str) -> Result<PathBuf> {
        let mut path = self.root.clone();
        for segment in collection.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(LessonForgeError::config(format!(
                    "collection '{collection}' must not contain relative segments"
                )));
            }
            path.push(segment);
        }
        Ok(path)
    }

    fn doc_path(&self, key: &DocKey) -> Result<PathBuf> {
        if key.name.is_empty() || key.name.contains(['/', '\\']) || key.name == ".." {
            return Err(LessonForgeError::config(format!(
                "invalid document name '{}'",
                key.name
            )));
        }
        Ok(self.collection_path(&key.collection)?.join(&key.name))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "lf-store-test-{}",
            uuid::Uuid::now_v7()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn seeded_store() -> (PathBuf, DocumentStore) {
        let root = temp_dir();
        fs::create_dir_all(root.join("module-01")).unwrap();
        fs::create_dir_all(root.join("module-01_old")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("module-01/intro.html"), "<html>intro</html>").unwrap();
        fs::write(root.join("module-01/loops.HTML"), "<html>loops</html>").unwrap();
        fs::write(root.join("module-01/notes.txt"), "not markup").unwrap();
        let store = DocumentStore::open(&root, "html", "backups").unwrap();
        (root, store)
    }

    #[test]
    fn open_missing_root_is_not_found() {
        let missing = std::env::temp_dir().join("lf-store-missing-root-does-not-exist");
        let err = DocumentStore::open(&missing, "html", "backups").unwrap_err();
        assert!(matches!(err, LessonForgeError::NotFound { .. }));
    }

    #[test]
    fn collections_skip_hidden_dirs() {
        let (root, store) = seeded_store();
        assert_eq!(store.collections().unwrap(), vec!["module-01", "module-01_old"]);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn list_filters_by_extension() {
        let (root, store) = seeded_store();
        let mut keys = store.list("module-01").unwrap();
        keys.sort();
        let names: Vec<_> = keys.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, vec!["intro.html", "loops.HTML"]);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn list_missing_collection_is_not_found() {
        let (root, store) = seeded_store();
        let err = store.list("module-99").unwrap_err();
        assert!(matches!(err, LessonForgeError::NotFound { .. }));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn read_missing_document_is_not_found() {
        let (root, store) = seeded_store();
        let err = store.read(&DocKey::new("module-01", "nope.html")).unwrap_err();
        assert!(matches!(err, LessonForgeError::NotFound { .. }));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn write_overwrites_and_leaves_no_temp_file() {
        let (root, store) = seeded_store();
        let key = DocKey::new("module-01", "intro.html");
        store.write(&key, "<html>new</html>").unwrap();
        assert_eq!(store.read(&key).unwrap(), "<html>new</html>");
        assert!(!root.join("module-01/.intro.html.tmp").exists());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn relative_segments_are_rejected() {
        let (root, store) = seeded_store();
        let err = store.read(&DocKey::new("../etc", "passwd")).unwrap_err();
        assert!(matches!(err, LessonForgeError::Config { .. }));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn backup_names_are_timestamped_and_unique() {
        let (root, store) = seeded_store();
        let key = DocKey::new("module-01", "intro.html");

        let first = store.backup(&key).unwrap();
        let second = store.backup(&key).unwrap();

        assert_eq!(first.collection, "module-01/backups");
        assert!(first.name.starts_with("intro_"));
        assert!(first.name.ends_with(".html"));
        assert_ne!(first.name, second.name);
        let copied = fs::read_to_string(root.join("module-01/backups").join(&first.name)).unwrap();
        assert_eq!(copied, "<html>intro</html>");
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn commit_unchanged_writes_nothing() {
        let (root, store) = seeded_store();
        let key = DocKey::new("module-01", "intro.html");
        let doc = store.load(&key).unwrap();

        assert_eq!(store.commit(&doc, true).unwrap(), CommitOutcome::Unchanged);
        assert!(!root.join("module-01/backups").exists());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn commit_modified_backs_up_then_writes() {
        let (root, store) = seeded_store();
        let key = DocKey::new("module-01", "intro.html");
        let mut doc = store.load(&key).unwrap();
        doc.body.push_str("\n<!-- edited -->");

        let outcome = store.commit(&doc, true).unwrap();
        let CommitOutcome::Written { backup: Some(backup) } = outcome else {
            panic!("expected a written outcome with backup, got {outcome:?}");
        };
        assert_eq!(store.read(&backup).unwrap(), "<html>intro</html>");
        assert!(store.read(&key).unwrap().ends_with("<!-- edited -->"));
        assert!(root.join("module-01/backups").is_dir());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn commit_without_backup() {
        let (root, store) = seeded_store();
        let key = DocKey::new("module-01", "intro.html");
        let mut doc = store.load(&key).unwrap();
        doc.body = "changed".into();

        assert_eq!(
            store.commit(&doc, false).unwrap(),
            CommitOutcome::Written { backup: None }
        );
        assert!(!root.join("module-01/backups").exists());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn failed_backup_still_writes() {
        let (root, store) = seeded_store();
        // A plain file where the backup directory should go.
        fs::write(root.join("module-01/backups"), "occupied").unwrap();
        let key = DocKey::new("module-01", "intro.html");
        let mut doc = store.load(&key).unwrap();
        doc.body = "<html>rewritten</html>".into();

        assert_eq!(
            store.commit(&doc, true).unwrap(),
            CommitOutcome::Written { backup: None }
        );
        assert_eq!(store.read(&key).unwrap(), "<html>rewritten</html>");
        assert!(root.join("module-01/backups").is_file());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn backups_dir_is_not_a_collection() {
        let (root, store) = seeded_store();
        let key = DocKey::new("module-01", "intro.html");
        store.backup(&key).unwrap();
        assert!(!store.collections().unwrap().contains(&"backups".to_string()));
        // Backups live inside the collection but are not listed as documents.
        assert_eq!(store.list("module-01").unwrap().len(), 2);
        let _ = std::fs::remove_dir_all(&root);
    }
}
