//! Document store
//!
//! Three flat directories under one root, one per [`DocumentCategory`].
//! Documents are addressed by bare filename; nothing here ever resolves a
//! path outside its category directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use shared_types::DocumentCategory;
use tokio::fs;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid filename: {0:?}")]
    InvalidFilename(String),
    #[error("{category} not found: {filename}")]
    NotFound {
        category: DocumentCategory,
        filename: String,
    },
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        StoreError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Reject anything that is not a single plain path component.
pub fn validate_filename(filename: &str) -> Result<&str, StoreError> {
    let invalid = filename.is_empty()
        || filename == "."
        || filename == ".."
        || filename.contains(['/', '\\', '\0']);
    if invalid {
        return Err(StoreError::InvalidFilename(filename.to_string()));
    }
    Ok(filename)
}

#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    /// Open the store, creating the category directories if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self { root: root.into() };
        for category in [
            DocumentCategory::Original,
            DocumentCategory::Draft,
            DocumentCategory::Pdf,
        ] {
            let dir = store.dir(category);
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| StoreError::io(format!("Failed to create {}", dir.display()), e))?;
        }
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self, category: DocumentCategory) -> PathBuf {
        self.root.join(category.dir_name())
    }

    pub fn path(&self, category: DocumentCategory, filename: &str) -> Result<PathBuf, StoreError> {
        Ok(self.dir(category).join(validate_filename(filename)?))
    }

    /// Write `content` under `filename`, replacing any existing file.
    pub async fn save(
        &self,
        category: DocumentCategory,
        filename: &str,
        content: &[u8],
    ) -> Result<PathBuf, StoreError> {
        let path = self.path(category, filename)?;
        fs::write(&path, content)
            .await
            .map_err(|e| StoreError::io(format!("Failed to write {category} {filename}"), e))?;
        Ok(path)
    }

    pub async fn exists(&self, category: DocumentCategory, filename: &str) -> Result<bool, StoreError> {
        let path = self.path(category, filename)?;
        match fs::metadata(&path).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(format!("Failed to stat {category} {filename}"), e)),
        }
    }

    /// Path of an existing document, or `NotFound`.
    pub async fn locate(&self, category: DocumentCategory, filename: &str) -> Result<PathBuf, StoreError> {
        if !self.exists(category, filename).await? {
            return Err(StoreError::NotFound {
                category,
                filename: filename.to_string(),
            });
        }
        self.path(category, filename)
    }

    pub async fn read(&self, category: DocumentCategory, filename: &str) -> Result<Bytes, StoreError> {
        let path = self.path(category, filename)?;
        match fs::read(&path).await {
            Ok(content) => Ok(Bytes::from(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound {
                category,
                filename: filename.to_string(),
            }),
            Err(e) => Err(StoreError::io(format!("Failed to read {category} {filename}"), e)),
        }
    }

    /// Filenames in a category, in directory listing order.
    pub async fn list(&self, category: DocumentCategory) -> Result<Vec<String>, StoreError> {
        let dir = self.dir(category);
        let mut read_dir = fs::read_dir(&dir)
            .await
            .map_err(|e| StoreError::io(format!("Failed to read {}", dir.display()), e))?;

        let mut names = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| StoreError::io(format!("Failed to read {}", dir.display()), e))?
        {
            let is_file = match entry.file_type().await {
                Ok(file_type) => file_type.is_file(),
                Err(_) => continue,
            };
            // Non-UTF-8 names can't be addressed over HTTP anyway.
            match entry.file_name().into_string() {
                Ok(name) if is_file => names.push(name),
                _ => {}
            }
        }
        Ok(names)
    }

    pub async fn names(&self, category: DocumentCategory) -> Result<HashSet<String>, StoreError> {
        Ok(self.list(category).await?.into_iter().collect())
    }

    /// Move the draft over the original. The draft is gone afterwards.
    pub async fn promote_draft(&self, filename: &str) -> Result<(), StoreError> {
        let draft = self.locate(DocumentCategory::Draft, filename).await?;
        let original = self.path(DocumentCategory::Original, filename)?;
        fs::rename(&draft, &original)
            .await
            .map_err(|e| StoreError::io(format!("Failed to promote draft {filename}"), e))
    }
}

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// Per-filename mutual exclusion for read-modify-write sequences on the store.
///
/// An entry lives only while someone holds or waits on it; the last
/// [`DocumentLockGuard`] to drop removes it. A waiter cancelled mid-wait can
/// leave its entry behind until the next lock of that same key releases it.
#[derive(Debug, Clone, Default)]
pub struct DocumentLocks {
    locks: Arc<LockMap>,
}

impl DocumentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: &str) -> DocumentLockGuard {
        let evict = EvictOnDrop {
            locks: Arc::clone(&self.locks),
            key: key.to_string(),
        };
        // Clone the Arc out so the shard guard is released before awaiting.
        let lock = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        DocumentLockGuard {
            _guard: lock.lock_owned().await,
            _evict: evict,
        }
    }

    /// Number of keys currently held or waited on.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Held lock on one key. Field order matters: the mutex guard is released
/// before the entry is considered for eviction.
#[derive(Debug)]
pub struct DocumentLockGuard {
    _guard: OwnedMutexGuard<()>,
    _evict: EvictOnDrop,
}

#[derive(Debug)]
struct EvictOnDrop {
    locks: Arc<LockMap>,
    key: String,
}

impl Drop for EvictOnDrop {
    fn drop(&mut self) {
        // Only the map's own reference left means nobody holds or waits.
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> (DocumentStore, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(temp_dir.path().join("uploads"))
            .await
            .unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_validate_filename_rejects_paths() {
        assert!(validate_filename("report.docx").is_ok());
        assert!(validate_filename("report v2 (final).docx").is_ok());
        for bad in ["", ".", "..", "../etc/passwd", "a/b.docx", "a\\b.docx", "nul\0.docx"] {
            assert!(
                matches!(validate_filename(bad), Err(StoreError::InvalidFilename(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_open_creates_category_dirs() {
        let (store, _temp_dir) = temp_store().await;
        assert!(store.root().join("originals").is_dir());
        assert!(store.root().join("drafts").is_dir());
        assert!(store.root().join("pdfs").is_dir());
    }

    #[tokio::test]
    async fn test_save_overwrites_and_reads_back() {
        let (store, _temp_dir) = temp_store().await;
        store
            .save(DocumentCategory::Draft, "memo.docx", b"first")
            .await
            .unwrap();
        store
            .save(DocumentCategory::Draft, "memo.docx", b"second")
            .await
            .unwrap();

        let content = store.read(DocumentCategory::Draft, "memo.docx").await.unwrap();
        assert_eq!(&content[..], b"second");
        assert!(!store.exists(DocumentCategory::Original, "memo.docx").await.unwrap());
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let (store, _temp_dir) = temp_store().await;
        let err = store
            .read(DocumentCategory::Pdf, "missing.pdf")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::NotFound {
                category: DocumentCategory::Pdf,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_promote_draft_moves_content() {
        let (store, _temp_dir) = temp_store().await;
        store
            .save(DocumentCategory::Original, "plan.docx", b"v1")
            .await
            .unwrap();
        store
            .save(DocumentCategory::Draft, "plan.docx", b"v2")
            .await
            .unwrap();

        store.promote_draft("plan.docx").await.unwrap();

        let original = store.read(DocumentCategory::Original, "plan.docx").await.unwrap();
        assert_eq!(&original[..], b"v2");
        assert!(!store.exists(DocumentCategory::Draft, "plan.docx").await.unwrap());
    }

    #[tokio::test]
    async fn test_promote_without_draft_leaves_original() {
        let (store, _temp_dir) = temp_store().await;
        store
            .save(DocumentCategory::Original, "plan.docx", b"v1")
            .await
            .unwrap();

        let err = store.promote_draft("plan.docx").await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::NotFound {
                category: DocumentCategory::Draft,
                ..
            }
        ));
        let original = store.read(DocumentCategory::Original, "plan.docx").await.unwrap();
        assert_eq!(&original[..], b"v1");
    }

    #[tokio::test]
    async fn test_list_only_returns_files() {
        let (store, _temp_dir) = temp_store().await;
        store
            .save(DocumentCategory::Original, "a.docx", b"a")
            .await
            .unwrap();
        store
            .save(DocumentCategory::Original, "b.docx", b"b")
            .await
            .unwrap();
        std::fs::create_dir(store.dir(DocumentCategory::Original).join("nested")).unwrap();

        let mut names = store.list(DocumentCategory::Original).await.unwrap();
        names.sort();
        assert_eq!(names, vec!["a.docx", "b.docx"]);
    }

    #[tokio::test]
    async fn test_locks_serialize_same_filename() {
        let locks = DocumentLocks::new();
        let guard = locks.lock("a.docx").await;

        // A different filename is not blocked.
        let other = locks.lock("b.docx").await;

        let locks2 = locks.clone();
        let waiter = tokio::spawn(async move {
            let _guard = locks2.lock("a.docx").await;
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
        drop(other);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_lock_entry_released_while_waiter_remains() {
        let locks = DocumentLocks::new();
        let guard = locks.lock("a.docx").await;

        let mut waiter = Box::pin(locks.lock("a.docx"));
        assert!(futures::poll!(&mut waiter).is_pending());

        // The waiter still references the entry, so releasing keeps it.
        drop(guard);
        assert_eq!(locks.len(), 1);

        drop(waiter.await);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_locks_on_many_names_leave_no_entries() {
        let locks = DocumentLocks::new();
        for i in 0..1000 {
            let _guard = locks.lock(&format!("ghost-{i}.docx")).await;
        }
        assert!(locks.is_empty());
    }
}
