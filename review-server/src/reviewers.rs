//! Reviewer directory: filename -> reviewer email
//!
//! One active reviewer per filename, last write wins. The JSON-backed
//! implementation keeps the whole map in memory and rewrites the file
//! wholesale on every [`ReviewerDirectory::persist`].

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum ReviewerError {
    #[error("Failed to read reviewer file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Reviewer file {path} is not a JSON object of strings: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to write reviewer file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to encode reviewer map: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Key-value store of reviewer assignments.
///
/// `set` only changes the in-memory view; nothing is durable until `persist`.
#[async_trait]
pub trait ReviewerDirectory: Send + Sync {
    async fn get(&self, filename: &str) -> Option<String>;

    async fn set(&self, filename: &str, email: &str);

    async fn persist(&self) -> Result<(), ReviewerError>;
}

#[derive(Debug)]
pub struct JsonReviewerDirectory {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl JsonReviewerDirectory {
    /// Load the map from `path`. A missing file is an empty map.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, ReviewerError> {
        let path = path.into();
        let entries: BTreeMap<String, String> = match fs::read(&path).await {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|source| ReviewerError::Parse {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(ReviewerError::Read { path, source }),
        };
        tracing::info!(path = %path.display(), count = entries.len(), "Loaded reviewer assignments");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub async fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.lock().await.clone()
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "reviewers.json".to_string());
        self.path.with_file_name(format!(".{name}.tmp"))
    }
}

#[async_trait]
impl ReviewerDirectory for JsonReviewerDirectory {
    async fn get(&self, filename: &str) -> Option<String> {
        self.entries.lock().await.get(filename).cloned()
    }

    async fn set(&self, filename: &str, email: &str) {
        self.entries
            .lock()
            .await
            .insert(filename.to_string(), email.to_string());
    }

    async fn persist(&self) -> Result<(), ReviewerError> {
        // Held across the write so snapshots land on disk in order.
        let entries = self.entries.lock().await;
        let encoded = serde_json::to_vec_pretty(&*entries)?;

        let temp = self.temp_path();
        fs::write(&temp, &encoded)
            .await
            .map_err(|source| ReviewerError::Write {
                path: temp.clone(),
                source,
            })?;
        fs::rename(&temp, &self.path)
            .await
            .map_err(|source| ReviewerError::Write {
                path: self.path.clone(),
                source,
            })?;

        tracing::debug!(path = %self.path.display(), count = entries.len(), "Persisted reviewer assignments");
        Ok(())
    }
}
