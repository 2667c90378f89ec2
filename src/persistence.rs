//! Persistence collaborator
//!
//! The builder core does not own storage; it talks to a [`DocumentStore`].
//! Two implementations ship with the crate: an in-memory store (tests, WASM)
//! and a directory of JSON files.
//!
//! Every save bumps a per-key revision. Passing `expected_revision` turns a
//! save into a compare-and-set, which is how concurrent editing sessions can
//! detect each other instead of silently overwriting.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::document::{BuilderDocument, DocumentError};
use crate::hooks::HookError;

/// Reference to a host-application record (model type + numeric id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRef {
    pub model_type: String,
    pub id: u64,
}

impl RecordRef {
    pub fn new(model_type: impl Into<String>, id: u64) -> Self {
        Self {
            model_type: model_type.into(),
            id,
        }
    }
}

/// A stored document and its revision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub revision: u64,
    pub document: BuilderDocument,
}

/// Load/save interface for builder documents
pub trait DocumentStore: Send + Sync {
    /// Load the document stored under `key`, if any
    fn load(&self, key: &str) -> Result<Option<StoredDocument>, StoreError>;

    /// Store `document` under `key` and return the new revision.
    ///
    /// With `expected_revision = Some(r)` the save only succeeds when the
    /// current revision is `r` (0 for a key that was never saved); otherwise
    /// it fails with [`StoreError::Conflict`]. `None` is last-write-wins.
    fn save(
        &self,
        key: &str,
        document: &BuilderDocument,
        expected_revision: Option<u64>,
    ) -> Result<u64, StoreError>;
}

fn check_revision(key: &str, current: u64, expected: Option<u64>) -> Result<(), StoreError> {
    match expected {
        Some(expected) if expected != current => Err(StoreError::Conflict {
            key: key.to_string(),
            expected,
            actual: current,
        }),
        _ => Ok(()),
    }
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<String, StoredDocument>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn load(&self, key: &str) -> Result<Option<StoredDocument>, StoreError> {
        Ok(self.documents.lock().get(key).cloned())
    }

    fn save(
        &self,
        key: &str,
        document: &BuilderDocument,
        expected_revision: Option<u64>,
    ) -> Result<u64, StoreError> {
        document.validate()?;
        let mut documents = self.documents.lock();
        let current = documents.get(key).map(|d| d.revision).unwrap_or(0);
        check_revision(key, current, expected_revision)?;

        let revision = current + 1;
        documents.insert(
            key.to_string(),
            StoredDocument {
                revision,
                document: document.clone(),
            },
        );
        Ok(revision)
    }
}

/// One `<key>.json` file per document inside a directory
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    /// Serializes read-check-write cycles within this process
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Create the store, creating `dir` if needed
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }

    fn read(&self, path: &Path) -> Result<Option<StoredDocument>, StoreError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stored: StoredDocument = serde_json::from_str(&content)?;
        stored.document.validate()?;
        Ok(Some(stored))
    }
}

impl DocumentStore for JsonFileStore {
    fn load(&self, key: &str) -> Result<Option<StoredDocument>, StoreError> {
        let path = self.path_for(key)?;
        self.read(&path)
    }

    fn save(
        &self,
        key: &str,
        document: &BuilderDocument,
        expected_revision: Option<u64>,
    ) -> Result<u64, StoreError> {
        document.validate()?;
        let path = self.path_for(key)?;
        let _guard = self.write_lock.lock();

        let current = self.read(&path)?.map(|d| d.revision).unwrap_or(0);
        check_revision(key, current, expected_revision)?;

        let stored = StoredDocument {
            revision: current + 1,
            document: document.clone(),
        };
        let json = serde_json::to_string_pretty(&stored)?;

        // Write then rename so readers never see a partial file
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;

        tracing::debug!(key, revision = stored.revision, path = %path.display(), "document written");
        Ok(stored.revision)
    }
}

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Invalid document key: {0:?}")]
    InvalidKey(String),

    /// Optimistic revision check failed
    #[error("Revision conflict for '{key}': expected {expected}, found {actual}")]
    Conflict { key: String, expected: u64, actual: u64 },

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Hook(#[from] HookError),
}

impl StoreError {
    /// Message safe to show to end users
    pub fn user_message(&self) -> &'static str {
        match self {
            StoreError::Conflict { .. } => {
                "The document was changed elsewhere. Reload it before saving again."
            }
            _ => "The document could not be saved.",
        }
    }
}
