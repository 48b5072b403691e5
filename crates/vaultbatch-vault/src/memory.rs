//! Deterministic in-memory vault for tests and local development.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use vaultbatch_core::{Error, FileStatus, LifecycleState, Result, VaultClient};

/// One seeded vault document.
#[derive(Debug, Clone)]
pub struct VaultRecord {
    /// Lifecycle state of the document.
    pub state: LifecycleState,
    /// Actor currently holding the lock, if any.
    pub holder: Option<String>,
    /// Current vault version.
    pub version: u32,
    /// Documents that directly reference this one.
    pub referenced_by: Vec<PathBuf>,
}

impl VaultRecord {
    /// An unlocked, editable document.
    pub fn in_work() -> Self {
        Self::with_state(LifecycleState::InWork)
    }

    /// A document in the given lifecycle state, unlocked.
    pub fn with_state(state: LifecycleState) -> Self {
        Self {
            state,
            holder: None,
            version: 1,
            referenced_by: Vec::new(),
        }
    }

    /// Seeds the document as locked by `holder`.
    #[must_use]
    pub fn held_by(mut self, holder: impl Into<String>) -> Self {
        self.holder = Some(holder.into());
        self
    }

    /// Adds a document that references this one.
    #[must_use]
    pub fn referenced_by(mut self, parent: PathBuf) -> Self {
        self.referenced_by.push(parent);
        self
    }
}

struct Inner {
    actor: String,
    records: RwLock<HashMap<PathBuf, VaultRecord>>,
    failing_locks: RwLock<HashSet<PathBuf>>,
    failing_status: RwLock<HashSet<PathBuf>>,
    unlock_log: Mutex<Vec<(PathBuf, String)>>,
}

/// In-memory [`VaultClient`] with seedable records, failure injection, and
/// an unlock audit log for exactly-once release assertions.
#[derive(Clone)]
pub struct InMemoryVault {
    inner: Arc<Inner>,
}

impl InMemoryVault {
    /// Creates an empty vault whose locks are taken as `actor`.
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                actor: actor.into(),
                records: RwLock::new(HashMap::new()),
                failing_locks: RwLock::new(HashSet::new()),
                failing_status: RwLock::new(HashSet::new()),
                unlock_log: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Seeds or replaces a document.
    pub async fn insert(&self, file: PathBuf, record: VaultRecord) {
        self.inner.records.write().await.insert(file, record);
    }

    /// Makes subsequent `lock` calls on `file` return a vault error.
    pub async fn fail_lock(&self, file: PathBuf) {
        self.inner.failing_locks.write().await.insert(file);
    }

    /// Makes subsequent `status` calls on `file` return a vault error.
    pub async fn fail_status(&self, file: PathBuf) {
        self.inner.failing_status.write().await.insert(file);
    }

    /// Every successful unlock, in order, with its audit comment.
    pub async fn unlock_log(&self) -> Vec<(PathBuf, String)> {
        self.inner.unlock_log.lock().await.clone()
    }

    /// Current lock holder of `file`, if the document exists and is held.
    pub async fn holder_of(&self, file: &Path) -> Option<String> {
        self.inner
            .records
            .read()
            .await
            .get(file)
            .and_then(|record| record.holder.clone())
    }
}

#[async_trait]
impl VaultClient for InMemoryVault {
    async fn status(&self, file: &Path) -> Result<FileStatus> {
        if self.inner.failing_status.read().await.contains(file) {
            return Err(Error::Other(format!(
                "vault error reading status of {}",
                file.display()
            )));
        }
        let records = self.inner.records.read().await;
        let record = records.get(file).ok_or_else(|| {
            Error::Other(format!("document not in vault: {}", file.display()))
        })?;
        Ok(FileStatus {
            state: record.state,
            holder: record.holder.clone(),
            version: record.version,
        })
    }

    async fn lock(&self, file: &Path) -> Result<bool> {
        if self.inner.failing_locks.read().await.contains(file) {
            return Err(Error::LockAcquireFailed {
                path: file.to_path_buf(),
                reason: "injected vault failure".to_owned(),
            });
        }
        let mut records = self.inner.records.write().await;
        let Some(record) = records.get_mut(file) else {
            return Ok(false);
        };
        if record.state.is_read_only() {
            return Ok(false);
        }
        match &record.holder {
            Some(holder) if holder != &self.inner.actor => Ok(false),
            _ => {
                record.holder = Some(self.inner.actor.clone());
                Ok(true)
            }
        }
    }

    async fn unlock(&self, file: &Path, comment: &str) -> Result<bool> {
        let mut records = self.inner.records.write().await;
        let Some(record) = records.get_mut(file) else {
            return Ok(false);
        };
        if record.holder.as_deref() != Some(self.inner.actor.as_str()) {
            return Ok(false);
        }
        record.holder = None;
        record.version += 1;
        self.inner
            .unlock_log
            .lock()
            .await
            .push((file.to_path_buf(), comment.to_owned()));
        Ok(true)
    }

    async fn referencing_documents(&self, file: &Path) -> Result<Vec<PathBuf>> {
        Ok(self
            .inner
            .records
            .read()
            .await
            .get(file)
            .map(|record| record.referenced_by.clone())
            .unwrap_or_default())
    }
}
