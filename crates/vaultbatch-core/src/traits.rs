//! Collaborator seams. All physical effects (vault calls, file edits, host
//! control, persistence) go through these traits, with one production
//! adapter and one in-memory fake per seam.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::batch::{Batch, BatchId};
use crate::error::Result;
use crate::job::Job;
use crate::resource::{Tier, TierProfile};
use crate::vault::FileStatus;

/// Client for the external versioned-file vault.
///
/// The vault's lock is the authoritative mutual-exclusion mechanism per
/// file; this system never assumes a lock it did not successfully acquire.
#[async_trait]
pub trait VaultClient: Send + Sync {
    /// Current lock holder and lifecycle state of a document.
    async fn status(&self, file: &Path) -> Result<FileStatus>;

    /// Attempts to take the exclusive lock. `Ok(false)` means the vault
    /// declined (e.g. the document is held elsewhere).
    async fn lock(&self, file: &Path) -> Result<bool>;

    /// Releases the exclusive lock with an audit comment.
    async fn unlock(&self, file: &Path, comment: &str) -> Result<bool>;

    /// Documents that directly reference `file` (one level, not transitive).
    async fn referencing_documents(&self, file: &Path) -> Result<Vec<PathBuf>>;
}

/// Executes one job inside the editing host.
///
/// Supplied by the caller per operation kind. Treated as an opaque,
/// potentially slow, non-cancellable unit of work. Implementations must be
/// idempotent: jobs interrupted mid-attempt are re-executed on resume
/// (at-least-once delivery), so a partially applied edit must be safe to
/// apply again.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Performs the job's edit. Errors are recorded on the job and never
    /// abort the batch.
    async fn execute(&self, job: &Job) -> Result<()>;
}

/// Controls the single-instance editing host.
#[async_trait]
pub trait HostController: Send + Sync {
    /// Applies a degradation profile to the host's settings.
    async fn apply_tier_profile(&self, tier: Tier, profile: &TierProfile) -> Result<()>;

    /// Restarts the host application and reconnects. Blocks until the host
    /// is usable again.
    async fn restart(&self) -> Result<()>;
}

/// Invoked by the job queue after every `checkpoint_size` completed jobs.
///
/// Processing blocks until the hook returns; a hook error halts the batch
/// with its cursor persisted.
#[async_trait]
pub trait CheckpointHook: Send + Sync {
    /// Called synchronously at each checkpoint.
    async fn on_checkpoint(&self, batch: &Batch) -> Result<()>;
}

/// Persistence for batches, keyed by batch id.
pub trait BatchStore: Send + Sync {
    /// Loads every batch that has not completed, for startup resume.
    fn load_open(&self) -> Result<Vec<Batch>>;

    /// Persists a batch, including all of its jobs.
    fn save(&self, batch: &Batch) -> Result<()>;

    /// Removes a batch from the store.
    fn delete(&self, batch_id: BatchId) -> Result<()>;
}
