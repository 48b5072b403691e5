//! Batch-level lock coordination against the external vault.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};
use vaultbatch_core::{Availability, FileStatus, ImpactReport, VaultClient};

/// Translates batch-level lock operations into per-file vault calls.
///
/// Every per-file failure is contained: a status query error classifies that
/// file as not found, a lock or unlock error reports `false` for that file.
/// No single file ever aborts a batch-level call.
pub struct LockCoordinator {
    vault: Arc<dyn VaultClient>,
    /// Acting user; a lock already held by this actor counts as available.
    actor: String,
}

impl LockCoordinator {
    /// Creates a coordinator acting as `actor` against the given vault.
    pub fn new(vault: Arc<dyn VaultClient>, actor: impl Into<String>) -> Self {
        Self {
            vault,
            actor: actor.into(),
        }
    }

    /// The acting user name.
    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// Classifies each file's availability for batch editing.
    ///
    /// Never mutates vault state. A file is `Available` only if it is
    /// unlocked (or locked by the acting user) and not in a read-only
    /// lifecycle state.
    pub async fn classify(&self, files: &[PathBuf]) -> BTreeMap<PathBuf, Availability> {
        let mut classified = BTreeMap::new();
        for file in files {
            let availability = match self.vault.status(file).await {
                Ok(status) => Self::classify_status(&status, &self.actor),
                Err(error) => {
                    warn!(
                        target: "vaultbatch.vault",
                        file = %file.display(),
                        %error,
                        "status query failed, classifying as not found"
                    );
                    Availability::NotFound
                }
            };
            debug!(
                target: "vaultbatch.vault",
                file = %file.display(),
                availability = %availability,
                "classified"
            );
            classified.insert(file.clone(), availability);
        }
        classified
    }

    fn classify_status(status: &FileStatus, actor: &str) -> Availability {
        if status.state.is_read_only() {
            return Availability::ReleasedReadOnly;
        }
        match &status.holder {
            None => Availability::Available,
            Some(holder) if holder == actor => Availability::Available,
            Some(holder) => Availability::LockedByOther {
                holder: holder.clone(),
            },
        }
    }

    /// Transitive impact analysis: every document that directly or
    /// indirectly references one of `files`.
    ///
    /// Breadth-first over "referenced by" edges with a visited set, so a
    /// document is never re-queried and reference cycles terminate. Query
    /// errors are treated as "no references" for that document.
    pub async fn impact(&self, files: &[PathBuf]) -> ImpactReport {
        let targets: Vec<PathBuf> = files.to_vec();
        let mut visited: BTreeSet<PathBuf> = targets.iter().cloned().collect();
        let mut frontier: VecDeque<PathBuf> = targets.iter().cloned().collect();
        let mut referencing = BTreeSet::new();

        while let Some(file) = frontier.pop_front() {
            let parents = match self.vault.referencing_documents(&file).await {
                Ok(parents) => parents,
                Err(error) => {
                    warn!(
                        target: "vaultbatch.vault",
                        file = %file.display(),
                        %error,
                        "reference query failed, treating as leaf"
                    );
                    Vec::new()
                }
            };
            for parent in parents {
                if visited.insert(parent.clone()) {
                    referencing.insert(parent.clone());
                    frontier.push_back(parent);
                }
            }
        }

        debug!(
            target: "vaultbatch.vault",
            targets = targets.len(),
            referencing = referencing.len(),
            "impact analysis done"
        );
        ImpactReport::new(targets, referencing)
    }

    /// Attempts an exclusive lock per file. Partial failure is expected and
    /// non-fatal; each file's outcome is reported independently.
    pub async fn acquire(&self, files: &[PathBuf]) -> BTreeMap<PathBuf, bool> {
        let mut acquired = BTreeMap::new();
        for file in files {
            let locked = match self.vault.lock(file).await {
                Ok(locked) => locked,
                Err(error) => {
                    warn!(
                        target: "vaultbatch.vault",
                        file = %file.display(),
                        %error,
                        "lock attempt failed"
                    );
                    false
                }
            };
            acquired.insert(file.clone(), locked);
        }
        acquired
    }

    /// Best-effort unlock with an audit comment.
    ///
    /// Called for every file that was ever successfully acquired, regardless
    /// of whether its job later failed.
    pub async fn release(&self, files: &[PathBuf], comment: &str) -> BTreeMap<PathBuf, bool> {
        let mut released = BTreeMap::new();
        for file in files {
            let unlocked = match self.vault.unlock(file, comment).await {
                Ok(unlocked) => unlocked,
                Err(error) => {
                    warn!(
                        target: "vaultbatch.vault",
                        file = %file.display(),
                        %error,
                        "unlock attempt failed"
                    );
                    false
                }
            };
            released.insert(file.clone(), unlocked);
        }
        released
    }
}
