//! JSON-file batch persistence.
//!
//! One pretty-printed JSON file per batch, named by batch id, under a
//! storage directory. Whatever serialization the host environment prefers
//! would do; JSON keeps interrupted batches inspectable by hand.

use std::fs;
use std::path::PathBuf;

use serde_json::{from_str, to_string_pretty};
use tracing::{debug, warn};
use vaultbatch_core::{Batch, BatchId, BatchStatus, BatchStore, Error, Result};

/// Directory-backed [`BatchStore`].
#[derive(Debug, Clone)]
pub struct JsonBatchStore {
    storage_dir: PathBuf,
}

impl JsonBatchStore {
    /// Creates a store rooted at `storage_dir`, creating the directory if
    /// needed.
    pub fn new(storage_dir: PathBuf) -> Result<Self> {
        if !storage_dir.exists() {
            fs::create_dir_all(&storage_dir).map_err(|error| {
                Error::Persistence(format!(
                    "failed to create batch storage directory {}: {error}",
                    storage_dir.display()
                ))
            })?;
        }
        Ok(Self { storage_dir })
    }

    fn batch_path(&self, batch_id: BatchId) -> PathBuf {
        self.storage_dir.join(format!("{batch_id}.json"))
    }
}

impl BatchStore for JsonBatchStore {
    /// Loads every non-completed batch.
    ///
    /// Unreadable or unparsable files are logged and skipped; one corrupt
    /// record must not block the resumable batches around it.
    fn load_open(&self) -> Result<Vec<Batch>> {
        let entries = fs::read_dir(&self.storage_dir).map_err(|error| {
            Error::Persistence(format!(
                "failed to read batch storage directory {}: {error}",
                self.storage_dir.display()
            ))
        })?;

        let mut batches = Vec::new();
        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(error) => {
                    warn!(target: "vaultbatch.queue", %error, "skipping unreadable dir entry");
                    continue;
                }
            };
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            let contents = match fs::read_to_string(&path) {
                Ok(contents) => contents,
                Err(error) => {
                    warn!(
                        target: "vaultbatch.queue",
                        file = %path.display(),
                        %error,
                        "skipping unreadable batch file"
                    );
                    continue;
                }
            };
            let batch: Batch = match from_str(&contents) {
                Ok(batch) => batch,
                Err(error) => {
                    warn!(
                        target: "vaultbatch.queue",
                        file = %path.display(),
                        %error,
                        "skipping corrupt batch file"
                    );
                    continue;
                }
            };

            if batch.status == BatchStatus::Completed {
                continue;
            }
            batches.push(batch);
        }

        debug!(
            target: "vaultbatch.queue",
            count = batches.len(),
            "loaded open batches"
        );
        Ok(batches)
    }

    fn save(&self, batch: &Batch) -> Result<()> {
        let json = to_string_pretty(batch)
            .map_err(|error| Error::Persistence(format!("failed to serialize batch: {error}")))?;
        fs::write(self.batch_path(batch.id), json).map_err(|error| {
            Error::Persistence(format!("failed to write batch {}: {error}", batch.id))
        })
    }

    fn delete(&self, batch_id: BatchId) -> Result<()> {
        let path = self.batch_path(batch_id);
        if path.exists() {
            fs::remove_file(&path).map_err(|error| {
                Error::Persistence(format!("failed to delete batch {batch_id}: {error}"))
            })?;
        }
        Ok(())
    }
}
