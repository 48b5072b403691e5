//! Persistent, resumable job queue.
//!
//! Drives jobs strictly one at a time: the editing host behind the executor
//! is a single, non-reentrant resource, so only one batch may be actively
//! processing at any moment.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use vaultbatch_core::{
    Batch, BatchId, BatchProgress, BatchStatus, BatchStore, CheckpointHook, CoordinatorEvent,
    Error, EventChannel, JobExecutor, JobStatus, Result,
};

const DEFAULT_PERSIST_EVERY: usize = 5;

/// Aggregate result of one `process_batch` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    /// The processed batch.
    pub batch_id: BatchId,
    /// Jobs whose executor reported success.
    pub completed: usize,
    /// Jobs whose executor reported an error.
    pub failed: usize,
    /// Jobs never attempted (including jobs abandoned by cancellation).
    pub skipped: usize,
}

impl BatchOutcome {
    fn from_batch(batch: &Batch) -> Self {
        let counts = batch.counts();
        Self {
            batch_id: batch.id,
            completed: counts.completed,
            failed: counts.failed,
            skipped: counts.skipped,
        }
    }
}

/// Owns the persisted set of batches and processes them sequentially.
pub struct JobQueue {
    store: Arc<dyn BatchStore>,
    batches: Mutex<HashMap<BatchId, Batch>>,
    cancel_requests: Mutex<HashSet<BatchId>>,
    /// Held for the duration of `process_batch`; the host is serialized.
    active: Mutex<()>,
    persist_every: usize,
    events: EventChannel,
}

impl JobQueue {
    /// Creates a queue over `store`, loading every non-completed batch so
    /// interrupted runs can resume.
    pub fn new(store: Arc<dyn BatchStore>, events: EventChannel) -> Result<Self> {
        let open = store.load_open()?;
        let mut batches = HashMap::with_capacity(open.len());
        for batch in open {
            batches.insert(batch.id, batch);
        }
        Ok(Self {
            store,
            batches: Mutex::new(batches),
            cancel_requests: Mutex::new(HashSet::new()),
            active: Mutex::new(()),
            persist_every: DEFAULT_PERSIST_EVERY,
            events,
        })
    }

    /// Overrides how many terminal jobs may elapse between persists.
    #[must_use]
    pub fn with_persist_every(mut self, persist_every: usize) -> Self {
        self.persist_every = persist_every.max(1);
        self
    }

    /// Creates and immediately persists a pending batch, one job per file
    /// in the given order.
    ///
    /// # Errors
    /// Returns an error if `checkpoint_size` is zero or the batch cannot be
    /// persisted; a batch that was never durably recorded cannot promise a
    /// resume.
    pub async fn create_batch(
        &self,
        name: &str,
        files: Vec<PathBuf>,
        operation: &str,
        parameters: &BTreeMap<String, Value>,
        checkpoint_size: usize,
    ) -> Result<Batch> {
        if checkpoint_size == 0 {
            return Err(Error::InvalidConfig(
                "checkpoint_size must be at least 1".to_owned(),
            ));
        }

        let batch = Batch::new(name.to_owned(), files, operation, parameters, checkpoint_size);
        self.store.save(&batch)?;

        info!(
            target: "vaultbatch.queue",
            batch_id = %batch.id,
            name,
            jobs = batch.jobs.len(),
            checkpoint_size,
            "batch created"
        );
        self.batches.lock().await.insert(batch.id, batch.clone());
        Ok(batch)
    }

    /// Processes a batch from its persisted cursor to the end.
    ///
    /// Jobs run strictly in order; an executor error is recorded on its job
    /// and never aborts the loop. After every `checkpoint_size` completed
    /// jobs the checkpoint hook runs synchronously; a hook failure halts the
    /// batch as `Failed` with its cursor persisted and propagates as
    /// [`Error::RestartFailure`]. Cancellation is observed between jobs.
    ///
    /// Re-invoking on a completed batch performs no executor calls and
    /// returns the stored counts.
    pub async fn process_batch<F>(
        &self,
        batch_id: BatchId,
        executor: &dyn JobExecutor,
        mut on_progress: F,
        checkpoint: &dyn CheckpointHook,
    ) -> Result<BatchOutcome>
    where
        F: FnMut(usize, usize) + Send,
    {
        let _active = self
            .active
            .try_lock()
            .map_err(|_| Error::HostBusy)?;

        let mut batch = {
            let batches = self.batches.lock().await;
            batches
                .get(&batch_id)
                .cloned()
                .ok_or(Error::BatchNotFound(batch_id))?
        };

        if batch.status.is_terminal() {
            debug!(
                target: "vaultbatch.queue",
                batch_id = %batch.id,
                status = %batch.status,
                "batch already terminal, nothing to process"
            );
            let _ = self.take_cancel_request(batch_id).await;
            return Ok(BatchOutcome::from_batch(&batch));
        }

        if batch.cursor() > 0 {
            info!(
                target: "vaultbatch.queue",
                batch_id = %batch.id,
                cursor = batch.cursor(),
                "resuming batch from persisted cursor"
            );
        }

        batch.status = BatchStatus::InProgress;
        self.persist(&batch);
        self.sync(&batch).await;
        self.events.send(CoordinatorEvent::RunStarted {
            batch_id: batch.id,
            name: batch.name.clone(),
        });

        let total = batch.jobs.len();
        let mut completed_this_run = 0_usize;
        let mut unpersisted = 0_usize;

        let mut index = batch.cursor();
        while index < total {
            if self.take_cancel_request(batch_id).await {
                info!(
                    target: "vaultbatch.queue",
                    batch_id = %batch.id,
                    at_job = index,
                    "cancellation observed at job boundary"
                );
                Self::skip_remaining(&mut batch, index);
                batch.status = BatchStatus::Cancelled;
                self.persist(&batch);
                self.sync(&batch).await;
                return Ok(BatchOutcome::from_batch(&batch));
            }

            if batch.jobs[index].status.is_terminal() {
                // Already settled by a prior run; never re-executed.
                batch.advance_cursor(index + 1);
                index += 1;
                continue;
            }

            if batch.jobs[index].status == JobStatus::InProgress {
                warn!(
                    target: "vaultbatch.queue",
                    batch_id = %batch.id,
                    job_id = %batch.jobs[index].id,
                    file = %batch.jobs[index].file.display(),
                    attempts = batch.jobs[index].attempts,
                    "job was interrupted mid-attempt, re-executing"
                );
            }

            batch.jobs[index].begin_attempt();
            self.persist(&batch);
            self.sync(&batch).await;
            self.events.send(CoordinatorEvent::JobStarted {
                batch_id: batch.id,
                job_id: batch.jobs[index].id,
                file: batch.jobs[index].file.clone(),
            });

            match executor.execute(&batch.jobs[index]).await {
                Ok(()) => {
                    batch.jobs[index].finish();
                    completed_this_run += 1;
                    debug!(
                        target: "vaultbatch.queue",
                        batch_id = %batch.id,
                        job_id = %batch.jobs[index].id,
                        "job completed"
                    );
                }
                Err(error) => {
                    warn!(
                        target: "vaultbatch.queue",
                        batch_id = %batch.id,
                        job_id = %batch.jobs[index].id,
                        file = %batch.jobs[index].file.display(),
                        %error,
                        "job failed, continuing with next job"
                    );
                    batch.jobs[index].fail(error.to_string());
                }
            }
            batch.advance_cursor(index + 1);
            unpersisted += 1;

            let is_last = index + 1 == total;
            if unpersisted >= self.persist_every || is_last {
                self.persist(&batch);
                unpersisted = 0;
            }
            self.sync(&batch).await;

            on_progress(index + 1, total);
            self.events.send(CoordinatorEvent::JobFinished {
                batch_id: batch.id,
                job_id: batch.jobs[index].id,
                status: batch.jobs[index].status,
                error: batch.jobs[index].error.clone(),
            });

            let at_checkpoint = batch.jobs[index].status == JobStatus::Completed
                && completed_this_run % batch.checkpoint_size == 0;
            if at_checkpoint {
                if unpersisted > 0 {
                    // The cursor must be durable before the host goes down.
                    self.persist(&batch);
                    unpersisted = 0;
                }
                info!(
                    target: "vaultbatch.queue",
                    batch_id = %batch.id,
                    completed = completed_this_run,
                    "checkpoint reached, handing off for host restart"
                );
                self.events.send(CoordinatorEvent::Checkpoint {
                    batch_id: batch.id,
                    completed: completed_this_run,
                });
                if let Err(error) = checkpoint.on_checkpoint(&batch).await {
                    batch.status = BatchStatus::Failed;
                    self.persist(&batch);
                    self.sync(&batch).await;
                    let restart_error = match error {
                        restart @ Error::RestartFailure(_) => restart,
                        other => Error::RestartFailure(other.to_string()),
                    };
                    warn!(
                        target: "vaultbatch.queue",
                        batch_id = %batch.id,
                        error = %restart_error,
                        cursor = batch.cursor(),
                        "checkpoint failed, batch halted for later resume"
                    );
                    return Err(restart_error);
                }
            }

            index += 1;
        }

        batch.status = BatchStatus::Completed;
        self.persist(&batch);
        self.sync(&batch).await;

        let outcome = BatchOutcome::from_batch(&batch);
        info!(
            target: "vaultbatch.queue",
            batch_id = %batch.id,
            completed = outcome.completed,
            failed = outcome.failed,
            skipped = outcome.skipped,
            "batch processing finished"
        );
        Ok(outcome)
    }

    /// Progress snapshot for a batch.
    pub async fn get_progress(&self, batch_id: BatchId) -> Result<BatchProgress> {
        let batches = self.batches.lock().await;
        let batch = batches
            .get(&batch_id)
            .ok_or(Error::BatchNotFound(batch_id))?;
        Ok(batch.progress())
    }

    /// Batches that were interrupted mid-run and can be resumed.
    pub async fn resumable_batches(&self) -> Vec<Batch> {
        self.batches
            .lock()
            .await
            .values()
            .filter(|batch| batch.status == BatchStatus::InProgress)
            .cloned()
            .collect()
    }

    /// Requests cooperative cancellation.
    ///
    /// An actively processing batch observes the request at its next job
    /// boundary; an in-flight executor call always runs to completion. A
    /// batch that is not processing is cancelled immediately.
    pub async fn cancel_batch(&self, batch_id: BatchId) -> Result<()> {
        let mut batches = self.batches.lock().await;
        let batch = batches
            .get_mut(&batch_id)
            .ok_or(Error::BatchNotFound(batch_id))?;
        if batch.status.is_terminal() {
            return Ok(());
        }

        self.cancel_requests.lock().await.insert(batch_id);
        info!(target: "vaultbatch.queue", batch_id = %batch_id, "cancellation requested");

        // If nothing is processing, settle the cancellation here. A running
        // processor consumes the request at its next boundary instead.
        if self.active.try_lock().is_ok() {
            let cursor = batch.cursor();
            Self::skip_remaining(batch, cursor);
            batch.status = BatchStatus::Cancelled;
            if let Err(error) = self.store.save(batch) {
                warn!(
                    target: "vaultbatch.queue",
                    batch_id = %batch_id,
                    %error,
                    "failed to persist cancellation"
                );
            }
            self.cancel_requests.lock().await.remove(&batch_id);
        }
        Ok(())
    }

    /// Removes a terminal batch from the store once its history is no
    /// longer needed.
    pub async fn delete_batch(&self, batch_id: BatchId) -> Result<()> {
        let mut batches = self.batches.lock().await;
        let batch = batches
            .get(&batch_id)
            .ok_or(Error::BatchNotFound(batch_id))?;
        if !batch.status.is_terminal() {
            return Err(Error::Other(format!(
                "batch {batch_id} is {} and cannot be deleted",
                batch.status
            )));
        }
        self.store.delete(batch_id)?;
        batches.remove(&batch_id);
        Ok(())
    }

    /// Marks every non-terminal job from `from` on as skipped.
    fn skip_remaining(batch: &mut Batch, from: usize) {
        for job in batch.jobs.iter_mut().skip(from) {
            if !job.status.is_terminal() {
                job.status = JobStatus::Skipped;
            }
        }
    }

    /// Best-effort persist: a failing store degrades the resume guarantee,
    /// not forward progress.
    fn persist(&self, batch: &Batch) {
        if let Err(error) = self.store.save(batch) {
            warn!(
                target: "vaultbatch.queue",
                batch_id = %batch.id,
                %error,
                "persist failed, continuing in-memory"
            );
        }
    }

    async fn sync(&self, batch: &Batch) {
        self.batches.lock().await.insert(batch.id, batch.clone());
    }

    async fn take_cancel_request(&self, batch_id: BatchId) -> bool {
        self.cancel_requests.lock().await.remove(&batch_id)
    }
}
