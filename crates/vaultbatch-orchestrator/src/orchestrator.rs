//! Sequencing of one batch run: classify, analyze impact, lock, process
//! with checkpoint restarts, release, summarize.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use vaultbatch_core::{
    Batch, CheckpointHook, CoordinatorEvent, Error, EventChannel, Job, JobExecutor, Result,
    RunSummary, SkipReason, SkippedFile, Tier, TierProfiles,
};
use vaultbatch_queue::JobQueue;
use vaultbatch_vault::LockCoordinator;

use crate::host::{Host, HostLease};

const DEFAULT_CHECKPOINT_SIZE: usize = 25;

/// Caller's description of one batch run.
#[derive(Debug, Clone)]
pub struct BatchRunRequest {
    /// Batch name, used in summaries and audit comments.
    pub name: String,
    /// Files to edit, in processing order.
    pub files: Vec<PathBuf>,
    /// Operation kind, opaque to the coordination layer.
    pub operation: String,
    /// Operation parameters, opaque to the coordination layer.
    pub parameters: BTreeMap<String, Value>,
    /// Completed jobs per host-restart cycle.
    pub checkpoint_size: usize,
    /// Audit comment attached when locks are released.
    pub release_comment: String,
}

impl BatchRunRequest {
    /// Creates a request with default checkpointing and release comment.
    pub fn new(name: impl Into<String>, files: Vec<PathBuf>, operation: impl Into<String>) -> Self {
        let name = name.into();
        let release_comment = format!("batch edit '{name}' finished");
        Self {
            name,
            files,
            operation: operation.into(),
            parameters: BTreeMap::new(),
            checkpoint_size: DEFAULT_CHECKPOINT_SIZE,
            release_comment,
        }
    }

    /// Sets the checkpoint size.
    #[must_use]
    pub fn with_checkpoint_size(mut self, checkpoint_size: usize) -> Self {
        self.checkpoint_size = checkpoint_size;
        self
    }

    /// Sets the operation parameters.
    #[must_use]
    pub fn with_parameters(mut self, parameters: BTreeMap<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Sets the release audit comment.
    #[must_use]
    pub fn with_release_comment(mut self, comment: impl Into<String>) -> Self {
        self.release_comment = comment.into();
        self
    }
}

/// Phases of one batch run. `Done` is terminal whether the outcome was full
/// success, partial success, or abort; release always executes before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    NotStarted,
    Classifying,
    Locking,
    Processing,
    Releasing,
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotStarted => "not_started",
            Self::Classifying => "classifying",
            Self::Locking => "locking",
            Self::Processing => "processing",
            Self::Releasing => "releasing",
            Self::Done => "done",
        };
        formatter.write_str(label)
    }
}

/// Checkpoint hook that restarts the editing host through the run's lease.
struct HostRestartHook {
    lease: Arc<HostLease>,
}

#[async_trait]
impl CheckpointHook for HostRestartHook {
    async fn on_checkpoint(&self, batch: &Batch) -> Result<()> {
        info!(
            target: "vaultbatch.orchestrator",
            batch_id = %batch.id,
            "checkpoint: restarting host before continuing"
        );
        self.lease.restart().await
    }
}

/// Executor wrapper that applies monitor signals at job boundaries.
///
/// Tier changes and restart pressure arrive asynchronously from the
/// monitor; they are acted on here, before the next job, so the sequential
/// processing loop stays the single source of truth for batch progress.
struct PressureAwareExecutor {
    inner: Arc<dyn JobExecutor>,
    lease: Arc<HostLease>,
    profiles: TierProfiles,
    pending_tier: Arc<StdMutex<Option<Tier>>>,
    restart_pressure: Arc<AtomicBool>,
}

#[async_trait]
impl JobExecutor for PressureAwareExecutor {
    async fn execute(&self, job: &Job) -> Result<()> {
        let pending = self
            .pending_tier
            .lock()
            .ok()
            .and_then(|mut guard| guard.take());
        if let Some(tier) = pending {
            // Settings application is best-effort; a refusal must not fail
            // the job about to run.
            if let Err(error) = self
                .lease
                .apply_tier_profile(tier, self.profiles.get(tier))
                .await
            {
                warn!(
                    target: "vaultbatch.orchestrator",
                    tier = %tier,
                    %error,
                    "failed to apply tier profile"
                );
            }
        }

        if self.restart_pressure.swap(false, Ordering::SeqCst) {
            info!(
                target: "vaultbatch.orchestrator",
                file = %job.file.display(),
                "restart pressure observed, cycling host before next job"
            );
            self.lease.restart().await?;
        }

        self.inner.execute(job).await
    }
}

/// Composes the lock coordinator, job queue, and host lease into one batch
/// run.
pub struct BatchOrchestrator {
    coordinator: LockCoordinator,
    queue: Arc<JobQueue>,
    host: Host,
    events: EventChannel,
    profiles: TierProfiles,
    pending_tier: Arc<StdMutex<Option<Tier>>>,
    restart_pressure: Arc<AtomicBool>,
}

impl BatchOrchestrator {
    /// Creates an orchestrator over the given collaborators.
    pub fn new(
        coordinator: LockCoordinator,
        queue: Arc<JobQueue>,
        host: Host,
        events: EventChannel,
    ) -> Self {
        Self {
            coordinator,
            queue,
            host,
            events,
            profiles: TierProfiles::default(),
            pending_tier: Arc::new(StdMutex::new(None)),
            restart_pressure: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Sets the host settings bags applied on tier changes.
    #[must_use]
    pub fn with_profiles(mut self, profiles: TierProfiles) -> Self {
        self.profiles = profiles;
        self
    }

    /// Consumes a resource monitor's event stream.
    ///
    /// Tier changes and restart pressure are recorded and acted on at the
    /// next job boundary; the monitor never mutates run state directly.
    /// Events are forwarded to this orchestrator's event channel so callers
    /// see one stream.
    pub fn attach_monitor_events(
        &self,
        mut receiver: UnboundedReceiver<CoordinatorEvent>,
    ) -> JoinHandle<()> {
        let pending_tier = Arc::clone(&self.pending_tier);
        let restart_pressure = Arc::clone(&self.restart_pressure);
        let events = self.events.clone();

        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                match &event {
                    CoordinatorEvent::TierChanged { to, .. } => {
                        if let Ok(mut guard) = pending_tier.lock() {
                            *guard = Some(*to);
                        }
                    }
                    CoordinatorEvent::RestartNeeded { .. } => {
                        restart_pressure.store(true, Ordering::SeqCst);
                    }
                    _ => {}
                }
                events.send(event);
            }
            debug!(target: "vaultbatch.orchestrator", "monitor event stream closed");
        })
    }

    /// Runs one batch job end to end.
    ///
    /// Classify, analyze impact, lock, process with checkpoint host
    /// restarts, release, summarize. Every file successfully acquired is
    /// released exactly once before this returns, including when processing
    /// halts or the run is cancelled mid-batch.
    ///
    /// # Errors
    /// Fails fast with [`Error::NoFilesAvailable`] when classification or
    /// locking leaves nothing to process (no batch is created), with
    /// [`Error::HostBusy`] when another run holds the host, and propagates
    /// [`Error::RestartFailure`] after a failed checkpoint restart.
    pub async fn run_batch_job(
        &self,
        request: BatchRunRequest,
        executor: Arc<dyn JobExecutor>,
    ) -> Result<RunSummary> {
        let mut state = RunState::NotStarted;
        Self::advance(&mut state, RunState::Classifying, &request.name);

        let classified = self.coordinator.classify(&request.files).await;
        let mut available = Vec::new();
        let mut skipped_files = Vec::new();
        for file in &request.files {
            match classified.get(file).and_then(SkipReason::from_availability) {
                None => available.push(file.clone()),
                Some(reason) => skipped_files.push(SkippedFile {
                    file: file.clone(),
                    reason,
                }),
            }
        }

        if available.is_empty() {
            return Err(Error::NoFilesAvailable(Self::describe_skips(
                request.files.len(),
                &skipped_files,
            )));
        }

        let impact = self.coordinator.impact(&available).await;
        if impact.total > 0 {
            info!(
                target: "vaultbatch.orchestrator",
                targets = impact.targets.len(),
                referencing = impact.total,
                "impact analysis found referencing documents"
            );
        }

        Self::advance(&mut state, RunState::Locking, &request.name);
        let lease = Arc::new(self.host.try_lease()?);

        let acquired = self.coordinator.acquire(&available).await;
        let mut locked = Vec::new();
        for file in &available {
            if acquired.get(file).copied().unwrap_or(false) {
                locked.push(file.clone());
            } else {
                skipped_files.push(SkippedFile {
                    file: file.clone(),
                    reason: SkipReason::LockAcquireFailed,
                });
            }
        }

        if locked.is_empty() {
            return Err(Error::NoFilesAvailable(Self::describe_skips(
                request.files.len(),
                &skipped_files,
            )));
        }

        Self::advance(&mut state, RunState::Processing, &request.name);
        let batch = match self
            .queue
            .create_batch(
                &request.name,
                locked.clone(),
                &request.operation,
                &request.parameters,
                request.checkpoint_size,
            )
            .await
        {
            Ok(batch) => batch,
            Err(error) => {
                // The batch was never durably recorded; release what we
                // locked and abort.
                let _ = self
                    .coordinator
                    .release(&locked, &request.release_comment)
                    .await;
                return Err(error);
            }
        };

        let wrapped = PressureAwareExecutor {
            inner: executor,
            lease: Arc::clone(&lease),
            profiles: self.profiles.clone(),
            pending_tier: Arc::clone(&self.pending_tier),
            restart_pressure: Arc::clone(&self.restart_pressure),
        };
        let hook = HostRestartHook {
            lease: Arc::clone(&lease),
        };
        let process_result = self
            .queue
            .process_batch(
                batch.id,
                &wrapped,
                |current, total| {
                    debug!(
                        target: "vaultbatch.orchestrator",
                        current,
                        total,
                        "job boundary"
                    );
                },
                &hook,
            )
            .await;

        Self::advance(&mut state, RunState::Releasing, &request.name);
        let released_map = self
            .coordinator
            .release(&locked, &request.release_comment)
            .await;
        let released = released_map.values().filter(|unlocked| **unlocked).count();

        Self::advance(&mut state, RunState::Done, &request.name);
        match process_result {
            Ok(outcome) => {
                let summary = RunSummary {
                    batch_id: batch.id,
                    name: request.name,
                    completed: outcome.completed,
                    failed: outcome.failed,
                    skipped_jobs: outcome.skipped,
                    skipped_files,
                    impact,
                    locked: locked.len(),
                    released,
                };
                info!(
                    target: "vaultbatch.orchestrator",
                    batch_id = %summary.batch_id,
                    completed = summary.completed,
                    failed = summary.failed,
                    skipped_jobs = summary.skipped_jobs,
                    skipped_files = summary.skipped_files.len(),
                    released,
                    "batch run finished"
                );
                self.events.send(CoordinatorEvent::RunCompleted {
                    summary: Box::new(summary.clone()),
                });
                Ok(summary)
            }
            Err(error) => {
                warn!(
                    target: "vaultbatch.orchestrator",
                    batch_id = %batch.id,
                    %error,
                    "batch run halted; locks released, batch kept for resume"
                );
                Err(error)
            }
        }
    }

    fn advance(state: &mut RunState, next: RunState, run: &str) {
        debug!(
            target: "vaultbatch.orchestrator",
            run,
            from = %state,
            to = %next,
            "run state transition"
        );
        *state = next;
    }

    fn describe_skips(total: usize, skipped: &[SkippedFile]) -> String {
        let mut locked_by_other = 0_usize;
        let mut read_only = 0_usize;
        let mut not_found = 0_usize;
        let mut acquire_failed = 0_usize;
        for skip in skipped {
            match skip.reason {
                SkipReason::LockedByOther { .. } => locked_by_other += 1,
                SkipReason::ReleasedReadOnly => read_only += 1,
                SkipReason::NotFound => not_found += 1,
                SkipReason::LockAcquireFailed => acquire_failed += 1,
            }
        }
        format!(
            "0 of {total} files can be processed \
             ({locked_by_other} locked by others, {read_only} read-only, \
             {not_found} not found, {acquire_failed} lock failures)"
        )
    }
}
