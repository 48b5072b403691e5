//! Shared fixtures for the cross-crate scenario tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use tempfile::TempDir;
use vaultbatch_core::{
    Error, EventChannel, HostController, Job, JobExecutor, Result, Tier, TierProfile,
};
use vaultbatch_orchestrator::{BatchOrchestrator, Host};
use vaultbatch_queue::{JobQueue, JsonBatchStore};
use vaultbatch_vault::{InMemoryVault, LockCoordinator, VaultRecord};

/// Acting user for every test vault.
pub const ACTOR: &str = "batch-service";

/// Job executor that records calls and fails on demand.
pub struct RecordingExecutor {
    calls: StdMutex<Vec<PathBuf>>,
    fail_files: Vec<PathBuf>,
}

impl Default for RecordingExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingExecutor {
    /// An executor that succeeds on every job.
    pub fn new() -> Self {
        Self {
            calls: StdMutex::new(Vec::new()),
            fail_files: Vec::new(),
        }
    }

    /// An executor failing on exactly the given files.
    pub fn failing_on(fail_files: Vec<PathBuf>) -> Self {
        Self {
            calls: StdMutex::new(Vec::new()),
            fail_files,
        }
    }

    /// The files executed so far, in call order.
    ///
    /// # Panics
    /// Panics when the recording mutex is poisoned.
    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl JobExecutor for RecordingExecutor {
    async fn execute(&self, job: &Job) -> Result<()> {
        self.calls.lock().expect("calls lock").push(job.file.clone());
        if self.fail_files.contains(&job.file) {
            return Err(Error::Execution(format!(
                "edit failed for {}",
                job.file.display()
            )));
        }
        Ok(())
    }
}

/// Host controller that records profile applications and restarts.
pub struct RecordingHost {
    applied: StdMutex<Vec<Tier>>,
    restarts: AtomicUsize,
    fail_restart: bool,
}

impl Default for RecordingHost {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingHost {
    /// A host whose restarts succeed.
    pub fn new() -> Self {
        Self {
            applied: StdMutex::new(Vec::new()),
            restarts: AtomicUsize::new(0),
            fail_restart: false,
        }
    }

    /// A host whose restarts always fail.
    pub fn failing_restart() -> Self {
        Self {
            fail_restart: true,
            ..Self::new()
        }
    }

    /// Tiers applied so far, in order.
    ///
    /// # Panics
    /// Panics when the recording mutex is poisoned.
    pub fn applied(&self) -> Vec<Tier> {
        self.applied.lock().expect("applied lock").clone()
    }

    /// Number of restarts performed so far.
    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostController for RecordingHost {
    async fn apply_tier_profile(&self, tier: Tier, _profile: &TierProfile) -> Result<()> {
        self.applied.lock().expect("applied lock").push(tier);
        Ok(())
    }

    async fn restart(&self) -> Result<()> {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        if self.fail_restart {
            return Err(Error::RestartFailure(
                "host process did not reconnect".to_owned(),
            ));
        }
        Ok(())
    }
}

/// A fully wired coordination stack over in-memory collaborators and a
/// tempdir-backed batch store.
pub struct Stack {
    /// The seedable vault fake.
    pub vault: InMemoryVault,
    /// The recording host controller behind the lease.
    pub controller: Arc<RecordingHost>,
    /// The queue, shared with the orchestrator.
    pub queue: Arc<JobQueue>,
    /// The orchestrator under test.
    pub orchestrator: BatchOrchestrator,
    /// Event sender feeding queue and orchestrator (exposed for clones).
    pub events: EventChannel,
    /// Keeps the store directory alive.
    pub temp: TempDir,
}

/// Builds a stack with a default (succeeding) host controller.
///
/// # Panics
/// Panics when the temp directory or store cannot be created.
pub fn stack() -> Stack {
    stack_with_host(RecordingHost::new())
}

/// Builds a stack around the given host controller.
///
/// # Panics
/// Panics when the temp directory or store cannot be created.
pub fn stack_with_host(controller: RecordingHost) -> Stack {
    let temp = TempDir::new().expect("create temp dir");
    let store = JsonBatchStore::new(temp.path().to_path_buf()).expect("create store");
    let (events, _receiver) = EventChannel::new();

    let vault = InMemoryVault::new(ACTOR);
    let coordinator = LockCoordinator::new(Arc::new(vault.clone()), ACTOR);
    let queue = Arc::new(JobQueue::new(Arc::new(store), events.clone()).expect("create queue"));
    let controller = Arc::new(controller);
    let host = Host::new(Arc::clone(&controller) as Arc<dyn HostController>);
    let orchestrator = BatchOrchestrator::new(
        coordinator,
        Arc::clone(&queue),
        host,
        events.clone(),
    );

    Stack {
        vault,
        controller,
        queue,
        orchestrator,
        events,
        temp,
    }
}

/// `count` file paths named `part-0.sldprt` through `part-{count-1}.sldprt`.
pub fn files(count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|index| PathBuf::from(format!("part-{index}.sldprt")))
        .collect()
}

/// Seeds `count` unlocked, editable documents into the vault.
pub async fn seed_in_work(vault: &InMemoryVault, count: usize) {
    for file in files(count) {
        vault.insert(file, VaultRecord::in_work()).await;
    }
}
