//! End-to-end batch-run scenarios across the vault, queue, host, and
//! orchestrator.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use integration_tests::{RecordingExecutor, RecordingHost, files, seed_in_work, stack, stack_with_host};
use vaultbatch_core::{
    Error, Job, JobExecutor, LifecycleState, Result, SkipReason,
};
use vaultbatch_orchestrator::BatchRunRequest;
use vaultbatch_queue::JobQueue;
use vaultbatch_vault::VaultRecord;

fn path(name: &str) -> PathBuf {
    PathBuf::from(name)
}

fn request(count: usize) -> BatchRunRequest {
    BatchRunRequest::new("retitle drawings", files(count), "update_title")
}

#[tokio::test]
async fn five_files_with_one_held_elsewhere() {
    let stack = stack();
    seed_in_work(&stack.vault, 5).await;
    stack
        .vault
        .insert(path("part-1.sldprt"), VaultRecord::in_work().held_by("jdoe"))
        .await;

    let executor = Arc::new(RecordingExecutor::new());
    let summary = stack
        .orchestrator
        .run_batch_job(request(5), Arc::clone(&executor) as Arc<dyn JobExecutor>)
        .await
        .expect("run batch");

    // The other four files are processed; the held one is reported.
    assert_eq!(summary.completed, 4);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.skipped_files.len(), 1);
    assert_eq!(summary.skipped_files[0].file, path("part-1.sldprt"));
    assert_eq!(
        summary.skipped_files[0].reason,
        SkipReason::LockedByOther {
            holder: "jdoe".to_owned()
        }
    );
    assert!(!executor.calls().contains(&path("part-1.sldprt")));

    // jdoe's lock was never touched.
    assert_eq!(
        stack.vault.holder_of(&path("part-1.sldprt")).await.as_deref(),
        Some("jdoe")
    );
}

#[tokio::test]
async fn mixed_unavailability_is_fully_explained() {
    let stack = stack();
    stack
        .vault
        .insert(path("part-0.sldprt"), VaultRecord::in_work())
        .await;
    stack
        .vault
        .insert(path("part-1.sldprt"), VaultRecord::in_work().held_by("mlee"))
        .await;
    stack
        .vault
        .insert(
            path("part-2.sldprt"),
            VaultRecord::with_state(LifecycleState::Released),
        )
        .await;
    // part-3 is never inserted: not found.
    stack
        .vault
        .insert(path("part-4.sldprt"), VaultRecord::in_work())
        .await;
    stack.vault.fail_lock(path("part-4.sldprt")).await;

    let summary = stack
        .orchestrator
        .run_batch_job(request(5), Arc::new(RecordingExecutor::new()))
        .await
        .expect("run batch");

    assert_eq!(summary.completed, 1);
    assert_eq!(summary.skipped_files.len(), 4);

    let reason_for = |file: &PathBuf| {
        summary
            .skipped_files
            .iter()
            .find(|skip| &skip.file == file)
            .map(|skip| skip.reason.clone())
    };
    assert_eq!(
        reason_for(&path("part-1.sldprt")),
        Some(SkipReason::LockedByOther {
            holder: "mlee".to_owned()
        })
    );
    assert_eq!(
        reason_for(&path("part-2.sldprt")),
        Some(SkipReason::ReleasedReadOnly)
    );
    assert_eq!(reason_for(&path("part-3.sldprt")), Some(SkipReason::NotFound));
    assert_eq!(
        reason_for(&path("part-4.sldprt")),
        Some(SkipReason::LockAcquireFailed)
    );
}

struct CancelMidRun {
    queue: Arc<JobQueue>,
    executed: AtomicUsize,
    cancel_after: usize,
}

#[async_trait]
impl JobExecutor for CancelMidRun {
    async fn execute(&self, _job: &Job) -> Result<()> {
        let done = self.executed.fetch_add(1, Ordering::SeqCst) + 1;
        if done == self.cancel_after {
            for batch in self.queue.resumable_batches().await {
                self.queue.cancel_batch(batch.id).await?;
            }
        }
        Ok(())
    }
}

#[tokio::test]
async fn cancelled_run_still_releases_every_lock_exactly_once() {
    let stack = stack();
    seed_in_work(&stack.vault, 6).await;

    let executor = CancelMidRun {
        queue: Arc::clone(&stack.queue),
        executed: AtomicUsize::new(0),
        cancel_after: 2,
    };
    let summary = stack
        .orchestrator
        .run_batch_job(request(6), Arc::new(executor))
        .await
        .expect("cancelled run still summarizes");

    assert_eq!(summary.completed, 2);
    assert_eq!(summary.skipped_jobs, 4);

    // All six acquired locks were released, each exactly once.
    let log = stack.vault.unlock_log().await;
    assert_eq!(log.len(), 6);
    let mut unlocked: Vec<PathBuf> = log.into_iter().map(|(file, _)| file).collect();
    unlocked.sort();
    assert_eq!(unlocked, files(6));
    for file in files(6) {
        assert_eq!(stack.vault.holder_of(&file).await, None);
    }
}

#[tokio::test]
async fn failed_restart_releases_locks_and_keeps_batch() {
    let stack = stack_with_host(RecordingHost::failing_restart());
    seed_in_work(&stack.vault, 4).await;

    let error = stack
        .orchestrator
        .run_batch_job(
            request(4).with_checkpoint_size(2),
            Arc::new(RecordingExecutor::new()),
        )
        .await
        .expect_err("restart fails at first checkpoint");
    assert!(matches!(error, Error::RestartFailure(_)));

    // No orphaned locks.
    assert_eq!(stack.vault.unlock_log().await.len(), 4);
    for file in files(4) {
        assert_eq!(stack.vault.holder_of(&file).await, None);
    }
}

#[tokio::test]
async fn job_failures_do_not_abort_or_leak_locks() {
    let stack = stack();
    seed_in_work(&stack.vault, 5).await;

    let executor = RecordingExecutor::failing_on(vec![
        path("part-1.sldprt"),
        path("part-3.sldprt"),
    ]);
    let summary = stack
        .orchestrator
        .run_batch_job(request(5), Arc::new(executor))
        .await
        .expect("run batch");

    assert_eq!(summary.completed, 3);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.released, 5);
    assert_eq!(stack.vault.unlock_log().await.len(), 5);
}

#[tokio::test]
async fn completed_batch_can_be_deleted_after_the_run() {
    let stack = stack();
    seed_in_work(&stack.vault, 2).await;

    let summary = stack
        .orchestrator
        .run_batch_job(request(2), Arc::new(RecordingExecutor::new()))
        .await
        .expect("run batch");

    stack
        .queue
        .delete_batch(summary.batch_id)
        .await
        .expect("delete completed batch");
    assert!(matches!(
        stack.queue.get_progress(summary.batch_id).await,
        Err(Error::BatchNotFound(_))
    ));
}
