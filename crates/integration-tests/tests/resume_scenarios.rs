//! Crash-and-resume scenarios driven through the persisted batch store.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use integration_tests::{RecordingExecutor, files};
use tempfile::TempDir;
use vaultbatch_core::{
    Batch, BatchStatus, BatchStore, CheckpointHook, Error, EventChannel, Result,
};
use vaultbatch_queue::{JobQueue, JsonBatchStore};

struct NoopHook;

#[async_trait::async_trait]
impl CheckpointHook for NoopHook {
    async fn on_checkpoint(&self, _batch: &Batch) -> Result<()> {
        Ok(())
    }
}

struct FailingHook;

#[async_trait::async_trait]
impl CheckpointHook for FailingHook {
    async fn on_checkpoint(&self, _batch: &Batch) -> Result<()> {
        Err(Error::RestartFailure("host did not come back".to_owned()))
    }
}

/// Writes a batch to `dir` as a crash would have left it: jobs before
/// `in_progress_index` completed, that job caught mid-attempt, cursor
/// confirmed through the completed prefix.
fn persist_interrupted_batch(dir: &TempDir, total: usize, in_progress_index: usize) -> Batch {
    let store = JsonBatchStore::new(dir.path().to_path_buf()).expect("create store");
    let mut batch = Batch::new(
        "interrupted".to_owned(),
        files(total),
        "update_title",
        &BTreeMap::new(),
        50,
    );
    for index in 0..in_progress_index {
        batch.jobs[index].begin_attempt();
        batch.jobs[index].finish();
    }
    batch.jobs[in_progress_index].begin_attempt();
    batch.advance_cursor(in_progress_index);
    batch.status = BatchStatus::InProgress;
    store.save(&batch).expect("save interrupted batch");
    batch
}

fn reopen_queue(dir: &TempDir) -> Arc<JobQueue> {
    let store = JsonBatchStore::new(dir.path().to_path_buf()).expect("reopen store");
    Arc::new(JobQueue::new(Arc::new(store), EventChannel::default()).expect("create queue"))
}

#[tokio::test]
async fn interrupted_job_is_reattempted_and_settled_jobs_are_not() {
    let temp = TempDir::new().expect("create temp dir");
    let batch = persist_interrupted_batch(&temp, 10, 3);

    let queue = reopen_queue(&temp);
    let resumable = queue.resumable_batches().await;
    assert_eq!(resumable.len(), 1);
    assert_eq!(resumable[0].id, batch.id);

    let executor = RecordingExecutor::new();
    let outcome = queue
        .process_batch(batch.id, &executor, |_, _| {}, &NoopHook)
        .await
        .expect("resume batch");

    // Jobs 0-2 are skipped as already completed; job 3 is reattempted.
    let expected: Vec<PathBuf> = files(10)[3..].to_vec();
    assert_eq!(executor.calls(), expected);
    assert_eq!(outcome.completed, 10);

    // The reattempt is visible in the job's attempt counter.
    let progress = queue.get_progress(batch.id).await.expect("progress");
    assert_eq!(progress.status, BatchStatus::Completed);
    let store = JsonBatchStore::new(temp.path().to_path_buf()).expect("reopen store");
    assert!(store.load_open().expect("load").is_empty());
}

#[tokio::test]
async fn cursor_never_regresses_across_repeated_crashes() {
    let temp = TempDir::new().expect("create temp dir");
    let store = JsonBatchStore::new(temp.path().to_path_buf()).expect("create store");
    let queue = Arc::new(
        JobQueue::new(Arc::new(store), EventChannel::default()).expect("create queue"),
    );
    let batch = queue
        .create_batch("crashy", files(9), "update_title", &BTreeMap::new(), 3)
        .await
        .expect("create batch");

    let mut cursors = vec![0_usize];

    // First run dies at the first checkpoint (after 3 completions).
    let executor = RecordingExecutor::new();
    let error = queue
        .process_batch(batch.id, &executor, |_, _| {}, &FailingHook)
        .await
        .expect_err("first checkpoint fails");
    assert!(matches!(error, Error::RestartFailure(_)));

    let reopened = reopen_queue(&temp);
    let open = {
        let store = JsonBatchStore::new(temp.path().to_path_buf()).expect("reopen");
        store.load_open().expect("load")
    };
    cursors.push(open[0].cursor());

    // Second run dies at its first checkpoint too (3 more completions).
    let executor = RecordingExecutor::new();
    let error = reopened
        .process_batch(batch.id, &executor, |_, _| {}, &FailingHook)
        .await
        .expect_err("second checkpoint fails");
    assert!(matches!(error, Error::RestartFailure(_)));

    let reopened = reopen_queue(&temp);
    let open = {
        let store = JsonBatchStore::new(temp.path().to_path_buf()).expect("reopen");
        store.load_open().expect("load")
    };
    cursors.push(open[0].cursor());

    // Third run finishes.
    let executor = RecordingExecutor::new();
    let outcome = reopened
        .process_batch(batch.id, &executor, |_, _| {}, &NoopHook)
        .await
        .expect("final run");
    assert_eq!(outcome.completed, 9);
    cursors.push(9);

    // Non-decreasing across every crash and resume.
    assert_eq!(cursors, vec![0, 3, 6, 9]);
}

#[tokio::test]
async fn reprocessing_a_completed_batch_is_a_noop_with_identical_counts() {
    let temp = TempDir::new().expect("create temp dir");
    let store = JsonBatchStore::new(temp.path().to_path_buf()).expect("create store");
    let queue = Arc::new(
        JobQueue::new(Arc::new(store), EventChannel::default()).expect("create queue"),
    );
    let batch = queue
        .create_batch("once", files(4), "update_title", &BTreeMap::new(), 10)
        .await
        .expect("create batch");

    let executor = RecordingExecutor::new();
    let first = queue
        .process_batch(batch.id, &executor, |_, _| {}, &NoopHook)
        .await
        .expect("first run");

    // A fresh process on the reloaded store still refuses to re-execute.
    let reopened = reopen_queue(&temp);
    let second_executor = RecordingExecutor::new();
    let error = reopened
        .process_batch(batch.id, &second_executor, |_, _| {}, &NoopHook)
        .await;

    // The completed batch was filtered out of load_open entirely.
    assert!(matches!(error, Err(Error::BatchNotFound(_))));
    assert!(second_executor.calls().is_empty());

    // Reprocessing through the original queue is the idempotent no-op.
    let second = queue
        .process_batch(batch.id, &executor, |_, _| {}, &NoopHook)
        .await
        .expect("second run");
    assert_eq!(executor.calls().len(), 4);
    assert_eq!(first, second);
}
