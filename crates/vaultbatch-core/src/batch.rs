//! Batch model: an ordered, persisted collection of jobs processed as one
//! resumable unit.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::job::{Job, JobStatus};

/// Unique identifier for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(Uuid);

impl Default for BatchId {
    fn default() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(formatter)
    }
}

/// Lifecycle status of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Created and persisted, processing not started.
    Pending,
    /// Processing started; resumable after a crash.
    InProgress,
    /// Every job reached a terminal state.
    Completed,
    /// Processing halted (e.g. a checkpoint restart failed). The cursor is
    /// persisted so the batch can resume later.
    Failed,
    /// Cancelled by the caller; observed at the next job boundary.
    Cancelled,
}

impl BatchStatus {
    /// Whether this status ends processing for the batch.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        formatter.write_str(label)
    }
}

/// Terminal-state counts across a batch's jobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchCounts {
    /// Jobs whose executor reported success.
    pub completed: usize,
    /// Jobs whose executor reported an error.
    pub failed: usize,
    /// Jobs that were never attempted.
    pub skipped: usize,
    /// Jobs not yet in a terminal state.
    pub pending: usize,
}

/// Progress snapshot for a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchProgress {
    /// Total number of jobs.
    pub total: usize,
    /// Completed jobs.
    pub completed: usize,
    /// Failed jobs.
    pub failed: usize,
    /// Jobs still pending or in progress.
    pub pending: usize,
    /// Terminal jobs as a percentage of the total.
    pub percent: f64,
    /// Current batch status.
    pub status: BatchStatus,
}

/// An ordered, named collection of jobs plus run metadata.
///
/// The cursor (index of the last confirmed-processed job plus one) is private
/// and only moves forward: [`Batch::advance_cursor`] saturates against the
/// current value, so no code path can rewind a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    /// Unique identifier, also the persistence key.
    pub id: BatchId,
    /// Human-readable batch name.
    pub name: String,
    /// Jobs in their original file order.
    pub jobs: Vec<Job>,
    /// Completed jobs per host-restart cycle.
    pub checkpoint_size: usize,
    cursor: usize,
    /// Current lifecycle status.
    pub status: BatchStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Batch {
    /// Creates a pending batch with one job per file, in the given order.
    pub fn new(
        name: String,
        files: Vec<PathBuf>,
        operation: &str,
        parameters: &BTreeMap<String, Value>,
        checkpoint_size: usize,
    ) -> Self {
        let jobs = files
            .into_iter()
            .map(|file| Job::new(file, operation.to_owned(), parameters.clone()))
            .collect();

        Self {
            id: BatchId::default(),
            name,
            jobs,
            checkpoint_size,
            cursor: 0,
            status: BatchStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Index of the next job to process.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Moves the cursor forward to `to`. Requests to move backwards are
    /// ignored, keeping the cursor monotonically non-decreasing for the
    /// batch's lifetime.
    pub fn advance_cursor(&mut self, to: usize) {
        self.cursor = self.cursor.max(to);
    }

    /// Counts jobs by terminal state.
    pub fn counts(&self) -> BatchCounts {
        let mut counts = BatchCounts::default();
        for job in &self.jobs {
            match job.status {
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
                JobStatus::Skipped => counts.skipped += 1,
                JobStatus::Pending | JobStatus::InProgress => counts.pending += 1,
            }
        }
        counts
    }

    /// Builds a progress snapshot from the current job states.
    pub fn progress(&self) -> BatchProgress {
        let counts = self.counts();
        let total = self.jobs.len();
        let terminal = counts.completed + counts.failed + counts.skipped;
        let percent = if total == 0 {
            100.0
        } else {
            (terminal as f64 / total as f64) * 100.0
        };

        BatchProgress {
            total,
            completed: counts.completed,
            failed: counts.failed,
            pending: counts.pending,
            percent,
            status: self.status,
        }
    }
}
