//! Per-file job representation.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Unique identifier for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl Default for JobId {
    fn default() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(formatter)
    }
}

/// Lifecycle status of a single job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job has not been attempted yet.
    Pending,
    /// Job is currently executing. A job found in this state on resume was
    /// interrupted by a crash and is reattempted.
    InProgress,
    /// Executor reported success.
    Completed,
    /// Executor reported an error; recorded in the job's `error` field.
    Failed,
    /// Job was never attempted (e.g. its file could not be locked).
    Skipped,
}

impl JobStatus {
    /// Whether this status is final for the job.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        formatter.write_str(label)
    }
}

/// One file-level operation inside a batch.
///
/// Owned exclusively by its parent [`crate::Batch`]; mutated only by the job
/// queue during processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier for this job.
    pub id: JobId,
    /// File the operation applies to.
    pub file: PathBuf,
    /// Operation kind, opaque to the queue (interpreted by the executor).
    pub operation: String,
    /// Operation parameters, opaque to the queue.
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Error recorded by the most recent failed attempt.
    pub error: Option<String>,
    /// Number of executor invocations. Greater than one means the job was
    /// reattempted after an interruption (at-least-once delivery).
    #[serde(default)]
    pub attempts: u32,
    /// When the most recent attempt started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Creates a pending job for `file`.
    pub fn new(file: PathBuf, operation: String, parameters: BTreeMap<String, Value>) -> Self {
        Self {
            id: JobId::default(),
            file,
            operation,
            parameters,
            status: JobStatus::Pending,
            error: None,
            attempts: 0,
            started_at: None,
            completed_at: None,
        }
    }

    /// Marks the start of an executor attempt.
    pub fn begin_attempt(&mut self) {
        self.status = JobStatus::InProgress;
        self.attempts += 1;
        self.started_at = Some(Utc::now());
    }

    /// Marks the job completed.
    pub fn finish(&mut self) {
        self.status = JobStatus::Completed;
        self.error = None;
        self.completed_at = Some(Utc::now());
    }

    /// Marks the job failed with the executor's error.
    pub fn fail(&mut self, error: String) {
        self.status = JobStatus::Failed;
        self.error = Some(error);
        self.completed_at = Some(Utc::now());
    }
}
