//! Core types and traits for the vaultbatch coordination layer.
//!
//! This crate provides the data model, error taxonomy, event channel, and
//! collaborator seams shared by the lock coordinator, resource monitor, job
//! queue, and orchestrator. It performs no I/O of its own.

/// Batch model and progress types.
pub mod batch;
/// Immutable configuration values.
pub mod config;
/// Error types and result definitions.
pub mod error;
/// Coordination events and the event channel.
pub mod events;
/// Per-file job representation.
pub mod job;
/// Resource samples, degradation tiers, and thresholds.
pub mod resource;
/// Run summary types.
pub mod summary;
/// Collaborator trait definitions.
pub mod traits;
/// Vault-facing data types.
pub mod vault;

pub use batch::{Batch, BatchCounts, BatchId, BatchProgress, BatchStatus};
pub use config::{MonitorConfig, QueueConfig};
pub use error::{Error, Result};
pub use events::{CoordinatorEvent, EventChannel};
pub use job::{Job, JobId, JobStatus};
pub use resource::{ResourceSample, Thresholds, Tier, TierProfile, TierProfiles};
pub use summary::{RunSummary, SkipReason, SkippedFile};
pub use traits::{BatchStore, CheckpointHook, HostController, JobExecutor, VaultClient};
pub use vault::{Availability, FileStatus, ImpactReport, LifecycleState};
