//! Persistent, resumable job queue with checkpointing.
//!
//! [`JobQueue`] owns the persisted set of batches, processes jobs strictly
//! one at a time through a caller-supplied executor, and fires a checkpoint
//! hook every N completed jobs so the orchestrator can restart the editing
//! host. [`JsonBatchStore`] is the directory-of-JSON production store.

/// Sequential batch processor.
pub mod queue;
/// JSON-file batch persistence.
pub mod store;

pub use queue::{BatchOutcome, JobQueue};
pub use store::JsonBatchStore;
