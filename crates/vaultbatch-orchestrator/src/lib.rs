//! Batch-run orchestration.
//!
//! [`BatchOrchestrator`] sequences one run end to end: classify file
//! availability, analyze impact, acquire locks, process the batch with
//! checkpoint host restarts, release every acquired lock, and summarize.
//! Exclusive use of the single-instance editing host is an explicit
//! [`HostLease`] value, never a hidden global.

/// Host lease.
pub mod host;
/// Run sequencing.
pub mod orchestrator;

pub use host::{Host, HostLease};
pub use orchestrator::{BatchOrchestrator, BatchRunRequest};
