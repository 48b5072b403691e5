//! Lock coordination against the external versioned-file vault.
//!
//! [`LockCoordinator`] classifies file availability, runs transitive impact
//! analysis, and performs best-effort batch lock acquire/release. The
//! concrete vault lives behind [`vaultbatch_core::VaultClient`];
//! [`InMemoryVault`] is the deterministic fake used in tests.

/// Batch-level lock coordination.
pub mod coordinator;
/// In-memory vault fake.
pub mod memory;

pub use coordinator::LockCoordinator;
pub use memory::{InMemoryVault, VaultRecord};
