//! Explicit lease over the single-instance editing host.
//!
//! The host is a serialized resource: only one batch may drive it at a
//! time. Rather than a hidden singleton, exclusive use is a value, a
//! [`HostLease`], handed to the run, so tests can substitute a fake host
//! with no shared state.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::info;
use vaultbatch_core::{Error, HostController, Result, Tier, TierProfile};

/// The single-instance editing host, leasable for exclusive use.
#[derive(Clone)]
pub struct Host {
    controller: Arc<dyn HostController>,
    slot: Arc<Mutex<()>>,
}

impl Host {
    /// Wraps a host controller in a leasable handle.
    pub fn new(controller: Arc<dyn HostController>) -> Self {
        Self {
            controller,
            slot: Arc::new(Mutex::new(())),
        }
    }

    /// Waits for exclusive use of the host.
    pub async fn lease(&self) -> HostLease {
        let guard = Arc::clone(&self.slot).lock_owned().await;
        HostLease {
            controller: Arc::clone(&self.controller),
            _guard: guard,
        }
    }

    /// Takes the lease if the host is free.
    ///
    /// # Errors
    /// Returns [`Error::HostBusy`] when another run holds the lease.
    pub fn try_lease(&self) -> Result<HostLease> {
        let guard = Arc::clone(&self.slot)
            .try_lock_owned()
            .map_err(|_| Error::HostBusy)?;
        Ok(HostLease {
            controller: Arc::clone(&self.controller),
            _guard: guard,
        })
    }
}

/// Exclusive use of the editing host for the duration of one run.
///
/// Dropping the lease frees the host for the next run.
pub struct HostLease {
    controller: Arc<dyn HostController>,
    _guard: OwnedMutexGuard<()>,
}

impl HostLease {
    /// Applies a degradation profile to the host's settings.
    pub async fn apply_tier_profile(&self, tier: Tier, profile: &TierProfile) -> Result<()> {
        info!(
            target: "vaultbatch.orchestrator",
            tier = %tier,
            settings = profile.len(),
            "applying tier profile to host"
        );
        self.controller.apply_tier_profile(tier, profile).await
    }

    /// Restarts the host application, blocking until it is usable again.
    pub async fn restart(&self) -> Result<()> {
        info!(target: "vaultbatch.orchestrator", "restarting editing host");
        self.controller.restart().await
    }
}
