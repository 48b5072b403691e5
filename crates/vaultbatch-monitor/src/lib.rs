//! Resource-pressure monitoring for the editing host.
//!
//! Samples system pressure on an interval, maps samples to a degradation
//! [`vaultbatch_core::Tier`] via pure evaluation, and raises tier-change and
//! restart-needed events over the shared event channel.

/// Background monitor loop.
pub mod monitor;
/// Production and scripted samplers.
pub mod sampler;
/// Pure tier evaluation.
pub mod tier;

pub use monitor::{MonitorHandle, ResourceMonitor, TierTransition};
pub use sampler::{GpuProbe, ResourceSampler, ScriptedSampler, SystemSampler};
pub use tier::{evaluate_tier, should_restart};
