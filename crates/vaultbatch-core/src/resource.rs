//! Resource-pressure model: samples, degradation tiers, and thresholds.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Point-in-time resource reading. Immutable once created; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    /// System memory in use, 0–100.
    pub memory_percent: f64,
    /// Available system memory in bytes.
    pub memory_available: u64,
    /// Global CPU utilization, 0–100.
    pub cpu_percent: f64,
    /// GPU utilization, when a probe is attached.
    pub gpu_percent: Option<f64>,
    /// GPU memory utilization, when a probe is attached.
    pub gpu_memory_percent: Option<f64>,
    /// When the sample was taken.
    pub timestamp: DateTime<Utc>,
}

impl ResourceSample {
    /// Highest GPU metric present in this sample, if any.
    pub fn gpu_pressure(&self) -> Option<f64> {
        match (self.gpu_percent, self.gpu_memory_percent) {
            (Some(gpu), Some(gpu_memory)) => Some(gpu.max(gpu_memory)),
            (Some(gpu), None) => Some(gpu),
            (None, Some(gpu_memory)) => Some(gpu_memory),
            (None, None) => None,
        }
    }
}

/// Degradation tier for the editing host's resource-hungry settings.
///
/// Ordered from least to most aggressive degradation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// All host settings at full quality.
    Full,
    /// Non-essential visual settings reduced.
    Reduced,
    /// Only settings required for correct edits retained.
    Minimal,
    /// Everything optional disabled; the host is barely alive.
    Survival,
}

impl Tier {
    /// Numeric severity for ordering comparisons.
    pub const fn severity(self) -> u8 {
        match self {
            Self::Full => 0,
            Self::Reduced => 1,
            Self::Minimal => 2,
            Self::Survival => 3,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Full => "full",
            Self::Reduced => "reduced",
            Self::Minimal => "minimal",
            Self::Survival => "survival",
        };
        formatter.write_str(label)
    }
}

/// Opaque settings bag applied to the host for one tier.
pub type TierProfile = BTreeMap<String, Value>;

/// Host settings bags per tier, consumed by the host-settings collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierProfiles {
    /// Settings for [`Tier::Full`].
    #[serde(default)]
    pub full: TierProfile,
    /// Settings for [`Tier::Reduced`].
    #[serde(default)]
    pub reduced: TierProfile,
    /// Settings for [`Tier::Minimal`].
    #[serde(default)]
    pub minimal: TierProfile,
    /// Settings for [`Tier::Survival`].
    #[serde(default)]
    pub survival: TierProfile,
}

impl TierProfiles {
    /// Settings bag for the given tier.
    pub fn get(&self, tier: Tier) -> &TierProfile {
        match tier {
            Tier::Full => &self.full,
            Tier::Reduced => &self.reduced,
            Tier::Minimal => &self.minimal,
            Tier::Survival => &self.survival,
        }
    }
}

/// Tier entry thresholds (percentages) plus the restart percentage.
///
/// Immutable for the life of a monitor; reconfiguring means constructing a
/// new monitor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Memory percentage at which [`Tier::Reduced`] begins.
    pub memory_reduced: f64,
    /// Memory percentage at which [`Tier::Minimal`] begins.
    pub memory_minimal: f64,
    /// Memory percentage at which [`Tier::Survival`] begins.
    pub memory_survival: f64,
    /// GPU percentage at which [`Tier::Reduced`] begins.
    pub gpu_reduced: f64,
    /// GPU percentage at which [`Tier::Minimal`] begins.
    pub gpu_minimal: f64,
    /// Memory percentage above which a host restart is signalled.
    pub restart_memory: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            memory_reduced: 60.0,
            memory_minimal: 75.0,
            memory_survival: 85.0,
            gpu_reduced: 70.0,
            gpu_minimal: 85.0,
            restart_memory: 90.0,
        }
    }
}

impl Thresholds {
    /// Validates ordering invariants between the entry percentages.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] when memory tiers are not strictly
    /// increasing, the restart percentage sits below the survival entry, or
    /// the GPU tiers are not strictly increasing.
    pub fn validate(&self) -> Result<()> {
        if !(self.memory_reduced < self.memory_minimal
            && self.memory_minimal < self.memory_survival)
        {
            return Err(Error::InvalidConfig(format!(
                "memory thresholds must be strictly increasing: {} < {} < {}",
                self.memory_reduced, self.memory_minimal, self.memory_survival
            )));
        }
        if self.restart_memory < self.memory_survival {
            return Err(Error::InvalidConfig(format!(
                "restart threshold {} is below the survival entry {}",
                self.restart_memory, self.memory_survival
            )));
        }
        if self.gpu_reduced >= self.gpu_minimal {
            return Err(Error::InvalidConfig(format!(
                "gpu thresholds must be strictly increasing: {} < {}",
                self.gpu_reduced, self.gpu_minimal
            )));
        }
        Ok(())
    }
}
