//! Immutable configuration values, constructed up front and passed by value.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::resource::{Thresholds, TierProfiles};

const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 5_000;
const DEFAULT_PERSIST_EVERY: usize = 5;

fn default_sample_interval_ms() -> u64 {
    DEFAULT_SAMPLE_INTERVAL_MS
}

fn default_persist_every() -> usize {
    DEFAULT_PERSIST_EVERY
}

/// Configuration for a resource monitor instance.
///
/// Immutable once constructed; independently-configured monitors can coexist
/// (there are no process-wide settings).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Sampling interval in milliseconds.
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
    /// Tier entry thresholds and the restart percentage.
    #[serde(default)]
    pub thresholds: Thresholds,
    /// Host settings bags per tier.
    #[serde(default)]
    pub profiles: TierProfiles,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            thresholds: Thresholds::default(),
            profiles: TierProfiles::default(),
        }
    }
}

impl MonitorConfig {
    /// Parses a config from TOML and validates it.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.thresholds.validate()?;
        Ok(config)
    }

    /// Sampling interval as a [`Duration`].
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

/// Configuration for the job queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Directory holding one JSON file per batch.
    pub storage_dir: PathBuf,
    /// Persist terminal job states every this many jobs. Bounds crash data
    /// loss without paying a disk write per job; interrupted cursor movement
    /// is re-executed safely under at-least-once delivery.
    #[serde(default = "default_persist_every")]
    pub persist_every: usize,
}

impl QueueConfig {
    /// Queue config with default persistence cadence.
    pub fn new(storage_dir: PathBuf) -> Self {
        Self {
            storage_dir,
            persist_every: DEFAULT_PERSIST_EVERY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MonitorConfig::default();
        assert_eq!(config.sample_interval(), Duration::from_secs(5));
        assert!(config.thresholds.validate().is_ok());
    }

    #[test]
    fn test_from_toml_with_overrides() {
        let raw = r#"
            sample_interval_ms = 1000

            [thresholds]
            memory_reduced = 50.0
            memory_minimal = 65.0
            memory_survival = 80.0
            gpu_reduced = 60.0
            gpu_minimal = 75.0
            restart_memory = 88.0

            [profiles.survival]
            graphics_quality = "wireframe"
        "#;

        let config = MonitorConfig::from_toml_str(raw).expect("parse config");
        assert_eq!(config.sample_interval(), Duration::from_secs(1));
        assert!((config.thresholds.memory_survival - 80.0).abs() < f64::EPSILON);
        assert_eq!(
            config
                .profiles
                .survival
                .get("graphics_quality")
                .and_then(|value| value.as_str()),
            Some("wireframe")
        );
    }

    #[test]
    fn test_from_toml_rejects_invalid_thresholds() {
        let raw = r#"
            [thresholds]
            memory_reduced = 80.0
            memory_minimal = 70.0
            memory_survival = 85.0
            gpu_reduced = 60.0
            gpu_minimal = 75.0
            restart_memory = 90.0
        "#;
        assert!(MonitorConfig::from_toml_str(raw).is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = MonitorConfig::from_toml_str("sample_interval_ms = 250").expect("parse");
        assert_eq!(config.thresholds, Thresholds::default());
        assert_eq!(config.sample_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_queue_config_defaults() {
        let config = QueueConfig::new(PathBuf::from("/tmp/batches"));
        assert_eq!(config.persist_every, 5);
    }
}
