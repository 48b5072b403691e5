//! Resource samplers: the `sysinfo`-backed production sampler and a
//! scripted fake for deterministic tests.

use std::collections::VecDeque;
use std::fmt;

use chrono::Utc;
use sysinfo::System;
use vaultbatch_core::ResourceSample;

/// Synchronous source of resource-pressure readings.
pub trait ResourceSampler: Send {
    /// Reads the current resource pressure.
    fn sample(&mut self) -> ResourceSample;
}

/// Optional GPU metrics source: returns `(gpu_percent, gpu_memory_percent)`.
///
/// `sysinfo` exposes no GPU counters, so GPU readings come from an
/// embedder-supplied probe (e.g. a vendor management library binding).
pub type GpuProbe = Box<dyn FnMut() -> (Option<f64>, Option<f64>) + Send>;

/// OS-backed sampler over the `sysinfo` crate.
pub struct SystemSampler {
    system: System,
    gpu_probe: Option<GpuProbe>,
}

impl fmt::Debug for SystemSampler {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SystemSampler")
            .field("gpu_probe", &self.gpu_probe.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemSampler {
    /// Creates a sampler and performs the initial sysinfo refresh.
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_memory();
        system.refresh_cpu_all();
        Self {
            system,
            gpu_probe: None,
        }
    }

    /// Attaches a GPU metrics probe.
    #[must_use]
    pub fn with_gpu_probe(mut self, probe: GpuProbe) -> Self {
        self.gpu_probe = Some(probe);
        self
    }
}

impl ResourceSampler for SystemSampler {
    fn sample(&mut self) -> ResourceSample {
        self.system.refresh_memory();
        self.system.refresh_cpu_all();

        let total = self.system.total_memory();
        let available = self.system.available_memory();
        let memory_percent = if total == 0 {
            0.0
        } else {
            let used = total.saturating_sub(available);
            (used as f64 / total as f64) * 100.0
        };
        let cpu_percent = f64::from(self.system.global_cpu_usage());

        let (gpu_percent, gpu_memory_percent) = self
            .gpu_probe
            .as_mut()
            .map_or((None, None), |probe| probe());

        ResourceSample {
            memory_percent: clamp_sensor(memory_percent),
            memory_available: available,
            cpu_percent: clamp_sensor(cpu_percent),
            gpu_percent,
            gpu_memory_percent,
            timestamp: Utc::now(),
        }
    }
}

/// Clamp sensor value: NaN/negative becomes 0, finite otherwise.
fn clamp_sensor(value: f64) -> f64 {
    if !value.is_finite() || value < 0.0 {
        0.0
    } else {
        value
    }
}

/// Test sampler replaying a fixed script of samples.
///
/// Once the script is exhausted, the last sample repeats.
#[derive(Debug)]
pub struct ScriptedSampler {
    script: VecDeque<ResourceSample>,
    last: ResourceSample,
}

impl ScriptedSampler {
    /// Creates a sampler replaying `samples` in order.
    ///
    /// # Panics
    /// Panics when `samples` is empty.
    pub fn new(samples: Vec<ResourceSample>) -> Self {
        assert!(
            !samples.is_empty(),
            "scripted sampler needs at least one sample"
        );
        let last = samples[samples.len() - 1].clone();
        Self {
            script: samples.into(),
            last,
        }
    }

    /// Builds a memory-only sample, the common case in tests.
    pub fn memory_sample(memory_percent: f64) -> ResourceSample {
        ResourceSample {
            memory_percent,
            memory_available: 4 * 1024 * 1024 * 1024,
            cpu_percent: 10.0,
            gpu_percent: None,
            gpu_memory_percent: None,
            timestamp: Utc::now(),
        }
    }
}

impl ResourceSampler for ScriptedSampler {
    fn sample(&mut self) -> ResourceSample {
        self.script.pop_front().unwrap_or_else(|| self.last.clone())
    }
}
