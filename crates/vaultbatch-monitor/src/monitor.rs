//! Background resource monitor emitting tier-change and restart-needed
//! events.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};
use vaultbatch_core::{
    CoordinatorEvent, EventChannel, MonitorConfig, ResourceSample, Result, Thresholds, Tier,
};

use crate::sampler::ResourceSampler;
use crate::tier::{evaluate_tier, should_restart};

/// A confirmed tier transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierTransition {
    /// Tier before the transition.
    pub from: Tier,
    /// Tier after the transition.
    pub to: Tier,
}

/// Samples resource pressure on an interval and raises events.
///
/// The only state carried between samples is the last emitted tier and the
/// one-sample hysteresis guard; everything else is a pure function of the
/// sample and the fixed thresholds. A tier change must persist across two
/// consecutive samples before it is emitted, so readings that flap at a
/// threshold boundary do not thrash the host's settings. Restart pressure
/// has no such guard: it re-signals on every qualifying sample until the
/// pressure resolves.
pub struct ResourceMonitor {
    thresholds: Thresholds,
    interval: Duration,
    events: EventChannel,
    current: Tier,
    pending: Option<Tier>,
}

impl ResourceMonitor {
    /// Creates a monitor from validated configuration.
    pub fn new(config: &MonitorConfig, events: EventChannel) -> Result<Self> {
        config.thresholds.validate()?;
        Ok(Self {
            thresholds: config.thresholds,
            interval: config.sample_interval(),
            events,
            current: Tier::Full,
            pending: None,
        })
    }

    /// The last emitted tier.
    pub fn current_tier(&self) -> Tier {
        self.current
    }

    /// Ingests one sample: emits restart pressure immediately, and a tier
    /// change once the new tier has held for two consecutive samples.
    ///
    /// Returns the transition when one was emitted. Exposed so tests and
    /// embedders can drive the monitor without the background loop.
    pub fn observe(&mut self, sample: &ResourceSample) -> Option<TierTransition> {
        if should_restart(sample, &self.thresholds) {
            warn!(
                target: "vaultbatch.monitor",
                memory_percent = sample.memory_percent,
                restart_threshold = self.thresholds.restart_memory,
                "memory pressure above restart threshold"
            );
            self.events.send(CoordinatorEvent::RestartNeeded {
                memory_percent: sample.memory_percent,
            });
        }

        let target = evaluate_tier(sample, &self.thresholds);
        debug!(
            target: "vaultbatch.monitor",
            memory_percent = sample.memory_percent,
            cpu_percent = sample.cpu_percent,
            tier = %target,
            current = %self.current,
            "sample evaluated"
        );

        if target == self.current {
            self.pending = None;
            return None;
        }

        if self.pending != Some(target) {
            // First sample at the new tier; wait for confirmation.
            self.pending = Some(target);
            return None;
        }

        let from = self.current;
        self.current = target;
        self.pending = None;

        if target.severity() > from.severity() {
            warn!(
                target: "vaultbatch.monitor",
                from = %from,
                to = %target,
                "degradation tier escalated"
            );
        } else {
            info!(
                target: "vaultbatch.monitor",
                from = %from,
                to = %target,
                "degradation tier recovered"
            );
        }
        self.events
            .send(CoordinatorEvent::TierChanged { from, to: target });

        Some(TierTransition { from, to: target })
    }

    /// Spawns the background sampling loop.
    ///
    /// The loop samples on the configured interval until the returned
    /// handle is shut down.
    pub fn spawn<S>(self, mut sampler: S) -> MonitorHandle
    where
        S: ResourceSampler + 'static,
    {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let interval = self.interval;
        let mut monitor = self;

        let task = tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let sample = sampler.sample();
                        let _ = monitor.observe(&sample);
                    }
                }
            }
            debug!(target: "vaultbatch.monitor", "monitor loop stopped");
        });

        MonitorHandle { shutdown, task }
    }
}

/// Handle to a spawned monitor loop.
pub struct MonitorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Stops the loop and waits for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }

    /// Aborts the loop without waiting.
    pub fn abort(&self) {
        self.task.abort();
    }
}
