//! Coordination events emitted towards callers wanting notifications or
//! audit trails. The core only emits events; it never depends on how they
//! are displayed or stored.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use crate::batch::BatchId;
use crate::job::{JobId, JobStatus};
use crate::resource::Tier;
use crate::summary::RunSummary;

/// Event raised by the monitor, queue, or orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CoordinatorEvent {
    /// The degradation tier changed. Emitted exactly once per transition.
    TierChanged {
        /// Tier before the transition.
        from: Tier,
        /// Tier after the transition.
        to: Tier,
    },
    /// Memory pressure is above the restart threshold. Re-emitted on every
    /// qualifying sample until the pressure resolves.
    RestartNeeded {
        /// Memory usage that triggered the signal.
        memory_percent: f64,
    },
    /// A checkpoint was reached; the host is about to restart.
    Checkpoint {
        /// Batch at the checkpoint.
        batch_id: BatchId,
        /// Completed jobs so far in this run.
        completed: usize,
    },
    /// A job attempt started.
    JobStarted {
        /// Parent batch.
        batch_id: BatchId,
        /// The job.
        job_id: JobId,
        /// File being edited.
        file: PathBuf,
    },
    /// A job reached a terminal state.
    JobFinished {
        /// Parent batch.
        batch_id: BatchId,
        /// The job.
        job_id: JobId,
        /// Terminal status.
        status: JobStatus,
        /// Error recorded on failure.
        error: Option<String>,
    },
    /// A batch run started processing.
    RunStarted {
        /// The batch being processed.
        batch_id: BatchId,
        /// Batch name.
        name: String,
    },
    /// A batch run finished; carries the full summary.
    RunCompleted {
        /// The run's summary.
        summary: Box<RunSummary>,
    },
}

/// Channel for coordination events.
///
/// Cloneable sender handle; sends never block and are dropped (with a
/// warning) once the receiver is gone, so a disinterested caller costs
/// nothing.
#[derive(Clone)]
pub struct EventChannel {
    sender: mpsc::UnboundedSender<CoordinatorEvent>,
}

impl EventChannel {
    /// Creates a channel pair: the cloneable sender and its receiver.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CoordinatorEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Creates an event channel from an existing sender (for testing).
    pub fn from_sender(sender: mpsc::UnboundedSender<CoordinatorEvent>) -> Self {
        Self { sender }
    }

    /// Sends an event through the channel.
    ///
    /// Events are dropped if the receiver has been closed.
    pub fn send(&self, event: CoordinatorEvent) {
        if let Err(error) = self.sender.send(event) {
            warn!("Failed to send coordinator event: {}", error);
        }
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        let (sender, _receiver) = mpsc::unbounded_channel();
        Self { sender }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (channel, mut receiver) = EventChannel::new();

        channel.send(CoordinatorEvent::TierChanged {
            from: Tier::Full,
            to: Tier::Reduced,
        });
        channel.send(CoordinatorEvent::RestartNeeded {
            memory_percent: 92.5,
        });

        match receiver.recv().await {
            Some(CoordinatorEvent::TierChanged { from, to }) => {
                assert_eq!(from, Tier::Full);
                assert_eq!(to, Tier::Reduced);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        match receiver.recv().await {
            Some(CoordinatorEvent::RestartNeeded { memory_percent }) => {
                assert!((memory_percent - 92.5).abs() < f64::EPSILON);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_after_receiver_dropped_does_not_panic() {
        let (channel, receiver) = EventChannel::new();
        drop(receiver);

        channel.send(CoordinatorEvent::RestartNeeded {
            memory_percent: 95.0,
        });
    }

    #[test]
    fn test_default_channel_is_detached() {
        let channel = EventChannel::default();
        channel.send(CoordinatorEvent::RestartNeeded {
            memory_percent: 91.0,
        });
    }
}
