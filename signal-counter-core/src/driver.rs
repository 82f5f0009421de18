//! Periodic driver for the delivery worker

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::delivery::{DeliveryOutcome, DeliveryWorker};

/// Default time between delivery cycles
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(1000);

/// Invokes the [`DeliveryWorker`] on a fixed period.
///
/// The period doubles as the retry interval; no backoff state is kept.
pub struct Driver {
    worker: Arc<DeliveryWorker>,
    period: Duration,
}

impl Driver {
    pub fn new(worker: Arc<DeliveryWorker>, period: Duration) -> Self {
        Self { worker, period }
    }

    pub fn worker(&self) -> &DeliveryWorker {
        &self.worker
    }

    /// Run one delivery cycle and log what happened.
    pub fn tick(&self) -> DeliveryOutcome {
        let outcome = self.worker.run();
        match &outcome {
            DeliveryOutcome::Busy => tracing::debug!("Previous delivery still running"),
            DeliveryOutcome::Idle => tracing::trace!("Nothing to deliver"),
            DeliveryOutcome::Delivered { .. } => {}
            DeliveryOutcome::DeliveredNotCleared { events, .. } => {
                tracing::warn!(events, "Batch will be delivered again")
            }
            DeliveryOutcome::Retry { reason } => {
                tracing::info!(reason = %reason, retry_in = ?self.period, "Delivery deferred")
            }
            DeliveryOutcome::Failed { reason } => {
                tracing::warn!(reason = %reason, retry_in = ?self.period, "Delivery cycle failed")
            }
        }
        outcome
    }

    /// Sleep, tick, repeat until `running` is cleared.
    ///
    /// Returns the number of cycles run.
    pub fn run_until(&self, running: &AtomicBool) -> u64 {
        let mut iteration = 0u64;
        while running.load(Ordering::SeqCst) {
            thread::sleep(self.period);
            if !running.load(Ordering::SeqCst) {
                break;
            }
            iteration += 1;
            self.tick();
        }

        let stats = self.worker.stats();
        tracing::info!(
            iterations = iteration,
            attempts = stats.attempts,
            batches_delivered = stats.batches_delivered,
            events_delivered = stats.events_delivered,
            failures = stats.failures,
            "Delivery loop stopped"
        );
        iteration
    }
}
