//! Single-flight delivery worker
//!
//! One invocation walks Idle → Rotating → Sending → Confirmed | Retry:
//! - **Idle:** take the [`DeliveryGuard`], or return at once if it is held
//! - **Rotating:** move the active slot to pending unless a pending batch is
//!   already owed a retry
//! - **Sending:** POST the device id and the pending timestamps
//! - **Confirmed:** delete the pending slot
//! - **Retry:** leave the pending slot untouched for the next invocation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::identity::DeviceIdentity;
use super::transport::Transport;
use crate::queue::{count_lines, DurableQueue};

/// Form field carrying the device identifier
const FIELD_DEVICE_ID: &str = "macAddress";
/// Form field carrying the newline-joined timestamps
const FIELD_CSV: &str = "csv";

/// "A delivery attempt is in progress"
#[derive(Debug, Default)]
pub struct DeliveryGuard {
    in_progress: AtomicBool,
}

impl DeliveryGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the guard if it is clear. The guard is cleared when the token drops.
    pub fn try_acquire(&self) -> Option<GuardToken<'_>> {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GuardToken {
                flag: &self.in_progress,
            })
    }

    pub fn is_held(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }
}

/// Proof of holding the [`DeliveryGuard`]
#[must_use = "the guard is released as soon as the token is dropped"]
pub struct GuardToken<'a> {
    flag: &'a AtomicBool,
}

impl Drop for GuardToken<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Result of one [`DeliveryWorker::run`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Another invocation holds the guard
    Busy,
    /// No pending slot and nothing to rotate
    Idle,
    /// Collector confirmed the batch and the pending slot is gone
    Delivered { events: usize, status: u16 },
    /// Collector confirmed the batch but the pending slot could not be
    /// removed; it will be sent again
    DeliveredNotCleared { events: usize, status: u16 },
    /// Transport failure or non-success status; pending slot kept
    Retry { reason: String },
    /// Filesystem failure before anything was sent
    Failed { reason: String },
}

impl DeliveryOutcome {
    /// The collector accepted a batch during this invocation
    pub fn is_delivered(&self) -> bool {
        matches!(
            self,
            DeliveryOutcome::Delivered { .. } | DeliveryOutcome::DeliveredNotCleared { .. }
        )
    }
}

/// Running totals, for status output
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Transport calls made
    pub attempts: usize,
    /// Batches the collector accepted
    pub batches_delivered: usize,
    /// Events in accepted batches
    pub events_delivered: usize,
    /// Attempts that ended in Retry or Failed
    pub failures: usize,
}

/// Drains the pending slot to the collector, one batch per invocation.
pub struct DeliveryWorker {
    queue: Arc<DurableQueue>,
    transport: Box<dyn Transport>,
    identity: Box<dyn DeviceIdentity>,
    endpoint: String,
    guard: DeliveryGuard,
    stats: Mutex<DeliveryStats>,
}

impl DeliveryWorker {
    pub fn new(
        queue: Arc<DurableQueue>,
        transport: Box<dyn Transport>,
        identity: Box<dyn DeviceIdentity>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            queue,
            transport,
            identity,
            endpoint: endpoint.into(),
            guard: DeliveryGuard::new(),
            stats: Mutex::new(DeliveryStats::default()),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_busy(&self) -> bool {
        self.guard.is_held()
    }

    pub fn stats(&self) -> DeliveryStats {
        self.stats_mut().clone()
    }

    /// Run one delivery cycle. Never panics on I/O or network failure; every
    /// problem is reported through the returned outcome.
    pub fn run(&self) -> DeliveryOutcome {
        let Some(_token) = self.guard.try_acquire() else {
            tracing::debug!("Delivery already in progress, skipping");
            return DeliveryOutcome::Busy;
        };

        let outcome = self.deliver();
        match &outcome {
            DeliveryOutcome::Retry { .. } | DeliveryOutcome::Failed { .. } => {
                self.stats_mut().failures += 1;
            }
            DeliveryOutcome::Delivered { events, .. }
            | DeliveryOutcome::DeliveredNotCleared { events, .. } => {
                let mut stats = self.stats_mut();
                stats.batches_delivered += 1;
                stats.events_delivered += events;
            }
            DeliveryOutcome::Busy | DeliveryOutcome::Idle => {}
        }
        outcome
    }

    fn deliver(&self) -> DeliveryOutcome {
        match self.queue.rotate() {
            Ok(true) => tracing::debug!("Moved active slot to pending"),
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Could not rotate queue");
                return DeliveryOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        }

        let contents = match self.queue.read_pending() {
            Ok(Some(contents)) => contents,
            Ok(None) => return DeliveryOutcome::Idle,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read pending slot");
                return DeliveryOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let csv = contents.trim_end();
        let events = count_lines(csv);
        if events == 0 {
            // An empty snapshot (e.g. a crash right after the slot was created).
            if let Err(e) = self.queue.clear_pending() {
                tracing::warn!(error = %e, "Could not remove empty pending slot");
            }
            return DeliveryOutcome::Idle;
        }

        let device_id = self.identity.device_id();
        self.stats_mut().attempts += 1;

        let result = self.transport.post(
            &self.endpoint,
            &[(FIELD_DEVICE_ID, device_id.as_str()), (FIELD_CSV, csv)],
        );

        let status = match result {
            Ok(status) if (200..300).contains(&status) => status,
            Ok(status) => {
                tracing::warn!(status, events, "Collector rejected batch; will retry");
                return DeliveryOutcome::Retry {
                    reason: format!("collector responded with HTTP {status}"),
                };
            }
            Err(e) => {
                tracing::warn!(error = %e, events, "Failed to send batch; will retry");
                return DeliveryOutcome::Retry {
                    reason: e.to_string(),
                };
            }
        };

        match self.queue.clear_pending() {
            Ok(()) => {
                tracing::info!(events, status, device_id = %device_id, "Delivered batch");
                DeliveryOutcome::Delivered { events, status }
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    events,
                    "Batch delivered but pending slot not removed; it will be sent again"
                );
                DeliveryOutcome::DeliveredNotCleared { events, status }
            }
        }
    }

    fn stats_mut(&self) -> std::sync::MutexGuard<'_, DeliveryStats> {
        self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
