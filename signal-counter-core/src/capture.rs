//! Notification path: level change → qualifier → durable log → LED

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::edge::{EdgeDecision, EdgeQualifier};
use crate::hardware::{ActivityIndicator, LevelCallback};
use crate::queue::DurableQueue;
use crate::types::{Level, SignalEvent};

/// LED pulse shown for each recorded signal
pub const SIGNAL_BLINK: Duration = Duration::from_millis(200);

pub struct CapturePipeline {
    qualifier: Mutex<EdgeQualifier>,
    queue: Arc<DurableQueue>,
    indicator: Arc<dyn ActivityIndicator>,
}

impl CapturePipeline {
    pub fn new(
        qualifier: EdgeQualifier,
        queue: Arc<DurableQueue>,
        indicator: Arc<dyn ActivityIndicator>,
    ) -> Self {
        Self {
            qualifier: Mutex::new(qualifier),
            queue,
            indicator,
        }
    }

    /// Handle one level-change notification.
    ///
    /// Returns the event when the pulse qualified, whether or not it could be
    /// written; a failed append is logged and the event is lost.
    pub fn handle_level_change(&self, timestamp_ms: u64, level: Level) -> Option<SignalEvent> {
        let decision = self
            .qualifier
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .classify(timestamp_ms, level);

        let event = match decision {
            EdgeDecision::Accepted(event) => event,
            EdgeDecision::Noise { dwell_ms } => {
                tracing::debug!(dwell_ms, "Ignoring pulse shorter than trigger interval");
                return None;
            }
            EdgeDecision::Armed | EdgeDecision::Unarmed => return None,
        };

        if let Err(e) = self.queue.append(&event) {
            tracing::error!(error = %e, timestamp_ms, "Failed to record signal");
        }
        self.indicator.indicate(SIGNAL_BLINK);
        Some(event)
    }

    /// Adapt the pipeline into a GPIO subscription callback.
    pub fn into_callback(self: Arc<Self>) -> LevelCallback {
        Box::new(move |timestamp_ms, level| {
            self.handle_level_change(timestamp_ms, level);
        })
    }
}
