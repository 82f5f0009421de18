//! Core domain types shared across the capture and delivery pipeline

use serde::Deserialize;

/// Logic level of a digital line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// Parse the contents of a sysfs `value` file ("0" / "1")
    pub fn from_sysfs(raw: &str) -> Option<Self> {
        match raw.trim() {
            "0" => Some(Level::Low),
            "1" => Some(Level::High),
            _ => None,
        }
    }

    pub fn as_sysfs(&self) -> &'static str {
        match self {
            Level::Low => "0",
            Level::High => "1",
        }
    }
}

/// A single validated occurrence on the input line.
///
/// Stamped with the wall-clock time of the qualifying falling edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalEvent {
    pub timestamp_ms: u64,
}

impl SignalEvent {
    pub fn new(timestamp_ms: u64) -> Self {
        Self { timestamp_ms }
    }

    /// Render the event as one line of the active slot
    pub fn to_line(&self, unit: TimestampUnit) -> String {
        format!("{}\n", unit.convert(self.timestamp_ms))
    }
}

/// Resolution of timestamps written to the queue and sent to the collector
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimestampUnit {
    /// Whole seconds since the epoch (what the collector endpoint ingests)
    #[default]
    Seconds,
    Milliseconds,
}

impl TimestampUnit {
    pub fn convert(&self, timestamp_ms: u64) -> u64 {
        match self {
            TimestampUnit::Seconds => timestamp_ms / 1000,
            TimestampUnit::Milliseconds => timestamp_ms,
        }
    }
}

/// Current wall-clock time in milliseconds since the epoch
pub fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
