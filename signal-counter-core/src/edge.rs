//! Edge qualification
//!
//! Turns raw level-change notifications into validated [`SignalEvent`]s using
//! dwell-time filtering: a rising edge must be held for at least the trigger
//! interval before the matching falling edge counts as a signal.

use std::time::Duration;

use crate::types::{Level, SignalEvent};

/// Default minimum dwell between rising and falling edge
pub const DEFAULT_TRIGGER_INTERVAL: Duration = Duration::from_millis(300);

/// Debounce memory owned by an [`EdgeQualifier`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeState {
    /// Timestamp of the most recent unmatched rising edge
    pub last_rising_edge_ms: Option<u64>,
    /// Timestamp of the most recent falling edge that produced an event
    pub last_accepted_edge_ms: Option<u64>,
}

/// What the qualifier decided about a single notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDecision {
    /// Rising edge remembered
    Armed,
    /// Falling edge seen without a preceding rising edge
    Unarmed,
    /// Pulse shorter than the trigger interval
    Noise { dwell_ms: u64 },
    /// Pulse long enough to count
    Accepted(SignalEvent),
}

/// Dwell-time filter for a single input line.
///
/// Not internally synchronized; callers that receive notifications on more
/// than one thread must wrap it in a lock.
#[derive(Debug, Clone)]
pub struct EdgeQualifier {
    trigger_interval_ms: u64,
    state: EdgeState,
}

impl EdgeQualifier {
    pub fn new(trigger_interval: Duration) -> Self {
        Self {
            trigger_interval_ms: trigger_interval.as_millis() as u64,
            state: EdgeState::default(),
        }
    }

    pub fn trigger_interval(&self) -> Duration {
        Duration::from_millis(self.trigger_interval_ms)
    }

    pub fn state(&self) -> &EdgeState {
        &self.state
    }

    /// Feed one notification, returning an event when the pulse qualifies.
    pub fn on_level_change(&mut self, timestamp_ms: u64, level: Level) -> Option<SignalEvent> {
        match self.classify(timestamp_ms, level) {
            EdgeDecision::Accepted(event) => Some(event),
            _ => None,
        }
    }

    /// Like [`on_level_change`](Self::on_level_change) but reports why a
    /// notification did not produce an event.
    pub fn classify(&mut self, timestamp_ms: u64, level: Level) -> EdgeDecision {
        if level == Level::High {
            self.state.last_rising_edge_ms = Some(timestamp_ms);
            return EdgeDecision::Armed;
        }

        let Some(rising_ms) = self.state.last_rising_edge_ms.take() else {
            return EdgeDecision::Unarmed;
        };

        // A wall clock stepping backwards yields zero dwell, which is noise.
        let dwell_ms = timestamp_ms.saturating_sub(rising_ms);
        if dwell_ms < self.trigger_interval_ms {
            return EdgeDecision::Noise { dwell_ms };
        }

        self.state.last_accepted_edge_ms = Some(timestamp_ms);
        EdgeDecision::Accepted(SignalEvent::new(timestamp_ms))
    }
}

impl Default for EdgeQualifier {
    fn default() -> Self {
        Self::new(DEFAULT_TRIGGER_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(qualifier: &mut EdgeQualifier, edges: &[(u64, Level)]) -> Vec<SignalEvent> {
        edges
            .iter()
            .filter_map(|&(ts, level)| qualifier.on_level_change(ts, level))
            .collect()
    }

    #[test]
    fn test_long_pulse_emits_event_at_falling_edge() {
        let mut q = EdgeQualifier::default();
        let events = feed(&mut q, &[(1000, Level::High), (1350, Level::Low)]);
        assert_eq!(events, vec![SignalEvent::new(1350)]);
        assert_eq!(q.state().last_rising_edge_ms, None);
        assert_eq!(q.state().last_accepted_edge_ms, Some(1350));
    }

    #[test]
    fn test_dwell_equal_to_interval_counts() {
        let mut q = EdgeQualifier::default();
        let events = feed(&mut q, &[(1000, Level::High), (1300, Level::Low)]);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_short_pulse_is_noise_and_clears_memory() {
        let mut q = EdgeQualifier::default();
        assert_eq!(q.classify(1000, Level::High), EdgeDecision::Armed);
        assert_eq!(
            q.classify(1299, Level::Low),
            EdgeDecision::Noise { dwell_ms: 299 }
        );
        assert_eq!(q.state().last_rising_edge_ms, None);
        assert_eq!(q.state().last_accepted_edge_ms, None);
    }

    #[test]
    fn test_short_pulses_do_not_accumulate() {
        let mut q = EdgeQualifier::default();
        let events = feed(
            &mut q,
            &[
                (0, Level::High),
                (200, Level::Low),
                (250, Level::High),
                (450, Level::Low),
            ],
        );
        assert!(events.is_empty());
    }

    #[test]
    fn test_falling_without_rising_is_ignored() {
        let mut q = EdgeQualifier::default();
        assert_eq!(q.classify(5000, Level::Low), EdgeDecision::Unarmed);
        assert_eq!(q.state(), &EdgeState::default());
    }

    #[test]
    fn test_double_falling_edge_counts_once() {
        let mut q = EdgeQualifier::default();
        let events = feed(
            &mut q,
            &[(0, Level::High), (400, Level::Low), (900, Level::Low)],
        );
        assert_eq!(events, vec![SignalEvent::new(400)]);
    }

    #[test]
    fn test_repeated_rising_edge_restarts_dwell() {
        let mut q = EdgeQualifier::default();
        let events = feed(
            &mut q,
            &[(0, Level::High), (200, Level::High), (400, Level::Low)],
        );
        assert!(events.is_empty());
    }

    #[test]
    fn test_clock_step_backwards_is_noise() {
        let mut q = EdgeQualifier::default();
        q.on_level_change(10_000, Level::High);
        assert_eq!(
            q.classify(9_000, Level::Low),
            EdgeDecision::Noise { dwell_ms: 0 }
        );
    }

    #[test]
    fn test_custom_interval() {
        let mut q = EdgeQualifier::new(Duration::from_millis(50));
        let events = feed(&mut q, &[(0, Level::High), (60, Level::Low)]);
        assert_eq!(events.len(), 1);
        assert_eq!(q.trigger_interval(), Duration::from_millis(50));
    }

    #[test]
    fn test_one_event_per_qualifying_pair() {
        // Deterministic pseudo-random edge stream checked against a reference count.
        let mut q = EdgeQualifier::default();
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut ts = 0u64;
        let mut rising: Option<u64> = None;
        let mut expected = 0usize;
        let mut emitted = 0usize;

        for _ in 0..2000 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            ts += seed % 700;
            let level = if seed & 1 == 0 { Level::High } else { Level::Low };

            match level {
                Level::High => rising = Some(ts),
                Level::Low => {
                    if let Some(r) = rising.take() {
                        if ts - r >= 300 {
                            expected += 1;
                        }
                    }
                }
            }
            if q.on_level_change(ts, level).is_some() {
                emitted += 1;
            }
        }

        assert_eq!(emitted, expected);
    }
}
