//! End-to-end tests for the capture-and-delivery pipeline
//!
//! These drive the real queue on a temp directory with in-memory transport
//! and identity fakes, including simulated restarts between steps.

use signal_counter_core::delivery::{DeviceIdentity, Transport};
use signal_counter_core::hardware::NoopIndicator;
use signal_counter_core::queue::QueuePaths;
use signal_counter_core::{
    CapturePipeline, DeliveryOutcome, DeliveryWorker, Driver, DurableQueue, EdgeQualifier, Error,
    Level, Result, TimestampUnit,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Collector stand-in: records each submission; can be switched offline.
#[derive(Clone, Default)]
struct FakeCollector {
    received: Arc<Mutex<Vec<HashMap<String, String>>>>,
    offline: Arc<Mutex<bool>>,
}

impl FakeCollector {
    fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap() = offline;
    }

    fn submissions(&self) -> Vec<HashMap<String, String>> {
        self.received.lock().unwrap().clone()
    }
}

impl Transport for FakeCollector {
    fn post(&self, _url: &str, fields: &[(&str, &str)]) -> Result<u16> {
        if *self.offline.lock().unwrap() {
            return Err(Error::Transport("HTTP request failed: timeout".to_string()));
        }
        self.received.lock().unwrap().push(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        Ok(200)
    }
}

struct Mac;

impl DeviceIdentity for Mac {
    fn device_id(&self) -> String {
        "b8:27:eb:12:34:56".to_string()
    }
}

fn paths(dir: &TempDir) -> QueuePaths {
    QueuePaths::new(
        dir.path().join("var/lib/signalCounter/count"),
        dir.path().join("tmp/signalCounterCount.swp"),
    )
}

/// Everything a freshly started process would build.
struct Process {
    queue: Arc<DurableQueue>,
    capture: CapturePipeline,
    driver: Driver,
}

fn start(dir: &TempDir, collector: &FakeCollector) -> Process {
    let queue = Arc::new(DurableQueue::new(paths(dir), TimestampUnit::Milliseconds));
    let capture = CapturePipeline::new(
        EdgeQualifier::new(Duration::from_millis(300)),
        Arc::clone(&queue),
        Arc::new(NoopIndicator),
    );
    let worker = DeliveryWorker::new(
        Arc::clone(&queue),
        Box::new(collector.clone()),
        Box::new(Mac),
        "http://dispatch/uk/box-form/record-signal-counter-csv",
    );
    let driver = Driver::new(Arc::new(worker), Duration::from_millis(1000));
    Process {
        queue,
        capture,
        driver,
    }
}

#[test]
fn test_end_to_end_single_signal() {
    let dir = TempDir::new().unwrap();
    let collector = FakeCollector::default();
    let process = start(&dir, &collector);

    process.capture.handle_level_change(1000, Level::High);
    process.capture.handle_level_change(1350, Level::Low);

    let paths = process.queue.paths().clone();
    assert_eq!(std::fs::read_to_string(&paths.active).unwrap(), "1350\n");

    let outcome = process.driver.tick();
    assert_eq!(
        outcome,
        DeliveryOutcome::Delivered {
            events: 1,
            status: 200
        }
    );

    let submissions = collector.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0]["csv"], "1350");
    assert_eq!(submissions[0]["macAddress"], "b8:27:eb:12:34:56");
    assert!(!paths.active.exists());
    assert!(!paths.pending.exists());
}

#[test]
fn test_outage_and_restart_lose_nothing() {
    let dir = TempDir::new().unwrap();
    let collector = FakeCollector::default();
    collector.set_offline(true);

    {
        let process = start(&dir, &collector);
        for (i, base) in [10_000u64, 20_000, 30_000].iter().enumerate() {
            process.capture.handle_level_change(*base, Level::High);
            process
                .capture
                .handle_level_change(*base + 400 + i as u64, Level::Low);
        }
        assert!(matches!(
            process.driver.tick(),
            DeliveryOutcome::Retry { .. }
        ));
        // One more signal lands in the fresh active slot before the "crash".
        process.capture.handle_level_change(40_000, Level::High);
        process.capture.handle_level_change(40_500, Level::Low);
    }

    // Restart: new in-memory state, same files on disk.
    collector.set_offline(false);
    let process = start(&dir, &collector);

    assert!(process.driver.tick().is_delivered());
    assert!(process.driver.tick().is_delivered());
    assert_eq!(process.driver.tick(), DeliveryOutcome::Idle);

    let csvs: Vec<String> = collector
        .submissions()
        .into_iter()
        .map(|fields| fields["csv"].clone())
        .collect();
    assert_eq!(csvs, vec!["10400\n20401\n30402", "40500"]);
}

#[test]
fn test_restart_forgets_half_seen_pulse() {
    let dir = TempDir::new().unwrap();
    let collector = FakeCollector::default();

    {
        let process = start(&dir, &collector);
        process.capture.handle_level_change(1000, Level::High);
    }

    // The falling edge arrives after a restart with no rising edge on record.
    let process = start(&dir, &collector);
    assert_eq!(process.capture.handle_level_change(2000, Level::Low), None);
    assert_eq!(process.driver.tick(), DeliveryOutcome::Idle);
    assert!(collector.submissions().is_empty());
}
