//! # signal-counter-core
//!
//! Core library for signal-counter - a GPIO signal counter that durably
//! records every qualifying pulse and delivers the record to a remote
//! collector.
//!
//! This library provides:
//! - Edge qualification (dwell-time debouncing)
//! - A crash-safe two-slot event queue
//! - A single-flight, at-least-once delivery worker and its periodic driver
//! - Hardware, transport and identity capabilities
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Two threads of control:
//! - **Notification path:** GPIO watcher → [`EdgeQualifier`] → [`DurableQueue::append`] → LED
//! - **Driver loop:** [`Driver`] → [`DeliveryWorker::run`] → rotate → POST → clear
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use signal_counter_core::delivery::{HttpTransport, StaticIdentity};
//! use signal_counter_core::queue::QueuePaths;
//! use signal_counter_core::{DeliveryWorker, Driver, DurableQueue, TimestampUnit};
//!
//! let queue = Arc::new(DurableQueue::new(
//!     QueuePaths::new("/var/lib/signalCounter/count", "/tmp/signalCounterCount.swp"),
//!     TimestampUnit::Seconds,
//! ));
//! let transport = HttpTransport::new(Duration::from_secs(30)).expect("failed to build client");
//! let worker = DeliveryWorker::new(
//!     queue,
//!     Box::new(transport),
//!     Box::new(StaticIdentity("b8:27:eb:00:00:01".into())),
//!     "http://collector.example/record",
//! );
//! let driver = Driver::new(Arc::new(worker), Duration::from_secs(1));
//! driver.tick();
//! ```

// Re-export commonly used items at the crate root
pub use capture::CapturePipeline;
pub use config::Config;
pub use delivery::{DeliveryOutcome, DeliveryWorker};
pub use driver::Driver;
pub use edge::{EdgeQualifier, EdgeState};
pub use error::{Error, Result};
pub use queue::DurableQueue;
pub use types::*;

// Public modules
pub mod capture;
pub mod config;
pub mod delivery;
pub mod driver;
pub mod edge;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod queue;
pub mod types;
