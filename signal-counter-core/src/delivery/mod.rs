//! Delivery of queued events to the remote collector
//!
//! ## Architecture
//!
//! Delivery is "local-first":
//! - Events are durably appended to the active slot before anything else
//! - The [`DeliveryWorker`] rotates that slot to pending and POSTs it
//! - The pending slot is deleted only after the collector answers 2xx
//! - Failures leave the pending slot alone; the next cycle sends it again
//!
//! Delivery is therefore at-least-once: a crash between a successful POST and
//! the deletion resends the same batch.

pub mod identity;
mod transport;
mod worker;

pub use identity::{DeviceIdentity, FileIdentity, StaticIdentity};
pub use transport::{encode_form, HttpTransport, Transport};
pub use worker::{DeliveryGuard, DeliveryOutcome, DeliveryStats, DeliveryWorker, GuardToken};
