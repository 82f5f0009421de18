//! Hardware capabilities used by the capture path
//!
//! The core never touches pins directly. It sees a [`GpioBackend`] that can
//! configure a pin, read and drive its level, and report level changes, plus
//! an [`ActivityIndicator`] it can poke without caring whether it works.

mod indicator;
mod sysfs;

pub use indicator::{ActivityIndicator, LedIndicator, NoopIndicator, READY_BLINK};
pub use sysfs::SysfsGpio;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::error::Result;
use crate::types::Level;

/// Direction of a GPIO pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Input,
    Output,
}

/// Internal bias resistor setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    Off,
    Down,
    Up,
}

/// Receives `(timestamp_ms, new_level)` for every observed level change
pub type LevelCallback = Box<dyn FnMut(u64, Level) + Send + 'static>;

/// Digital I/O capability
pub trait GpioBackend: Send + Sync {
    fn set_pin_mode(&self, pin: u32, mode: PinMode) -> Result<()>;

    fn set_pull(&self, pin: u32, pull: Pull) -> Result<()>;

    fn read_level(&self, pin: u32) -> Result<Level>;

    fn write_level(&self, pin: u32, level: Level) -> Result<()>;

    /// Deliver level changes on `pin` to `callback` until the returned
    /// [`Subscription`] is dropped. Notifications for one subscription are
    /// delivered one at a time.
    fn subscribe(&self, pin: u32, callback: LevelCallback) -> Result<Subscription>;
}

/// Keeps a level-change subscription alive; stops its watcher when dropped.
pub struct Subscription {
    stop: Arc<AtomicBool>,
    watcher: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(stop: Arc<AtomicBool>, watcher: JoinHandle<()>) -> Self {
        Self {
            stop,
            watcher: Some(watcher),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(watcher) = self.watcher.take() {
            let _ = watcher.join();
        }
    }
}
