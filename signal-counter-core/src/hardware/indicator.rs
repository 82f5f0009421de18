//! Activity LED

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::GpioBackend;
use crate::error::Result;
use crate::types::Level;

/// Blink length and gap of the start-up "ready" signal (three blinks)
pub const READY_BLINK: Duration = Duration::from_millis(300);

/// Fire-and-forget activity signal.
///
/// Implementations must never block the caller for long and must swallow
/// their own failures.
pub trait ActivityIndicator: Send + Sync {
    fn indicate(&self, duration: Duration);
}

/// Used when no LED is wired up
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopIndicator;

impl ActivityIndicator for NoopIndicator {
    fn indicate(&self, _duration: Duration) {}
}

/// Blinks an output pin
#[derive(Clone)]
pub struct LedIndicator {
    gpio: Arc<dyn GpioBackend>,
    pin: u32,
}

impl LedIndicator {
    pub fn new(gpio: Arc<dyn GpioBackend>, pin: u32) -> Self {
        Self { gpio, pin }
    }

    /// Drive the LED high for `duration`, blocking the caller.
    pub fn blink(&self, duration: Duration) -> Result<()> {
        self.gpio.write_level(self.pin, Level::High)?;
        thread::sleep(duration);
        self.gpio.write_level(self.pin, Level::Low)
    }

    /// Three blinks to show the daemon is up.
    pub fn announce_ready(&self) -> Result<()> {
        for i in 0..3 {
            if i > 0 {
                thread::sleep(READY_BLINK);
            }
            self.blink(READY_BLINK)?;
        }
        Ok(())
    }
}

impl ActivityIndicator for LedIndicator {
    fn indicate(&self, duration: Duration) {
        let led = self.clone();
        let spawned = thread::Builder::new()
            .name("led-blink".to_string())
            .spawn(move || {
                if let Err(e) = led.blink(duration) {
                    tracing::debug!(pin = led.pin, error = %e, "LED blink failed");
                }
            });
        if let Err(e) = spawned {
            tracing::debug!(error = %e, "Could not spawn LED blink");
        }
    }
}
