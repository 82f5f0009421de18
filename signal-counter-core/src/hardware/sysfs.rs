//! Linux sysfs GPIO backend
//!
//! Pins live under `<root>/gpioN/` once exported through `<root>/export`.
//! Level changes are found by sampling `gpioN/value` on a dedicated thread.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::{GpioBackend, LevelCallback, PinMode, Pull, Subscription};
use crate::error::{Error, Result};
use crate::types::{now_ms, Level};

/// How long to wait for udev to create `gpioN/` after an export
const EXPORT_SETTLE_TIMEOUT: Duration = Duration::from_secs(1);

pub struct SysfsGpio {
    root: PathBuf,
    poll_interval: Duration,
}

impl SysfsGpio {
    pub fn new(root: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            root: root.into(),
            poll_interval,
        }
    }

    /// Check that the sysfs GPIO tree is present at all.
    pub fn probe(&self) -> Result<()> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(Error::HardwareInit(format!(
                "GPIO sysfs root {} not found",
                self.root.display()
            )))
        }
    }

    fn pin_dir(&self, pin: u32) -> PathBuf {
        self.root.join(format!("gpio{pin}"))
    }

    fn value_path(&self, pin: u32) -> PathBuf {
        self.pin_dir(pin).join("value")
    }

    fn export(&self, pin: u32) -> Result<()> {
        let pin_dir = self.pin_dir(pin);
        if pin_dir.exists() {
            return Ok(());
        }

        let export = self.root.join("export");
        fs::write(&export, pin.to_string()).map_err(|e| {
            Error::HardwareInit(format!("failed to export GPIO {pin} via {}: {e}", export.display()))
        })?;

        let deadline = Instant::now() + EXPORT_SETTLE_TIMEOUT;
        while !pin_dir.join("direction").exists() {
            if Instant::now() >= deadline {
                return Err(Error::HardwareInit(format!(
                    "GPIO {pin} did not appear at {} after export",
                    pin_dir.display()
                )));
            }
            thread::sleep(Duration::from_millis(10));
        }
        tracing::debug!(pin, "Exported GPIO");
        Ok(())
    }
}

fn read_value(path: &Path) -> Result<Level> {
    let raw = fs::read_to_string(path).map_err(Error::fs("read", path))?;
    Level::from_sysfs(&raw).ok_or_else(|| {
        Error::Filesystem {
            action: "parse",
            path: path.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unexpected GPIO value {:?}", raw.trim()),
            ),
        }
    })
}

impl GpioBackend for SysfsGpio {
    fn set_pin_mode(&self, pin: u32, mode: PinMode) -> Result<()> {
        self.export(pin)?;
        let direction = match mode {
            PinMode::Input => "in",
            PinMode::Output => "out",
        };
        let path = self.pin_dir(pin).join("direction");
        fs::write(&path, direction).map_err(|e| {
            Error::HardwareInit(format!("failed to set GPIO {pin} direction to {direction}: {e}"))
        })?;
        tracing::debug!(pin, direction, "Configured GPIO direction");
        Ok(())
    }

    fn set_pull(&self, pin: u32, pull: Pull) -> Result<()> {
        // sysfs has no bias control; the pull must come from the device tree or wiring.
        tracing::warn!(
            pin,
            ?pull,
            "sysfs GPIO cannot set pull resistors; relying on board configuration"
        );
        Ok(())
    }

    fn read_level(&self, pin: u32) -> Result<Level> {
        read_value(&self.value_path(pin))
    }

    fn write_level(&self, pin: u32, level: Level) -> Result<()> {
        let path = self.value_path(pin);
        fs::write(&path, level.as_sysfs()).map_err(Error::fs("write", &path))
    }

    fn subscribe(&self, pin: u32, mut callback: LevelCallback) -> Result<Subscription> {
        let path = self.value_path(pin);
        let mut last = read_value(&path)
            .map_err(|e| Error::HardwareInit(format!("cannot watch GPIO {pin}: {e}")))?;

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let poll_interval = self.poll_interval;

        let watcher = thread::Builder::new()
            .name(format!("gpio{pin}-watch"))
            .spawn(move || {
                let mut read_failing = false;
                while !stop_flag.load(Ordering::SeqCst) {
                    thread::sleep(poll_interval);
                    match read_value(&path) {
                        Ok(level) => {
                            read_failing = false;
                            if level != last {
                                last = level;
                                callback(now_ms(), level);
                            }
                        }
                        Err(e) => {
                            if !read_failing {
                                tracing::warn!(pin, error = %e, "Failed to sample GPIO");
                            }
                            read_failing = true;
                        }
                    }
                }
            })
            .map_err(|e| Error::HardwareInit(format!("failed to spawn GPIO watcher: {e}")))?;

        tracing::info!(pin, ?poll_interval, initial = ?last, "Watching GPIO for level changes");
        Ok(Subscription::new(stop, watcher))
    }
}
