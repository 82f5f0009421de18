//! Durable two-slot event queue
//!
//! Validated events are appended to the *active* slot. The delivery side
//! periodically renames the active slot to the *pending* slot and sends that
//! snapshot; the pending slot is removed only after the collector confirms it.
//!
//! ```text
//!   append ──▶ active ──rename──▶ pending ──POST ok──▶ (removed)
//!                                    │
//!                                    └──POST failed──▶ retried next cycle
//! ```
//!
//! Append and rotate are serialized through one lock held by [`DurableQueue`],
//! so a rename never races an in-progress append.

mod fsync;
mod log;
mod rotator;

pub use rotator::slots_share_device;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::config::QueueConfig;
use crate::error::{Error, Result};
use crate::types::TimestampUnit;

/// Locations of the two queue slots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuePaths {
    pub active: PathBuf,
    pub pending: PathBuf,
}

impl QueuePaths {
    pub fn new(active: impl Into<PathBuf>, pending: impl Into<PathBuf>) -> Self {
        Self {
            active: active.into(),
            pending: pending.into(),
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(&config.active_path, &config.pending_path)
    }
}

/// Shared handle over the active and pending slots
#[derive(Debug)]
pub struct DurableQueue {
    paths: QueuePaths,
    unit: TimestampUnit,
    lock: Mutex<()>,
}

impl DurableQueue {
    pub fn new(paths: QueuePaths, unit: TimestampUnit) -> Self {
        Self {
            paths,
            unit,
            lock: Mutex::new(()),
        }
    }

    pub fn paths(&self) -> &QueuePaths {
        &self.paths
    }

    /// Read the whole pending snapshot, or `None` when there is no pending slot.
    pub fn read_pending(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.paths.pending) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::fs("read pending slot", &self.paths.pending)(e)),
        }
    }

    /// Delete the pending slot after confirmed delivery.
    pub fn clear_pending(&self) -> Result<()> {
        let path = &self.paths.pending;
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Error::fs("remove pending slot", path)(e)),
        }
        fsync::fsync_parent(path).map_err(Error::fs("sync directory of", path))?;
        tracing::debug!(path = %path.display(), "Pending slot removed");
        Ok(())
    }

    /// Number of queued events in a slot, counting non-empty lines.
    pub fn count_events(path: &Path) -> Result<usize> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(count_lines(&contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(Error::fs("read", path)(e)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The guarded data is (), so a poisoned lock carries no broken state.
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub(crate) fn count_lines(contents: &str) -> usize {
    contents.lines().filter(|l| !l.trim().is_empty()).count()
}
