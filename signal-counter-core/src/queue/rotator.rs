//! Hand-off from the active slot to the pending slot.

use std::fs;
use std::path::Path;

use super::fsync::{fsync_parent, parent_dir};
use super::{DurableQueue, QueuePaths};
use crate::error::{Error, Result};

/// `EXDEV`: rename across mount points
const CROSS_DEVICE_LINK: i32 = 18;

impl DurableQueue {
    /// Move the active slot to the pending slot.
    ///
    /// Returns `Ok(false)` without touching anything when a pending slot is
    /// already waiting for delivery or when there is nothing to rotate. The
    /// move is a single `rename`, so after a crash exactly one of the two
    /// slots holds the batch.
    pub fn rotate(&self) -> Result<bool> {
        let _guard = self.lock();
        let QueuePaths { active, pending } = &self.paths;

        if pending.exists() {
            tracing::debug!(path = %pending.display(), "Pending slot already exists");
            return Ok(false);
        }
        if !active.exists() {
            return Ok(false);
        }

        let pending_dir = parent_dir(pending);
        fs::create_dir_all(pending_dir).map_err(Error::fs("create directory", pending_dir))?;

        if let Err(e) = fs::rename(active, pending) {
            if e.raw_os_error() == Some(CROSS_DEVICE_LINK) {
                tracing::error!(
                    active = %active.display(),
                    pending = %pending.display(),
                    "Queue slots are on different filesystems; rename cannot be atomic"
                );
            }
            return Err(Error::fs("rename active slot to", pending)(e));
        }

        fsync_parent(pending).map_err(Error::fs("sync directory of", pending))?;
        if parent_dir(active) != pending_dir {
            fsync_parent(active).map_err(Error::fs("sync directory of", active))?;
        }

        tracing::debug!(
            from = %active.display(),
            to = %pending.display(),
            "Rotated active slot to pending"
        );
        Ok(true)
    }
}

/// Whether the directories that hold both slots are on the same device.
///
/// Returns `None` when either directory cannot be inspected yet.
pub fn slots_share_device(paths: &QueuePaths) -> Option<bool> {
    use std::os::unix::fs::MetadataExt;

    let device_of = |path: &Path| nearest_existing(parent_dir(path)).map(|m| m.dev());
    Some(device_of(&paths.active)? == device_of(&paths.pending)?)
}

fn nearest_existing(mut dir: &Path) -> Option<fs::Metadata> {
    loop {
        if let Ok(meta) = fs::metadata(dir) {
            return Some(meta);
        }
        dir = dir.parent()?;
    }
}
