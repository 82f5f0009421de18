//! Append side of the queue: the durable event log.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};

use super::fsync::{fsync_file, fsync_parent, parent_dir};
use super::DurableQueue;
use crate::error::{Error, Result};
use crate::types::SignalEvent;

impl DurableQueue {
    /// Append one event to the active slot.
    ///
    /// Returns only once the line is synced to stable storage. When the call
    /// creates the active slot, its directory entry is synced too.
    pub fn append(&self, event: &SignalEvent) -> Result<()> {
        let _guard = self.lock();
        let path = &self.paths.active;

        let dir = parent_dir(path);
        fs::create_dir_all(dir).map_err(Error::fs("create directory", dir))?;

        let created = !path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(Error::fs("open active slot", path))?;

        let line = event.to_line(self.unit);
        write_synced(&mut file, |f| f.write_all(line.as_bytes()))
            .map_err(Error::fs("append to active slot", path))?;

        if created {
            fsync_parent(path).map_err(Error::fs("sync directory of", path))?;
        }

        tracing::info!(
            timestamp_ms = event.timestamp_ms,
            path = %path.display(),
            "Signal recorded"
        );
        Ok(())
    }

    /// Whether the active slot currently exists
    pub fn active_exists(&self) -> bool {
        self.paths.active.exists()
    }

    /// Whether the pending slot currently exists
    pub fn pending_exists(&self) -> bool {
        self.paths.pending.exists()
    }
}

/// Run `write` against `file` and sync it. On any failure the file is cut
/// back to its previous length so no partial line is left behind.
fn write_synced(
    file: &mut File,
    write: impl FnOnce(&mut File) -> io::Result<()>,
) -> io::Result<()> {
    let len = file.metadata()?.len();
    let result = write(&mut *file).and_then(|()| fsync_file(file));
    if let Err(e) = &result {
        if let Err(rollback) = file.set_len(len).and_then(|()| file.sync_all()) {
            tracing::error!(
                error = %e,
                rollback_error = %rollback,
                "Failed to discard partial append"
            );
        }
    }
    result
}
