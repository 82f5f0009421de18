//! fsync helpers for crash safety.
//!
//! Creating, renaming or deleting a file changes its directory entry, which
//! survives power loss only after the directory itself is synced.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// Sync a file's contents and metadata to stable storage.
pub fn fsync_file(file: &File) -> io::Result<()> {
    file.sync_all()
}

/// Sync a directory so newly created, renamed or removed entries are durable.
pub fn fsync_dir(dir_path: &Path) -> io::Result<()> {
    let dir = OpenOptions::new().read(true).open(dir_path)?;
    dir.sync_all()
}

/// Sync the directory containing `path`.
pub fn fsync_parent(path: &Path) -> io::Result<()> {
    fsync_dir(parent_dir(path))
}

/// The directory holding `path`; `.` for bare file names.
pub fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
