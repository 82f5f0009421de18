//! Process-level lock so two daemons never share one event queue.
//!
//! Lock strategy:
//! - `<active slot>.lock`, next to the active slot, is owned by the process
//!   using that queue. Every process naming the same directory entry meets
//!   the same file, whatever its environment or working directory.
//! - Locks are advisory OS file locks (flock), held for process lifetime.
//! - The lock file is never removed: unlinking after unlock would let a
//!   waiter lock an orphaned inode while a newcomer locks a fresh one.

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

const LOCK_SUFFIX: &str = ".lock";

/// Held while this process owns the queue.
pub struct QueueLock {
    file: File,
}

impl Drop for QueueLock {
    fn drop(&mut self) {
        let _ = unlock_file(&self.file);
    }
}

/// Take ownership of the queue rooted at `active_path`.
///
/// Fails if another signal-counter process (daemon or `flush`) holds it.
pub fn acquire_queue_lock(active_path: &Path) -> Result<QueueLock> {
    match try_acquire_lock(active_path)? {
        Some(lock) => Ok(lock),
        None => anyhow::bail!(
            "another signal-counter process is already using the queue at {}",
            active_path.display()
        ),
    }
}

fn try_acquire_lock(active_path: &Path) -> Result<Option<QueueLock>> {
    let path = lock_path(active_path);
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create queue directory: {}", dir.display()))?;
    }

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .with_context(|| format!("failed to open lock file: {}", path.display()))?;

    match lock_file_nonblocking(&file) {
        Ok(()) => {
            // Write basic owner info for debugging.
            let _ = file.set_len(0);
            let _ = file.seek(SeekFrom::Start(0));
            let _ = writeln!(file, "pid={}", std::process::id());
            let _ = file.flush();

            Ok(Some(QueueLock { file }))
        }
        Err(e) if is_lock_busy(&e) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to lock file: {}", path.display())),
    }
}

/// `<active_path>.lock`, in the active slot's own directory.
fn lock_path(active_path: &Path) -> PathBuf {
    let mut name = OsString::from(active_path.as_os_str());
    name.push(LOCK_SUFFIX);
    PathBuf::from(name)
}

fn is_lock_busy(error: &io::Error) -> bool {
    matches!(error.kind(), io::ErrorKind::WouldBlock)
        || matches!(error.raw_os_error(), Some(11) | Some(35))
}

fn lock_file_nonblocking(file: &File) -> io::Result<()> {
    const LOCK_EX: i32 = 2;
    const LOCK_NB: i32 = 4;
    let fd = file.as_raw_fd();
    // SAFETY: flock is called with a valid file descriptor and constant flags.
    let rc = unsafe { flock(fd, LOCK_EX | LOCK_NB) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

fn unlock_file(file: &File) -> io::Result<()> {
    const LOCK_UN: i32 = 8;
    let fd = file.as_raw_fd();
    // SAFETY: flock is called with a valid file descriptor and constant flags.
    let rc = unsafe { flock(fd, LOCK_UN) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

extern "C" {
    fn flock(fd: i32, operation: i32) -> i32;
}

#[cfg(not(unix))]
compile_error!("signal-counter process locks currently require Unix (Linux)");
