//! Advisory file locking
//!
//! `flock(2)` locks belong to the open file description, so two handles opened
//! independently exclude each other even inside one process. The kernel drops them
//! when the descriptor closes, including when the holder is killed.

use anyhow::Context;
use crate::Result;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;
use std::time::{Duration, Instant};

/// RAII guard for an exclusive file lock
///
/// The lock is released when this guard is dropped. The guard borrows the file so
/// the descriptor cannot be closed underneath it.
pub struct LockGuard<'a> {
    file: &'a File,
}

impl<'a> LockGuard<'a> {
    /// Block until an exclusive lock on `file` is held
    pub fn exclusive(file: &'a File) -> Result<Self> {
        let fd: RawFd = file.as_raw_fd();

        loop {
            let result = unsafe { libc::flock(fd, libc::LOCK_EX) };
            if result == 0 {
                break;
            }

            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err).context("flock(LOCK_EX) failed");
        }

        Ok(Self { file })
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
        // Ignore errors on unlock - closing the file releases it anyway
    }
}

/// Exclusive lock that owns its lock file
///
/// Used as the daemon's instance lock: whoever holds it is the only process allowed
/// to write the sample log and the process handle.
#[derive(Debug)]
pub struct InstanceLock {
    file: File,
}

impl InstanceLock {
    /// Try to take the lock at `path`, retrying for up to `wait`
    ///
    /// # Returns
    ///
    /// `Ok(None)` when another holder still has the lock after `wait`.
    pub fn try_acquire(path: &Path, wait: Duration) -> Result<Option<Self>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open lock file: {}", path.display()))?;

        let deadline = Instant::now() + wait;
        loop {
            let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
            if result == 0 {
                return Ok(Some(Self { file }));
            }

            let err = std::io::Error::last_os_error();
            match err.kind() {
                ErrorKind::Interrupted => continue,
                ErrorKind::WouldBlock if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(50));
                }
                ErrorKind::WouldBlock => return Ok(None),
                _ => return Err(err).context("flock(LOCK_EX | LOCK_NB) failed"),
            }
        }
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
    }
}
