//! File locking with backoff retry

use crate::io::error::InboxError;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

/// Default retry count used by inbox and store operations.
pub const DEFAULT_LOCK_RETRIES: u32 = 5;

/// File lock guard that automatically releases on drop
pub struct FileLock {
    #[allow(dead_code)]
    file: File,
    #[cfg(not(unix))]
    path: std::path::PathBuf,
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }

        #[cfg(not(unix))]
        {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Backoff before retry `attempt`: 50ms, 100ms, 200ms, 400ms, 800ms, ...
fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(50u64 << attempt.min(10))
}

/// Acquire an exclusive lock on a file with backoff retry
///
/// The first attempt does not wait; retry `n` waits `50ms * 2^n` first.
/// Returns `InboxError::LockTimeout` if the lock is still held after
/// `max_retries` retries.
pub fn acquire_lock(path: &Path, max_retries: u32) -> Result<FileLock, InboxError> {
    #[cfg(unix)]
    {
        unix_acquire_lock(path, max_retries)
    }

    #[cfg(not(unix))]
    {
        exclusive_create_lock(path, max_retries)
    }
}

#[cfg(unix)]
fn unix_acquire_lock(path: &Path, max_retries: u32) -> Result<FileLock, InboxError> {
    use std::fs::OpenOptions;

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| InboxError::io(path, e))?;

    let fd = file.as_raw_fd();

    for attempt in 0..=max_retries {
        if attempt > 0 {
            std::thread::sleep(backoff(attempt - 1));
        }

        let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
        if result == 0 {
            return Ok(FileLock { file });
        }

        let err = std::io::Error::last_os_error();
        let would_block = err.raw_os_error() == Some(libc::EWOULDBLOCK)
            || err.raw_os_error() == Some(libc::EAGAIN);
        if !would_block {
            return Err(InboxError::io(path, err));
        }
    }

    Err(InboxError::LockTimeout {
        path: path.to_path_buf(),
        retries: max_retries,
    })
}

#[cfg(not(unix))]
fn exclusive_create_lock(path: &Path, max_retries: u32) -> Result<FileLock, InboxError> {
    use std::fs::OpenOptions;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            std::thread::sleep(backoff(attempt - 1));
        }

        match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(file) => {
                return Ok(FileLock {
                    file,
                    path: path.to_path_buf(),
                });
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(InboxError::io(path, e)),
        }
    }

    Err(InboxError::LockTimeout {
        path: path.to_path_buf(),
        retries: max_retries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(backoff(0), Duration::from_millis(50));
        assert_eq!(backoff(1), Duration::from_millis(100));
        assert_eq!(backoff(4), Duration::from_millis(800));
    }

    #[test]
    fn test_acquire_lock_success() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join("w1.lock");

        let lock = acquire_lock(&lock_path, DEFAULT_LOCK_RETRIES).unwrap();
        assert!(lock_path.exists());
        drop(lock);

        // Released on drop
        let _again = acquire_lock(&lock_path, 0).unwrap();
    }

    #[test]
    fn test_acquire_lock_waits_for_holder() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = Arc::new(temp_dir.path().join("w1.lock"));
        let barrier = Arc::new(Barrier::new(2));

        let holder_path = Arc::clone(&lock_path);
        let holder_barrier = Arc::clone(&barrier);
        let holder = thread::spawn(move || {
            let _lock = acquire_lock(&holder_path, DEFAULT_LOCK_RETRIES).unwrap();
            holder_barrier.wait();
            thread::sleep(Duration::from_millis(100));
        });

        barrier.wait();
        let result = acquire_lock(&lock_path, DEFAULT_LOCK_RETRIES);
        holder.join().unwrap();
        assert!(result.is_ok());
    }

    #[test]
    fn test_acquire_lock_timeout() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = Arc::new(temp_dir.path().join("w1.lock"));
        let barrier = Arc::new(Barrier::new(2));

        let holder_path = Arc::clone(&lock_path);
        let holder_barrier = Arc::clone(&barrier);
        let holder = thread::spawn(move || {
            let _lock = acquire_lock(&holder_path, DEFAULT_LOCK_RETRIES).unwrap();
            holder_barrier.wait();
            thread::sleep(Duration::from_secs(1));
        });

        barrier.wait();
        // 50 + 100 ms of retries, well inside the holder's second
        let result = acquire_lock(&lock_path, 2);
        assert!(matches!(result, Err(InboxError::LockTimeout { retries: 2, .. })));

        holder.join().unwrap();
    }
}
