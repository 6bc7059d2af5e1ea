//! Exclusive per-blob write lock for the local store.
//!
//! At most one writer per blob at a time, across processes. The lock is
//! released when the guard is dropped.

use super::{BlobLocation, StoreError};
use fs2::FileExt;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

/// Backoff between try_lock attempts.
const POLL_INTERVAL_MS: u64 = 50;

/// Guard that holds the exclusive lock; releasing on drop.
pub(crate) struct BlobLockGuard {
    _file: std::fs::File,
}

/// Acquires the lock file `<dir>/.<blob>.lock`, waiting up to `timeout`.
///
/// A writer still holding the lock at the deadline is reported as
/// [`StoreError::Unavailable`], so a retrying store may try again later.
pub(crate) fn acquire_blob_lock(
    dir: &Path,
    location: &BlobLocation,
    timeout: Duration,
) -> Result<BlobLockGuard, StoreError> {
    let lock_path = dir.join(format!(".{}.lock", location.name));

    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&lock_path)
        .map_err(|source| StoreError::Io {
            path: lock_path.clone(),
            source,
        })?;

    let deadline = Instant::now() + timeout;
    let poll = Duration::from_millis(POLL_INTERVAL_MS);

    loop {
        match file.try_lock_exclusive() {
            Ok(()) => {
                return Ok(BlobLockGuard { _file: file });
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    return Err(StoreError::Unavailable {
                        location: location.clone(),
                        reason: format!(
                            "another writer holds the lock (timed out after {} ms)",
                            timeout.as_millis()
                        ),
                    });
                }
                thread::sleep(poll);
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: lock_path,
                    source,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location() -> BlobLocation {
        BlobLocation {
            resource_group: "rg".into(),
            storage_account: "account".into(),
            container: "config".into(),
            name: "shm.yaml".into(),
        }
    }

    #[test]
    fn test_second_writer_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let _held = acquire_blob_lock(dir.path(), &location(), Duration::from_millis(10)).unwrap();
        let err = acquire_blob_lock(dir.path(), &location(), Duration::from_millis(10))
            .err()
            .unwrap();
        assert!(err.is_transient());
    }

    #[test]
    fn test_lock_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        drop(acquire_blob_lock(dir.path(), &location(), Duration::from_millis(10)).unwrap());
        assert!(acquire_blob_lock(dir.path(), &location(), Duration::from_millis(10)).is_ok());
    }
}
