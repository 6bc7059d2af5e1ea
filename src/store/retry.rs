//! Bounded retry around any [`BlobStore`].

use super::{BlobLocation, BlobStore, StoreError};
use std::thread;
use std::time::Duration;

/// How often and how patiently a transient failure is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Retries without sleeping
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before the attempt after one that waited `current`
    fn next_backoff(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_backoff)
    }
}

/// Retries transient failures of the wrapped store with exponential backoff.
///
/// Only [`StoreError::is_transient`] failures are retried; a missing blob is
/// an answer, not a failure.
#[derive(Debug)]
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: BlobStore> RetryingStore<S> {
    pub fn new(inner: S) -> Self {
        Self::with_policy(inner, RetryPolicy::default())
    }

    pub fn with_policy(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn run<T>(
        &self,
        operation: &str,
        location: &BlobLocation,
        mut attempt_once: impl FnMut() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut backoff = self.policy.initial_backoff;
        let mut attempt = 1;
        loop {
            match attempt_once() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.policy.max_attempts => {
                    tracing::warn!(
                        operation,
                        blob = %location,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "{err}; retrying"
                    );
                    thread::sleep(backoff);
                    backoff = self.policy.next_backoff(backoff);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl<S: BlobStore> BlobStore for RetryingStore<S> {
    fn download_blob(&self, location: &BlobLocation) -> Result<String, StoreError> {
        self.run("download", location, || self.inner.download_blob(location))
    }

    fn upload_blob(&self, content: &str, location: &BlobLocation) -> Result<(), StoreError> {
        self.run("upload", location, || self.inner.upload_blob(content, location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBlobStore;

    fn location() -> BlobLocation {
        BlobLocation {
            resource_group: "rg".into(),
            storage_account: "account".into(),
            container: "config".into(),
            name: "shm.yaml".into(),
        }
    }

    #[test]
    fn test_transient_failures_retried_within_bound() {
        let store = RetryingStore::with_policy(MemoryBlobStore::new(), RetryPolicy::immediate(3));
        store.inner().fail_next(2);
        store.upload_blob("a: 1\n", &location()).unwrap();
        assert_eq!(store.inner().requests(), 3);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let store = RetryingStore::with_policy(MemoryBlobStore::new(), RetryPolicy::immediate(3));
        store.inner().fail_next(5);
        let err = store.upload_blob("a: 1\n", &location()).unwrap_err();
        assert!(err.is_transient());
        assert_eq!(store.inner().requests(), 3);
    }

    #[test]
    fn test_backoff_doubles_up_to_ceiling() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.next_backoff(Duration::from_millis(500)), Duration::from_secs(1));
        assert_eq!(policy.next_backoff(Duration::from_secs(6)), Duration::from_secs(8));

        let huge = RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::MAX,
            max_backoff: Duration::MAX,
        };
        assert_eq!(huge.next_backoff(Duration::MAX), Duration::MAX);
    }

    #[test]
    fn test_not_found_is_never_retried() {
        let store = RetryingStore::with_policy(MemoryBlobStore::new(), RetryPolicy::immediate(3));
        let err = store.download_blob(&location()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert_eq!(store.inner().requests(), 1);
    }
}
