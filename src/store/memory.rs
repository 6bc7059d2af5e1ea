//! In-process blob store, for tests and dry runs.

use super::{BlobLocation, BlobStore, StoreError};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

/// Blobs held in memory.
///
/// `fail_next` makes the following requests fail with a transient error,
/// which is how retry behaviour is exercised without a network.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RefCell<BTreeMap<BlobLocation, String>>,
    failures_left: Cell<u32>,
    requests: Cell<u32>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a blob directly, bypassing failure injection
    pub fn insert(&self, location: &BlobLocation, content: &str) {
        self.blobs
            .borrow_mut()
            .insert(location.clone(), content.to_string());
    }

    pub fn get(&self, location: &BlobLocation) -> Option<String> {
        self.blobs.borrow().get(location).cloned()
    }

    /// Names of every stored blob, sorted by location
    pub fn names(&self) -> Vec<String> {
        self.blobs.borrow().keys().map(|l| l.name.clone()).collect()
    }

    /// Fail the next `count` requests with [`StoreError::Unavailable`]
    pub fn fail_next(&self, count: u32) {
        self.failures_left.set(count);
    }

    /// Number of download and upload requests received
    pub fn requests(&self) -> u32 {
        self.requests.get()
    }

    fn begin(&self, location: &BlobLocation) -> Result<(), StoreError> {
        self.requests.set(self.requests.get() + 1);
        let left = self.failures_left.get();
        if left > 0 {
            self.failures_left.set(left - 1);
            return Err(StoreError::Unavailable {
                location: location.clone(),
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

impl BlobStore for MemoryBlobStore {
    fn download_blob(&self, location: &BlobLocation) -> Result<String, StoreError> {
        self.begin(location)?;
        self.get(location)
            .ok_or_else(|| StoreError::NotFound(location.clone()))
    }

    fn upload_blob(&self, content: &str, location: &BlobLocation) -> Result<(), StoreError> {
        self.begin(location)?;
        self.insert(location, content);
        Ok(())
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
    fn test_injected_failures_are_transient() {
        let store = MemoryBlobStore::new();
        store.fail_next(1);
        let err = store.upload_blob("a: 1\n", &location()).unwrap_err();
        assert!(err.is_transient());
        store.upload_blob("a: 1\n", &location()).unwrap();
        assert_eq!(store.download_blob(&location()).unwrap(), "a: 1\n");
        assert_eq!(store.requests(), 3);
    }
}
