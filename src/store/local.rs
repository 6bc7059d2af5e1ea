//! Blob store backed by a local directory tree.
//!
//! Blobs live at `<root>/<resource group>/<account>/<container>/<name>`.
//! Uploads take an exclusive per-blob lock, write a temporary file next to
//! the blob and rename it into place, so readers see either the old or the
//! new content.

use super::lock::acquire_blob_lock;
use super::{BlobLocation, BlobStore, StoreError};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long an upload waits for another writer of the same blob
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    lock_timeout: Duration,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn container_dir(&self, location: &BlobLocation) -> PathBuf {
        self.root
            .join(&location.resource_group)
            .join(&location.storage_account)
            .join(&location.container)
    }

    /// Path of the file holding `location`
    pub fn blob_path(&self, location: &BlobLocation) -> PathBuf {
        self.container_dir(location).join(&location.name)
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl BlobStore for LocalBlobStore {
    fn download_blob(&self, location: &BlobLocation) -> Result<String, StoreError> {
        let path = self.blob_path(location);
        tracing::debug!(path = %path.display(), "reading blob");
        match fs::read_to_string(&path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(location.clone()))
            }
            Err(e) => Err(io_error(&path)(e)),
        }
    }

    fn upload_blob(&self, content: &str, location: &BlobLocation) -> Result<(), StoreError> {
        let dir = self.container_dir(location);
        fs::create_dir_all(&dir).map_err(io_error(&dir))?;
        let _guard = acquire_blob_lock(&dir, location, self.lock_timeout)?;

        let path = dir.join(&location.name);
        let staging = dir.join(format!(".{}.{}.tmp", location.name, std::process::id()));
        tracing::debug!(path = %path.display(), bytes = content.len(), "writing blob");

        let written = fs::File::create(&staging)
            .and_then(|mut file| {
                file.write_all(content.as_bytes())?;
                file.sync_all()
            })
            .map_err(io_error(&staging))
            .and_then(|()| fs::rename(&staging, &path).map_err(io_error(&path)));
        if written.is_err() {
            let _ = fs::remove_file(&staging);
        }
        written
    }
}
