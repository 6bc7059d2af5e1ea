//! Blob storage for configuration documents.
//!
//! A [`BlobStore`] moves whole documents to and from named blobs. The
//! document model never sees transport errors: stores return
//! [`StoreError`], which converts into a remote-store [`Diagnostic`].

mod local;
mod lock;
mod memory;
mod retry;

pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;
pub use retry::{RetryPolicy, RetryingStore};

use crate::context::Context;
use crate::diagnostic::{Diagnostic, DiagnosticCode};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Where a blob lives: account, container and name within a resource group
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlobLocation {
    pub resource_group: String,
    pub storage_account: String,
    pub container: String,
    pub name: String,
}

impl BlobLocation {
    /// The blob `name` in the configuration container of `context`
    pub fn for_context(context: &Context, name: &str) -> Self {
        Self {
            resource_group: context.resource_group_name(),
            storage_account: context.storage_account_name(),
            container: context.storage_container_name().to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for BlobLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.storage_account, self.container, self.name)
    }
}

/// Failure of a blob operation
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("blob '{0}' does not exist")]
    NotFound(BlobLocation),

    /// The store could not be reached or was busy; retrying may succeed
    #[error("storage for '{location}' is unavailable: {reason}")]
    Unavailable {
        location: BlobLocation,
        reason: String,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Whether a retry may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. })
    }
}

impl From<StoreError> for Diagnostic {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::NotFound(location) => Diagnostic::new(
                DiagnosticCode::E0303BlobNotFound,
                err.to_string(),
                location.name.clone(),
            ),
            StoreError::Unavailable { location, .. } => Diagnostic::new(
                DiagnosticCode::E0301StoreUnavailable,
                err.to_string(),
                location.name.clone(),
            ),
            StoreError::Io { path, .. } => Diagnostic::new(
                DiagnosticCode::E0302StoreIo,
                err.to_string(),
                path.display().to_string(),
            ),
        }
    }
}

/// Whole-document storage keyed by [`BlobLocation`]
pub trait BlobStore {
    /// Text of an existing blob; [`StoreError::NotFound`] if there is none
    fn download_blob(&self, location: &BlobLocation) -> Result<String, StoreError>;

    /// Create or overwrite a blob
    fn upload_blob(&self, content: &str, location: &BlobLocation) -> Result<(), StoreError>;
}

impl<S: BlobStore + ?Sized> BlobStore for &S {
    fn download_blob(&self, location: &BlobLocation) -> Result<String, StoreError> {
        (**self).download_blob(location)
    }

    fn upload_blob(&self, content: &str, location: &BlobLocation) -> Result<(), StoreError> {
        (**self).upload_blob(content, location)
    }
}
