//! Layered configuration model for Data Safe Haven deployments.
//!
//! A [`ContextRegistry`] on local disk names the deployment targets. Each
//! [`Context`] owns one remote [`Config`] document made of validated
//! sections (Azure, backend, Pulumi, SHM, tags, and one section per SRE).
//! Documents round-trip through YAML and live in a [`BlobStore`].
//!
//! Every fallible operation returns a [`Diagnostic`] whose
//! [`ErrorKind`] separates bad parameters, bad configuration and remote
//! store failures.

pub mod config;
pub mod context;
pub mod diagnostic;
pub mod field;
pub mod naming;
pub mod remote;
pub mod reporter;
pub mod section;
pub mod store;
pub mod types;

pub use config::Config;
pub use context::{Context, ContextChanges, ContextRegistry};
pub use diagnostic::{Diagnostic, DiagnosticCode, ErrorKind, Result};
pub use field::Field;
pub use remote::{Layout, RemoteDocument, sre_filename_from_name};
pub use reporter::{ConsoleReporter, RecordingReporter, Reporter, SilentReporter, TracingReporter};
pub use section::Section;
pub use store::{BlobLocation, BlobStore, LocalBlobStore, MemoryBlobStore, RetryPolicy, RetryingStore, StoreError};
