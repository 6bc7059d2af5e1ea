//! Binding configuration documents to remote blobs.
//!
//! [`Layout`] is the single place that decides blob names. Loading
//! distinguishes a blob that does not exist (an empty document bound to that
//! name) from one that exists but cannot be decoded (an error).

use crate::config::Config;
use crate::context::Context;
use crate::diagnostic::{Diagnostic, DiagnosticCode, Result};
use crate::naming::sanitise_sre_name;
use crate::store::{BlobLocation, BlobStore, StoreError};

/// How documents of one context are split across blobs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Layout {
    /// Everything in `config-<shm name>.yaml`
    #[default]
    Combined,
    /// SHM-level sections in `shm.yaml`, each SRE in `sre-<name>.yaml`
    Split,
}

impl Layout {
    /// Blob holding the context-level document
    pub fn config_filename(&self, context: &Context) -> String {
        match self {
            Layout::Combined => format!("config-{}.yaml", context.shm_name()),
            Layout::Split => "shm.yaml".to_string(),
        }
    }

    /// Blob holding the document of one SRE
    pub fn sre_filename(&self, context: &Context, sre_name: &str) -> String {
        match self {
            Layout::Combined => self.config_filename(context),
            Layout::Split => sre_filename_from_name(sre_name),
        }
    }
}

/// `sre-<sanitised name>.yaml`
pub fn sre_filename_from_name(name: &str) -> String {
    format!("sre-{}.yaml", sanitise_sre_name(name))
}

/// Result of looking up a remote document
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteDocument {
    Absent,
    Loaded(Config),
}

impl RemoteDocument {
    /// The loaded document, or an empty one bound to `filename`
    pub fn or_empty(self, context: &Context, filename: &str) -> Config {
        match self {
            RemoteDocument::Loaded(config) => config,
            RemoteDocument::Absent => {
                let mut config = Config::for_context(context);
                config.blob_name = Some(filename.to_string());
                config
            }
        }
    }
}

impl Config {
    /// Fetch and decode one blob of `context`'s configuration container.
    ///
    /// A missing blob is [`RemoteDocument::Absent`]; a blob that cannot be
    /// decoded is an error naming the blob.
    pub fn load_remote(
        store: &dyn BlobStore,
        context: &Context,
        filename: &str,
    ) -> Result<RemoteDocument> {
        let location = BlobLocation::for_context(context, filename);
        let text = match store.download_blob(&location) {
            Ok(text) => text,
            Err(StoreError::NotFound(_)) => {
                tracing::debug!(blob = %location, "no remote document");
                return Ok(RemoteDocument::Absent);
            }
            Err(e) => return Err(e.into()),
        };

        let mut config = Config::from_yaml(&text).map_err(|d| Diagnostic {
            message: format!("Remote document '{filename}' could not be decoded: {}", d.message),
            ..d
        })?;
        config.context = Some(context.clone());
        config.blob_name = Some(filename.to_string());
        tracing::debug!(blob = %location, sres = config.sre_names().count(), "loaded remote document");
        Ok(RemoteDocument::Loaded(config))
    }

    /// The context-level document under the default layout
    pub fn from_remote(store: &dyn BlobStore, context: &Context) -> Result<Config> {
        Self::from_remote_with_layout(store, context, Layout::default())
    }

    pub fn from_remote_with_layout(
        store: &dyn BlobStore,
        context: &Context,
        layout: Layout,
    ) -> Result<Config> {
        Self::from_remote_named(store, context, &layout.config_filename(context))
    }

    /// The document stored in `filename`, or an empty one bound to it
    pub fn from_remote_named(store: &dyn BlobStore, context: &Context, filename: &str) -> Result<Config> {
        Ok(Self::load_remote(store, context, filename)?.or_empty(context, filename))
    }

    /// The split-layout document of one SRE
    pub fn sre_from_remote(store: &dyn BlobStore, context: &Context, sre_name: &str) -> Result<Config> {
        Self::from_remote_named(store, context, &sre_filename_from_name(sre_name))
    }

    /// Serialize and overwrite the bound blob (last writer wins).
    ///
    /// Unbound documents go to the default layout's blob. Templates are
    /// refused.
    pub fn upload(&self, store: &dyn BlobStore, context: &Context) -> Result<()> {
        if self.is_template() {
            return Err(Diagnostic::new(
                DiagnosticCode::E0206TemplateDocument,
                "Template documents cannot be uploaded; fill in every field first",
                self.blob_name().unwrap_or_default(),
            ));
        }
        let filename = self
            .blob_name()
            .map(str::to_string)
            .unwrap_or_else(|| Layout::default().config_filename(context));
        let yaml = self.to_yaml()?;
        let location = BlobLocation::for_context(context, &filename);
        store.upload_blob(&yaml, &location)?;
        tracing::debug!(blob = %location, "uploaded document");
        Ok(())
    }
}
