//! Deployment contexts and the local context registry.
//!
//! A [`Context`] names one deployment target. Everything needed to locate the
//! deployment's remote configuration (resource group, storage account, key
//! vault, …) is derived from the context name, so the names can never drift
//! apart from the document they locate.

use crate::diagnostic::{Diagnostic, DiagnosticCode, Result};
use crate::field::parse_named;
use crate::naming::{alphanumeric, truncate};
use crate::types::{AzureLocation, Guid, NonEmptyString};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Environment variable overriding the local configuration directory
pub const CONFIG_DIRECTORY_ENV: &str = "DSH_CONFIG_DIRECTORY";

/// Registry file name inside the configuration directory
const REGISTRY_FILE_NAME: &str = "contexts.yaml";

const SUBSCRIPTION_NAME_MAX_LEN: usize = 80;
const STORAGE_ACCOUNT_NAME_CHARS: usize = 14;
const KEY_VAULT_NAME_CHARS: usize = 9;

/// Local configuration directory.
///
/// Precedence: `DSH_CONFIG_DIRECTORY` > platform config dir > working directory.
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(CONFIG_DIRECTORY_ENV) {
        return PathBuf::from(dir);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("data_safe_haven")
}

/// Sibling file the registry is written to before being renamed into place
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| REGISTRY_FILE_NAME.to_string());
    path.with_file_name(format!(".{name}.{}.tmp", std::process::id()))
}

fn write_synced(path: &Path, content: &str) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()
}

// =============================================================================
// Context
// =============================================================================

/// One deployment target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Context {
    admin_group_id: Guid,
    location: AzureLocation,
    name: NonEmptyString,
    subscription_name: NonEmptyString,
}

/// Operational fields of a context that may change after creation
#[derive(Debug, Clone, Default)]
pub struct ContextChanges {
    pub admin_group_id: Option<Guid>,
    pub location: Option<AzureLocation>,
    pub subscription_name: Option<NonEmptyString>,
}

impl Context {
    /// Build a context from raw strings, validating each one
    pub fn new(name: &str, admin_group_id: &str, location: &str, subscription_name: &str) -> Result<Self> {
        let subscription_name = parse_named("subscription_name", subscription_name)?;
        check_subscription_name(&subscription_name)?;
        let name = parse_named("name", name)?;
        check_name(&name)?;
        Ok(Self {
            admin_group_id: parse_named("admin_group_id", admin_group_id)?,
            location: parse_named("location", location)?,
            name,
            subscription_name,
        })
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn admin_group_id(&self) -> &Guid {
        &self.admin_group_id
    }

    pub fn location(&self) -> &AzureLocation {
        &self.location
    }

    pub fn subscription_name(&self) -> &str {
        self.subscription_name.as_str()
    }

    /// Apply the supplied operational changes; `name` is never changed
    pub fn update(&mut self, changes: ContextChanges) -> Result<()> {
        if let Some(subscription_name) = &changes.subscription_name {
            check_subscription_name(subscription_name)?;
        }
        if let Some(admin_group_id) = changes.admin_group_id {
            self.admin_group_id = admin_group_id;
        }
        if let Some(location) = changes.location {
            self.location = location;
        }
        if let Some(subscription_name) = changes.subscription_name {
            self.subscription_name = subscription_name;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        check_name(&self.name)?;
        check_subscription_name(&self.subscription_name)
    }

    // Derived names

    /// Filesystem- and URL-safe short name
    pub fn shm_name(&self) -> String {
        alphanumeric(self.name.as_str()).to_lowercase()
    }

    pub fn resource_group_name(&self) -> String {
        format!("shm-{}-rg-context", self.shm_name())
    }

    /// Storage account names are capped at 24 characters
    pub fn storage_account_name(&self) -> String {
        let shm_name = self.shm_name();
        format!("shm{}context", truncate(&shm_name, STORAGE_ACCOUNT_NAME_CHARS))
    }

    pub fn storage_container_name(&self) -> &'static str {
        "config"
    }

    /// Key vault names are capped at 24 characters
    pub fn key_vault_name(&self) -> String {
        let shm_name = self.shm_name();
        format!("shm-{}-kv-context", truncate(&shm_name, KEY_VAULT_NAME_CHARS))
    }

    pub fn managed_identity_name(&self) -> String {
        format!("shm-{}-identity-reader-context", self.shm_name())
    }

    pub fn pulumi_storage_container_name(&self) -> &'static str {
        "pulumi"
    }

    pub fn pulumi_encryption_key_name(&self) -> &'static str {
        "pulumi-encryption-key"
    }

    pub fn pulumi_backend_url(&self) -> String {
        format!("azblob://{}", self.pulumi_storage_container_name())
    }

    /// Local working directory for this context
    pub fn work_directory(&self) -> PathBuf {
        config_dir().join(self.shm_name())
    }

    /// Tags applied to every resource of the deployment
    pub fn tags(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("deployed by".to_string(), env!("CARGO_PKG_NAME").to_string()),
            ("deployment".to_string(), self.name().to_string()),
            ("project".to_string(), "Data Safe Haven".to_string()),
            ("version".to_string(), env!("CARGO_PKG_VERSION").to_string()),
        ])
    }
}

/// Every derived resource name is built from the alphanumerics of the name
fn check_name(name: &NonEmptyString) -> Result<()> {
    if alphanumeric(name.as_str()).is_empty() {
        return Err(Diagnostic::new(
            DiagnosticCode::E0106EmptyValue,
            format!(
                "Invalid value for field 'name': expected at least one letter or digit, found '{name}'"
            ),
            "name",
        ));
    }
    Ok(())
}

fn check_subscription_name(name: &NonEmptyString) -> Result<()> {
    let len = name.as_str().chars().count();
    if len > SUBSCRIPTION_NAME_MAX_LEN {
        return Err(Diagnostic::new(
            DiagnosticCode::E0113ValueTooLong,
            format!(
                "Invalid value for field 'subscription_name': expected at most {SUBSCRIPTION_NAME_MAX_LEN} characters, found {len}"
            ),
            "subscription_name",
        ));
    }
    Ok(())
}

// =============================================================================
// Registry
// =============================================================================

/// All known contexts plus the currently selected one
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextRegistry {
    selected: Option<String>,
    contexts: BTreeMap<String, Context>,
}

fn registry_invalid(reason: impl std::fmt::Display) -> Diagnostic {
    Diagnostic::new(
        DiagnosticCode::E0118RegistryInvalid,
        format!("Could not load context registry: {reason}"),
        "",
    )
}

impl ContextRegistry {
    /// Default registry location
    pub fn default_path() -> PathBuf {
        config_dir().join(REGISTRY_FILE_NAME)
    }

    /// Load the registry from a local file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Diagnostic::new(
                DiagnosticCode::E0202FileNotFound,
                format!(
                    "Could not find file {}. Add a context and write the registry to create it.",
                    path.display()
                ),
                path.display().to_string(),
            ));
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            Diagnostic::new(
                DiagnosticCode::E0207IoError,
                format!("Failed to read context registry: {e}"),
                path.display().to_string(),
            )
        })?;
        tracing::debug!(path = %path.display(), "loaded context registry");
        Self::from_yaml(&content).map_err(|d| {
            if d.subject.is_empty() {
                Diagnostic { subject: path.display().to_string(), ..d }
            } else {
                d
            }
        })
    }

    /// Parse a registry document
    pub fn from_yaml(text: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(text).map_err(|e| {
            Diagnostic::new(
                DiagnosticCode::E0203YamlParseError,
                format!("Could not parse context registry as YAML: {e}"),
                "",
            )
        })?;
        let map = value.as_mapping().ok_or_else(|| {
            Diagnostic::new(
                DiagnosticCode::E0204NotAMapping,
                "Unable to parse context registry as a mapping.",
                "",
            )
        })?;
        for key in ["selected", "contexts"] {
            if !map.contains_key(key) {
                return Err(registry_invalid(format_args!("missing key '{key}'")));
            }
        }

        let registry: ContextRegistry = serde_yaml::from_value(value).map_err(registry_invalid)?;
        for (key, context) in &registry.contexts {
            context.validate().map_err(|d| registry_invalid(format_args!("context '{key}': {}", d.message)))?;
        }
        if let Some(selected) = &registry.selected
            && !registry.contexts.contains_key(selected)
        {
            return Err(registry_invalid(format_args!(
                "selected context '{selected}' is not defined"
            )));
        }
        Ok(registry)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            Diagnostic::new(
                DiagnosticCode::E0203YamlParseError,
                format!("Could not serialise context registry: {e}"),
                "",
            )
        })
    }

    /// Persist every context, creating parent directories as needed
    pub fn write(&self, path: &Path) -> Result<()> {
        let io_error = |e: std::io::Error| {
            Diagnostic::new(
                DiagnosticCode::E0207IoError,
                format!("Failed to write context registry: {e}"),
                path.display().to_string(),
            )
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let staging = staging_path(path);
        write_synced(&staging, &self.to_yaml()?)
            .and_then(|()| std::fs::rename(&staging, path))
            .map_err(|e| {
                let _ = std::fs::remove_file(&staging);
                io_error(e)
            })?;
        tracing::debug!(path = %path.display(), contexts = self.contexts.len(), "wrote context registry");
        Ok(())
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Select a context by key, or clear the selection with `None`
    pub fn set_selected(&mut self, key: Option<&str>) -> Result<()> {
        match key {
            Some(key) if !self.contexts.contains_key(key) => Err(Diagnostic::new(
                DiagnosticCode::E0117ContextNotFound,
                format!("Context '{key}' is not defined."),
                key,
            )),
            _ => {
                self.selected = key.map(str::to_string);
                Ok(())
            }
        }
    }

    /// The selected context, if any
    pub fn context(&self) -> Option<&Context> {
        self.selected.as_ref().and_then(|key| self.contexts.get(key))
    }

    /// The selected context, or an error telling the operator to select one
    pub fn assert_context(&self) -> Result<&Context> {
        self.context().ok_or_else(|| {
            Diagnostic::new(DiagnosticCode::E0201NoContextSelected, "No context selected.", "")
        })
    }

    /// Keys of all contexts, sorted
    pub fn available(&self) -> Vec<&str> {
        self.contexts.keys().map(String::as_str).collect()
    }

    pub fn get(&self, key: &str) -> Option<&Context> {
        self.contexts.get(key)
    }

    /// Register a new context under its short name and return the key
    pub fn add(
        &mut self,
        name: &str,
        subscription_name: &str,
        admin_group_id: &str,
        location: &str,
    ) -> Result<String> {
        let context = Context::new(name, admin_group_id, location, subscription_name)?;
        let key = context.shm_name();
        if self.contexts.contains_key(&key) {
            return Err(Diagnostic::new(
                DiagnosticCode::E0116ContextExists,
                format!("A context with key '{key}' is already defined."),
                key,
            ));
        }
        self.contexts.insert(key.clone(), context);
        Ok(key)
    }

    /// Remove a context; removing the selected one clears the selection
    pub fn remove(&mut self, key: &str) -> Result<()> {
        if self.contexts.remove(key).is_none() {
            return Err(Diagnostic::new(
                DiagnosticCode::E0117ContextNotFound,
                format!("No context with key '{key}'."),
                key,
            ));
        }
        if self.selected.as_deref() == Some(key) {
            self.selected = None;
        }
        Ok(())
    }

    /// Update the selected context
    pub fn update(&mut self, changes: ContextChanges) -> Result<()> {
        let key = self.selected.clone().ok_or_else(|| {
            Diagnostic::new(DiagnosticCode::E0201NoContextSelected, "No context selected.", "")
        })?;
        match self.contexts.get_mut(&key) {
            Some(context) => context.update(changes),
            None => Err(Diagnostic::new(
                DiagnosticCode::E0117ContextNotFound,
                format!("Context '{key}' is not defined."),
                key,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acme() -> Context {
        Context::new(
            "Acme Deployment",
            "d5c5c439-1115-4cb6-ab50-b8e547b6c8dd",
            "uksouth",
            "Data Safe Haven Acme",
        )
        .unwrap()
    }

    #[test]
    fn test_derived_names() {
        let context = acme();
        assert_eq!(context.shm_name(), "acmedeployment");
        assert_eq!(context.resource_group_name(), "shm-acmedeployment-rg-context");
        assert_eq!(context.storage_account_name(), "shmacmedeploymentcontext");
        assert_eq!(context.key_vault_name(), "shm-acmedeplo-kv-context");
        assert_eq!(
            context.managed_identity_name(),
            "shm-acmedeployment-identity-reader-context"
        );
        assert_eq!(context.pulumi_backend_url(), "azblob://pulumi");
    }

    #[test]
    fn test_long_names_are_capped() {
        let context = Context::new(
            "very very very very very long name",
            "d5c5c439-1115-4cb6-ab50-b8e547b6c8dd",
            "uksouth",
            "Data Safe Haven Acme",
        )
        .unwrap();
        assert_eq!(context.storage_account_name(), "shmveryveryveryvecontext");
        assert!(context.storage_account_name().len() <= 24);
        assert!(context.key_vault_name().len() <= 24);
    }

    #[test]
    fn test_subscription_name_length() {
        let long = format!("{}long name", "very ".repeat(15));
        let err = Context::new("Acme", "d5c5c439-1115-4cb6-ab50-b8e547b6c8dd", "uksouth", &long)
            .unwrap_err();
        assert_eq!(err.code, DiagnosticCode::E0113ValueTooLong);
        assert!(err.message.contains("at most 80 characters"));
    }

    #[test]
    fn test_name_without_letters_or_digits_rejected() {
        let err = Context::new("!!!", "d5c5c439-1115-4cb6-ab50-b8e547b6c8dd", "uksouth", "Data Safe Haven")
            .unwrap_err();
        assert_eq!(err.code, DiagnosticCode::E0106EmptyValue);
        assert!(err.is_parameter_error());
        assert_eq!(err.subject, "name");
    }

    #[test]
    fn test_update_keeps_name() {
        let mut context = acme();
        context
            .update(ContextChanges {
                location: Some("ukwest".parse().unwrap()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(context.location().to_string(), "ukwest");
        assert_eq!(context.name(), "Acme Deployment");
        assert_eq!(context.subscription_name(), "Data Safe Haven Acme");
    }

    #[test]
    fn test_tags() {
        let tags = acme().tags();
        assert_eq!(tags["deployment"], "Acme Deployment");
        assert_eq!(tags["project"], "Data Safe Haven");
        assert_eq!(tags["version"], env!("CARGO_PKG_VERSION"));
    }
}
