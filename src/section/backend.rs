//! Names of the context-level resources that hold configuration and state.

use super::{Section, apply_change};
use crate::context::Context;
use crate::diagnostic::Result;
use crate::field::{DictReader, DictWriter, Field};
use crate::reporter::Reporter;
use crate::types::NonEmptyString;

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSectionBackend {
    pub key_vault_name: Field<NonEmptyString>,
    pub managed_identity_name: Field<NonEmptyString>,
    pub resource_group_name: Field<NonEmptyString>,
    pub storage_account_name: Field<NonEmptyString>,
    pub storage_container_name: Field<NonEmptyString>,
}

#[derive(Debug, Clone, Default)]
pub struct BackendChanges {
    pub key_vault_name: Option<NonEmptyString>,
    pub managed_identity_name: Option<NonEmptyString>,
    pub resource_group_name: Option<NonEmptyString>,
    pub storage_account_name: Option<NonEmptyString>,
    pub storage_container_name: Option<NonEmptyString>,
}

impl Default for ConfigSectionBackend {
    fn default() -> Self {
        Self {
            key_vault_name: Field::required("key_vault_name"),
            managed_identity_name: Field::required("managed_identity_name"),
            resource_group_name: Field::required("resource_group_name"),
            storage_account_name: Field::required("storage_account_name"),
            storage_container_name: Field::required("storage_container_name"),
        }
    }
}

impl ConfigSectionBackend {
    /// Every backend name is derived from the context
    pub fn from_context(context: &Context) -> Self {
        // Derived names always carry the "shm" prefix
        let mut section = Self::default();
        section.key_vault_name.set(NonEmptyString::new_unchecked(context.key_vault_name()));
        section
            .managed_identity_name
            .set(NonEmptyString::new_unchecked(context.managed_identity_name()));
        section
            .resource_group_name
            .set(NonEmptyString::new_unchecked(context.resource_group_name()));
        section
            .storage_account_name
            .set(NonEmptyString::new_unchecked(context.storage_account_name()));
        section
            .storage_container_name
            .set(NonEmptyString::new_unchecked(context.storage_container_name()));
        section
    }

    pub fn update(&mut self, changes: BackendChanges, reporter: &dyn Reporter) -> Result<()> {
        apply_change(Self::KEY, &mut self.key_vault_name, changes.key_vault_name, reporter)?;
        apply_change(
            Self::KEY,
            &mut self.managed_identity_name,
            changes.managed_identity_name,
            reporter,
        )?;
        apply_change(
            Self::KEY,
            &mut self.resource_group_name,
            changes.resource_group_name,
            reporter,
        )?;
        apply_change(
            Self::KEY,
            &mut self.storage_account_name,
            changes.storage_account_name,
            reporter,
        )?;
        apply_change(
            Self::KEY,
            &mut self.storage_container_name,
            changes.storage_container_name,
            reporter,
        )
    }
}

impl Section for ConfigSectionBackend {
    const KEY: &'static str = "backend";

    fn template() -> Self {
        let mut section = Self::default();
        section.key_vault_name.set_placeholder("Name of the context key vault");
        section
            .managed_identity_name
            .set_placeholder("Name of the identity used to read configuration");
        section
            .resource_group_name
            .set_placeholder("Name of the context resource group");
        section
            .storage_account_name
            .set_placeholder("Name of the context storage account");
        section
            .storage_container_name
            .set_placeholder("Name of the container holding configuration documents");
        section
    }

    fn write(&self, out: &mut DictWriter) -> Result<()> {
        out.field(&self.key_vault_name)?;
        out.field(&self.managed_identity_name)?;
        out.field(&self.resource_group_name)?;
        out.field(&self.storage_account_name)?;
        out.field(&self.storage_container_name)
    }

    fn read(&mut self, input: &mut DictReader<'_>) -> Result<()> {
        input.field(&mut self.key_vault_name)?;
        input.field(&mut self.managed_identity_name)?;
        input.field(&mut self.resource_group_name)?;
        input.field(&mut self.storage_account_name)?;
        input.field(&mut self.storage_container_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_context_is_complete() {
        let context = Context::new(
            "Acme Deployment",
            "d5c5c439-1115-4cb6-ab50-b8e547b6c8dd",
            "uksouth",
            "Data Safe Haven Acme",
        )
        .unwrap();
        let backend = ConfigSectionBackend::from_context(&context);
        assert!(backend.validate().is_ok());
        assert_eq!(
            backend.storage_account_name.get().map(|v| v.as_str()),
            Some("shmacmedeploymentcontext")
        );
        assert_eq!(backend.storage_container_name.get().map(|v| v.as_str()), Some("config"));
    }

    #[test]
    fn test_default_requires_every_name() {
        let err = ConfigSectionBackend::default().validate().unwrap_err();
        assert_eq!(err.subject, "key_vault_name");
    }
}
