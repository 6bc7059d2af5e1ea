//! Pulumi state backend settings and the registry of deployed stacks.

use super::{Section, apply_change};
use crate::context::Context;
use crate::diagnostic::Result;
use crate::field::{DictReader, DictWriter, Field, parse_named};
use crate::reporter::Reporter;
use crate::types::{NonEmptyString, StackMap};

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSectionPulumi {
    pub encryption_key_name: Field<NonEmptyString>,
    pub encryption_key_version: Field<NonEmptyString>,
    pub stacks: Field<StackMap>,
    pub storage_container_name: Field<NonEmptyString>,
}

#[derive(Debug, Clone, Default)]
pub struct PulumiChanges {
    pub encryption_key_name: Option<NonEmptyString>,
    pub encryption_key_version: Option<NonEmptyString>,
    pub storage_container_name: Option<NonEmptyString>,
}

impl Default for ConfigSectionPulumi {
    fn default() -> Self {
        Self {
            encryption_key_name: Field::with_default(
                "encryption_key_name",
                NonEmptyString::new_unchecked("pulumi-encryption-key"),
            ),
            encryption_key_version: Field::optional("encryption_key_version"),
            stacks: Field::with_default("stacks", StackMap::default()),
            storage_container_name: Field::with_default(
                "storage_container_name",
                NonEmptyString::new_unchecked("pulumi"),
            ),
        }
    }
}

impl ConfigSectionPulumi {
    pub fn from_context(context: &Context) -> Self {
        let mut section = Self::default();
        section
            .encryption_key_name
            .set(NonEmptyString::new_unchecked(context.pulumi_encryption_key_name()));
        section
            .storage_container_name
            .set(NonEmptyString::new_unchecked(context.pulumi_storage_container_name()));
        section
    }

    pub fn update(&mut self, changes: PulumiChanges, reporter: &dyn Reporter) -> Result<()> {
        apply_change(
            Self::KEY,
            &mut self.encryption_key_name,
            changes.encryption_key_name,
            reporter,
        )?;
        apply_change(
            Self::KEY,
            &mut self.encryption_key_version,
            changes.encryption_key_version,
            reporter,
        )?;
        apply_change(
            Self::KEY,
            &mut self.storage_container_name,
            changes.storage_container_name,
            reporter,
        )
    }

    /// State location of a stack, if registered
    pub fn stack(&self, name: &str) -> Option<&str> {
        self.stacks.get().and_then(|stacks| stacks.get(name))
    }

    /// Register (or move) a stack; both name and path must be non-empty
    pub fn add_stack(&mut self, name: &str, path: &str) -> Result<()> {
        let name: NonEmptyString = parse_named("stack name", name)?;
        let path: NonEmptyString = parse_named("stack path", path)?;
        let mut stacks = self.stacks.get().cloned().unwrap_or_default();
        stacks.insert(name, path);
        self.stacks.set(stacks);
        Ok(())
    }

    /// Forget a stack. Removing an unknown stack is not an error.
    pub fn remove_stack(&mut self, name: &str) {
        let mut stacks = self.stacks.get().cloned().unwrap_or_default();
        if stacks.remove(name).is_some() {
            self.stacks.set(stacks);
        }
    }
}

impl Section for ConfigSectionPulumi {
    const KEY: &'static str = "pulumi";

    fn template() -> Self {
        let mut section = Self::default();
        section
            .encryption_key_name
            .set_placeholder("Name of the key vault key used to encrypt Pulumi secrets");
        section
            .encryption_key_version
            .set_placeholder("Version of the Pulumi encryption key");
        section
            .storage_container_name
            .set_placeholder("Name of the container holding Pulumi state");
        section
    }

    fn write(&self, out: &mut DictWriter) -> Result<()> {
        out.field(&self.encryption_key_name)?;
        out.field(&self.encryption_key_version)?;
        out.field(&self.stacks)?;
        out.field(&self.storage_container_name)
    }

    fn read(&mut self, input: &mut DictReader<'_>) -> Result<()> {
        input.field(&mut self.encryption_key_name)?;
        input.field(&mut self.encryption_key_version)?;
        input.field(&mut self.stacks)?;
        input.field(&mut self.storage_container_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::DiagnosticCode;

    #[test]
    fn test_defaults_validate() {
        let pulumi = ConfigSectionPulumi::default();
        assert!(pulumi.validate().is_ok());
        assert_eq!(
            pulumi.encryption_key_name.get().map(NonEmptyString::as_str),
            Some("pulumi-encryption-key")
        );
        assert!(pulumi.to_dict().unwrap().is_empty());
    }

    #[test]
    fn test_add_and_remove_stack() {
        let mut pulumi = ConfigSectionPulumi::default();
        pulumi.add_stack("sre1", "shm-acme-sre-sre1").unwrap();
        assert_eq!(pulumi.stack("sre1"), Some("shm-acme-sre-sre1"));

        pulumi.remove_stack("sre1");
        pulumi.remove_stack("sre1");
        assert_eq!(pulumi.stack("sre1"), None);
    }

    #[test]
    fn test_add_stack_rejects_empty_path() {
        let mut pulumi = ConfigSectionPulumi::default();
        let err = pulumi.add_stack("sre1", " ").unwrap_err();
        assert_eq!(err.code, DiagnosticCode::E0106EmptyValue);
        assert_eq!(pulumi.stack("sre1"), None);
    }
}
