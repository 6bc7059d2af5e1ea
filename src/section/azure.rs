//! Azure tenancy and subscription settings.

use super::{Section, apply_change};
use crate::context::Context;
use crate::diagnostic::Result;
use crate::field::{DictReader, DictWriter, Field};
use crate::reporter::Reporter;
use crate::types::{AzureLocation, Guid};

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSectionAzure {
    pub admin_group_id: Field<Guid>,
    pub location: Field<AzureLocation>,
    pub subscription_id: Field<Guid>,
    pub tenant_id: Field<Guid>,
}

/// Values to apply with [`ConfigSectionAzure::update`]; `None` leaves a field alone
#[derive(Debug, Clone, Default)]
pub struct AzureChanges {
    pub admin_group_id: Option<Guid>,
    pub location: Option<AzureLocation>,
    pub subscription_id: Option<Guid>,
    pub tenant_id: Option<Guid>,
}

impl Default for ConfigSectionAzure {
    fn default() -> Self {
        Self {
            admin_group_id: Field::required("admin_group_id"),
            location: Field::required("location"),
            subscription_id: Field::required("subscription_id"),
            tenant_id: Field::required("tenant_id"),
        }
    }
}

impl ConfigSectionAzure {
    /// New section seeded from the selected context
    pub fn from_context(context: &Context) -> Self {
        let mut section = Self::default();
        section.admin_group_id.set(*context.admin_group_id());
        section.location.set(context.location().clone());
        section
    }

    pub fn update(&mut self, changes: AzureChanges, reporter: &dyn Reporter) -> Result<()> {
        apply_change(Self::KEY, &mut self.admin_group_id, changes.admin_group_id, reporter)?;
        apply_change(Self::KEY, &mut self.location, changes.location, reporter)?;
        apply_change(Self::KEY, &mut self.subscription_id, changes.subscription_id, reporter)?;
        apply_change(Self::KEY, &mut self.tenant_id, changes.tenant_id, reporter)
    }
}

impl Section for ConfigSectionAzure {
    const KEY: &'static str = "azure";

    fn template() -> Self {
        let mut section = Self::default();
        section
            .admin_group_id
            .set_placeholder("ID of a security group that contains all Azure infrastructure admins");
        section
            .location
            .set_placeholder("Azure location where SRE resources will be deployed");
        section
            .subscription_id
            .set_placeholder("ID of the Azure subscription that the SRE will be deployed to");
        section
            .tenant_id
            .set_placeholder("Home tenant for the Azure account used to deploy infrastructure");
        section
    }

    fn write(&self, out: &mut DictWriter) -> Result<()> {
        out.field(&self.admin_group_id)?;
        out.field(&self.location)?;
        out.field(&self.subscription_id)?;
        out.field(&self.tenant_id)
    }

    fn read(&mut self, input: &mut DictReader<'_>) -> Result<()> {
        input.field(&mut self.admin_group_id)?;
        input.field(&mut self.location)?;
        input.field(&mut self.subscription_id)?;
        input.field(&mut self.tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::DiagnosticCode;
    use crate::reporter::RecordingReporter;

    const GUID: &str = "d5c5c439-1115-4cb6-ab50-b8e547b6c8dd";

    fn context() -> Context {
        Context::new("Acme Deployment", GUID, "uksouth", "Data Safe Haven Acme").unwrap()
    }

    #[test]
    fn test_from_context_seeds_defaults() {
        let azure = ConfigSectionAzure::from_context(&context());
        assert_eq!(azure.location.get().map(ToString::to_string).as_deref(), Some("uksouth"));
        assert!(azure.subscription_id.get().is_none());
        let err = azure.validate().unwrap_err();
        assert_eq!(err.code, DiagnosticCode::E0111FieldNotSet);
        assert_eq!(err.subject, "subscription_id");
    }

    #[test]
    fn test_update_applies_only_supplied_values() {
        let mut azure = ConfigSectionAzure::from_context(&context());
        let reporter = RecordingReporter::new();
        azure
            .update(
                AzureChanges {
                    subscription_id: Some(GUID.parse().unwrap()),
                    tenant_id: Some(GUID.parse().unwrap()),
                    ..Default::default()
                },
                &reporter,
            )
            .unwrap();
        assert!(azure.validate().is_ok());
        assert_eq!(reporter.reports().len(), 2);
        assert_eq!(reporter.value_of("azure", "tenant_id").as_deref(), Some(GUID));
        assert_eq!(azure.location.get().map(ToString::to_string).as_deref(), Some("uksouth"));
    }

    #[test]
    fn test_set_field_rejects_malformed_guid() {
        let mut azure = ConfigSectionAzure::default();
        let err = azure
            .set_field("tenant_id", &serde_yaml::Value::String("1234".into()))
            .unwrap_err();
        assert!(err.is_parameter_error());
        assert!(err.message.contains("GUID"));
        assert!(!azure.tenant_id.is_set());
    }
}
