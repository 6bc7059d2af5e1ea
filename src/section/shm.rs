//! Safe Haven Management (SHM) settings shared by every SRE.

use super::{Section, apply_change};
use crate::context::Context;
use crate::diagnostic::Result;
use crate::field::{DictReader, DictWriter, Field};
use crate::reporter::Reporter;
use crate::types::{EmailAddress, Fqdn, Guid, IpAddress, NonEmptyString, TimeZone};

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSectionShm {
    pub admin_email_address: Field<EmailAddress>,
    pub admin_ip_addresses: Field<Vec<IpAddress>>,
    pub entra_tenant_id: Field<Guid>,
    pub fqdn: Field<Fqdn>,
    pub name: Field<NonEmptyString>,
    pub timezone: Field<TimeZone>,
}

#[derive(Debug, Clone, Default)]
pub struct ShmChanges {
    pub admin_email_address: Option<EmailAddress>,
    pub admin_ip_addresses: Option<Vec<IpAddress>>,
    pub entra_tenant_id: Option<Guid>,
    pub fqdn: Option<Fqdn>,
    pub timezone: Option<TimeZone>,
}

impl Default for ConfigSectionShm {
    fn default() -> Self {
        Self {
            admin_email_address: Field::required("admin_email_address"),
            admin_ip_addresses: Field::with_default("admin_ip_addresses", vec![]),
            entra_tenant_id: Field::required("entra_tenant_id"),
            fqdn: Field::required("fqdn"),
            name: Field::required("name"),
            timezone: Field::with_default("timezone", TimeZone::utc()),
        }
    }
}

impl ConfigSectionShm {
    pub fn from_context(context: &Context) -> Self {
        let mut section = Self::default();
        section.name.set(NonEmptyString::new_unchecked(context.shm_name()));
        section
    }

    pub fn update(&mut self, changes: ShmChanges, reporter: &dyn Reporter) -> Result<()> {
        apply_change(
            Self::KEY,
            &mut self.admin_email_address,
            changes.admin_email_address,
            reporter,
        )?;
        apply_change(
            Self::KEY,
            &mut self.admin_ip_addresses,
            changes.admin_ip_addresses,
            reporter,
        )?;
        apply_change(Self::KEY, &mut self.entra_tenant_id, changes.entra_tenant_id, reporter)?;
        apply_change(Self::KEY, &mut self.fqdn, changes.fqdn, reporter)?;
        apply_change(Self::KEY, &mut self.timezone, changes.timezone, reporter)
    }
}

impl Section for ConfigSectionShm {
    const KEY: &'static str = "shm";

    fn template() -> Self {
        let mut section = Self::default();
        section
            .admin_email_address
            .set_placeholder("Email address shared by all administrators");
        section
            .admin_ip_addresses
            .set_placeholder("List of IP addresses belonging to administrators");
        section
            .entra_tenant_id
            .set_placeholder("Tenant ID for the Entra ID used to manage SHM users");
        section
            .fqdn
            .set_placeholder("Domain that SHM users will belong to");
        section
            .name
            .set_placeholder("Short name for this Safe Haven Management deployment");
        section
            .timezone
            .set_placeholder("Timezone in IANA format (eg. Europe/London)");
        section
    }

    fn write(&self, out: &mut DictWriter) -> Result<()> {
        out.field(&self.admin_email_address)?;
        out.field(&self.admin_ip_addresses)?;
        out.field(&self.entra_tenant_id)?;
        out.field(&self.fqdn)?;
        out.field(&self.name)?;
        out.field(&self.timezone)
    }

    fn read(&mut self, input: &mut DictReader<'_>) -> Result<()> {
        input.field(&mut self.admin_email_address)?;
        input.field(&mut self.admin_ip_addresses)?;
        input.field(&mut self.entra_tenant_id)?;
        input.field(&mut self.fqdn)?;
        input.field(&mut self.name)?;
        input.field(&mut self.timezone)
    }
}
