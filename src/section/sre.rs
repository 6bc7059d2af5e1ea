//! Secure Research Environment (SRE) settings.
//!
//! One section exists per SRE. The SRE `index` is assigned by the owning
//! [`Config`](crate::config::Config) and is what keeps per-SRE address
//! ranges apart, so it is never changed through `update`.

use super::{Section, apply_change, read_nested, write_nested};
use crate::diagnostic::{Diagnostic, DiagnosticCode, Result};
use crate::field::{DictReader, DictWriter, Field};
use crate::reporter::Reporter;
use crate::types::{
    AzureVmSku, DatabaseSystem, IpAddress, SoftwarePackageCategory, SreIndex, UniqueList,
    value_text,
};
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// Remote desktop
// =============================================================================

/// Clipboard rules for the remote desktop gateway
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSubsectionRemoteDesktopOpts {
    pub allow_copy: Field<bool>,
    pub allow_paste: Field<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct RemoteDesktopChanges {
    pub allow_copy: Option<bool>,
    pub allow_paste: Option<bool>,
}

impl Default for ConfigSubsectionRemoteDesktopOpts {
    fn default() -> Self {
        Self {
            allow_copy: Field::with_default("allow_copy", false),
            allow_paste: Field::with_default("allow_paste", false),
        }
    }
}

impl ConfigSubsectionRemoteDesktopOpts {
    pub fn update(&mut self, changes: RemoteDesktopChanges, reporter: &dyn Reporter) -> Result<()> {
        apply_change(Self::KEY, &mut self.allow_copy, changes.allow_copy, reporter)?;
        apply_change(Self::KEY, &mut self.allow_paste, changes.allow_paste, reporter)
    }
}

impl Section for ConfigSubsectionRemoteDesktopOpts {
    const KEY: &'static str = "remote_desktop";

    fn template() -> Self {
        let mut section = Self::default();
        section
            .allow_copy
            .set_placeholder("True/False: whether to allow copying text out of the environment");
        section
            .allow_paste
            .set_placeholder("True/False: whether to allow pasting text into the environment");
        section
    }

    fn write(&self, out: &mut DictWriter) -> Result<()> {
        out.field(&self.allow_copy)?;
        out.field(&self.allow_paste)
    }

    fn read(&mut self, input: &mut DictReader<'_>) -> Result<()> {
        input.field(&mut self.allow_copy)?;
        input.field(&mut self.allow_paste)
    }
}

// =============================================================================
// Research desktops
// =============================================================================

/// One research desktop VM
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSubsectionResearchDesktopOpts {
    pub sku: Field<AzureVmSku>,
}

impl Default for ConfigSubsectionResearchDesktopOpts {
    fn default() -> Self {
        Self {
            sku: Field::required("sku"),
        }
    }
}

impl ConfigSubsectionResearchDesktopOpts {
    pub fn new(sku: AzureVmSku) -> Self {
        let mut desktop = Self::default();
        desktop.sku.set(sku);
        desktop
    }
}

impl Section for ConfigSubsectionResearchDesktopOpts {
    const KEY: &'static str = "research_desktops";

    fn template() -> Self {
        let mut desktop = Self::default();
        desktop
            .sku
            .set_placeholder("Azure VM SKU - see cloudprice.net for list of valid SKUs");
        desktop
    }

    fn write(&self, out: &mut DictWriter) -> Result<()> {
        out.field(&self.sku)
    }

    fn read(&mut self, input: &mut DictReader<'_>) -> Result<()> {
        input.field(&mut self.sku)
    }
}

fn workspace_key(idx: usize) -> String {
    format!("workspace-{idx:02}")
}

// =============================================================================
// SRE section
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSectionSre {
    pub data_provider_ip_addresses: Field<Vec<IpAddress>>,
    pub databases: Field<UniqueList<DatabaseSystem>>,
    pub index: Field<SreIndex>,
    pub remote_desktop: ConfigSubsectionRemoteDesktopOpts,
    research_desktops: BTreeMap<String, ConfigSubsectionResearchDesktopOpts>,
    pub research_user_ip_addresses: Field<Vec<IpAddress>>,
    pub software_packages: Field<SoftwarePackageCategory>,
}

/// Values to apply with [`ConfigSectionSre::update`]
#[derive(Debug, Clone, Default)]
pub struct SreChanges {
    pub allow_copy: Option<bool>,
    pub allow_paste: Option<bool>,
    pub data_provider_ip_addresses: Option<Vec<IpAddress>>,
    /// Duplicates are dropped with a warning
    pub databases: Option<Vec<DatabaseSystem>>,
    pub research_user_ip_addresses: Option<Vec<IpAddress>>,
    pub software_packages: Option<SoftwarePackageCategory>,
    pub workspace_skus: Option<Vec<AzureVmSku>>,
}

impl Default for ConfigSectionSre {
    fn default() -> Self {
        Self {
            data_provider_ip_addresses: Field::with_default("data_provider_ip_addresses", vec![]),
            databases: Field::with_default("databases", UniqueList::default()),
            index: Field::required("index"),
            remote_desktop: ConfigSubsectionRemoteDesktopOpts::default(),
            research_desktops: BTreeMap::new(),
            research_user_ip_addresses: Field::with_default("research_user_ip_addresses", vec![]),
            software_packages: Field::with_default(
                "software_packages",
                SoftwarePackageCategory::default(),
            ),
        }
    }
}

impl ConfigSectionSre {
    /// Empty SRE holding the given index
    pub fn with_index(index: SreIndex) -> Self {
        let mut section = Self::default();
        section.index.set(index);
        section
    }

    pub fn research_desktops(&self) -> &BTreeMap<String, ConfigSubsectionResearchDesktopOpts> {
        &self.research_desktops
    }

    /// SKUs of every research desktop, in desktop-key order
    pub fn workspace_skus(&self) -> Vec<AzureVmSku> {
        self.research_desktops
            .values()
            .filter_map(|desktop| desktop.sku.get().cloned())
            .collect()
    }

    /// Replace the research desktops with one per SKU.
    ///
    /// Desktops are keyed `workspace-00`, `workspace-01`, ... in input order.
    /// Nothing changes when the requested SKUs match the current ones as a
    /// set, so existing keys stay stable. Returns whether anything changed.
    pub fn set_research_desktops(&mut self, skus: &[AzureVmSku]) -> bool {
        let requested: BTreeSet<&AzureVmSku> = skus.iter().collect();
        let current = self.workspace_skus();
        let current: BTreeSet<&AzureVmSku> = current.iter().collect();
        let all_set = self.research_desktops.values().all(|d| d.sku.is_set());
        if all_set && requested == current {
            return false;
        }
        self.research_desktops = skus
            .iter()
            .enumerate()
            .map(|(idx, sku)| {
                (
                    workspace_key(idx),
                    ConfigSubsectionResearchDesktopOpts::new(sku.clone()),
                )
            })
            .collect();
        true
    }

    pub fn update(&mut self, changes: SreChanges, reporter: &dyn Reporter) -> Result<()> {
        self.remote_desktop.update(
            RemoteDesktopChanges {
                allow_copy: changes.allow_copy,
                allow_paste: changes.allow_paste,
            },
            reporter,
        )?;
        apply_change(
            Self::KEY,
            &mut self.data_provider_ip_addresses,
            changes.data_provider_ip_addresses,
            reporter,
        )?;
        if let Some(requested) = changes.databases {
            let databases = dedup_databases(requested, reporter);
            apply_change(Self::KEY, &mut self.databases, Some(databases), reporter)?;
        }
        apply_change(
            Self::KEY,
            &mut self.research_user_ip_addresses,
            changes.research_user_ip_addresses,
            reporter,
        )?;
        apply_change(
            Self::KEY,
            &mut self.software_packages,
            changes.software_packages,
            reporter,
        )?;
        if let Some(skus) = changes.workspace_skus {
            self.set_research_desktops(&skus);
            let described: Vec<String> = self.workspace_skus().iter().map(ToString::to_string).collect();
            reporter.field_updated(Self::KEY, "workspace_skus", &format!("[{}]", described.join(", ")));
        }
        Ok(())
    }
}

fn dedup_databases(requested: Vec<DatabaseSystem>, reporter: &dyn Reporter) -> UniqueList<DatabaseSystem> {
    let total = requested.len();
    let mut unique: Vec<DatabaseSystem> = Vec::with_capacity(total);
    for db in requested {
        if !unique.contains(&db) {
            unique.push(db);
        }
    }
    if unique.len() < total {
        reporter.warning(&format!(
            "[{}] {} duplicate database entries were discarded",
            DiagnosticCode::W0101DuplicatesDiscarded.code(),
            total - unique.len()
        ));
    }
    // Items are pairwise distinct at this point
    UniqueList::new(unique).unwrap_or_default()
}

impl Section for ConfigSectionSre {
    const KEY: &'static str = "sre";

    fn template() -> Self {
        let mut section = Self::default();
        section
            .data_provider_ip_addresses
            .set_placeholder("List of IP addresses belonging to data providers");
        section
            .databases
            .set_placeholder("List of database systems to deploy");
        section
            .index
            .set_placeholder("Positive integer unique to this SRE");
        section.remote_desktop = ConfigSubsectionRemoteDesktopOpts::template();
        section
            .research_desktops
            .insert(workspace_key(0), ConfigSubsectionResearchDesktopOpts::template());
        section
            .research_user_ip_addresses
            .set_placeholder("List of IP addresses belonging to users");
        section.software_packages.set_placeholder(
            "Which Python/R packages to allow users to install: [any/pre-approved/none]",
        );
        section
    }

    fn write(&self, out: &mut DictWriter) -> Result<()> {
        out.field(&self.data_provider_ip_addresses)?;
        out.field(&self.databases)?;
        out.field(&self.index)?;
        write_nested(out, ConfigSubsectionRemoteDesktopOpts::KEY, &self.remote_desktop)?;

        let mut desktops = Mapping::new();
        for (key, desktop) in &self.research_desktops {
            let mut nested = out.child();
            desktop
                .write(&mut nested)
                .map_err(|d| d.within(key).within(ConfigSubsectionResearchDesktopOpts::KEY))?;
            desktops.insert(Value::String(key.clone()), Value::Mapping(nested.finish()));
        }
        out.nested(ConfigSubsectionResearchDesktopOpts::KEY, desktops);

        out.field(&self.research_user_ip_addresses)?;
        out.field(&self.software_packages)
    }

    fn read(&mut self, input: &mut DictReader<'_>) -> Result<()> {
        input.field(&mut self.data_provider_ip_addresses)?;
        input.field(&mut self.databases)?;
        input.field(&mut self.index)?;
        read_nested(input, ConfigSubsectionRemoteDesktopOpts::KEY, &mut self.remote_desktop)?;

        let key = ConfigSubsectionResearchDesktopOpts::KEY;
        if let Some(raw) = input.nested(key) {
            let map = DictReader::mapping(raw, key).map_err(|d| d.within(key))?;
            let mut desktops = BTreeMap::new();
            for (name, raw_desktop) in map {
                let name = name.as_str().ok_or_else(|| {
                    Diagnostic::new(
                        DiagnosticCode::E0114InvalidType,
                        format!("Research desktop names must be strings, found '{}'", value_text(name)),
                        key,
                    )
                })?;
                let desktop = DictReader::mapping(raw_desktop, name)
                    .and_then(ConfigSubsectionResearchDesktopOpts::from_dict)
                    .map_err(|d| d.within(name).within(key))?;
                desktops.insert(name.to_string(), desktop);
            }
            self.research_desktops = desktops;
        }

        input.field(&mut self.research_user_ip_addresses)?;
        input.field(&mut self.software_packages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::RecordingReporter;

    fn sku(name: &str) -> AzureVmSku {
        name.parse().unwrap()
    }

    fn sre() -> ConfigSectionSre {
        ConfigSectionSre::with_index(SreIndex::new(1).unwrap())
    }

    // ==========================================================================
    // Research desktops
    // ==========================================================================

    #[test]
    fn test_research_desktops_keyed_in_order() {
        let mut sre = sre();
        assert!(sre.set_research_desktops(&[sku("Standard_D2s_v3"), sku("Standard_D8s_v3")]));
        let keys: Vec<&str> = sre.research_desktops().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["workspace-00", "workspace-01"]);
        assert_eq!(sre.workspace_skus(), vec![sku("Standard_D2s_v3"), sku("Standard_D8s_v3")]);
    }

    #[test]
    fn test_research_desktops_unchanged_for_same_set() {
        let mut sre = sre();
        sre.set_research_desktops(&[sku("Standard_D2s_v3"), sku("Standard_D8s_v3")]);
        let before = sre.clone();
        assert!(!sre.set_research_desktops(&[sku("Standard_D8s_v3"), sku("Standard_D2s_v3")]));
        assert_eq!(sre, before);
    }

    #[test]
    fn test_research_desktops_rebuilt_when_set_differs() {
        let mut sre = sre();
        sre.set_research_desktops(&[sku("Standard_D2s_v3")]);
        assert!(sre.set_research_desktops(&[sku("Standard_NC6s_v3")]));
        assert_eq!(sre.workspace_skus(), vec![sku("Standard_NC6s_v3")]);
    }

    // ==========================================================================
    // Update
    // ==========================================================================

    #[test]
    fn test_update_discards_duplicate_databases() {
        let mut sre = sre();
        let reporter = RecordingReporter::new();
        sre.update(
            SreChanges {
                databases: Some(vec![
                    DatabaseSystem::Postgresql,
                    DatabaseSystem::Postgresql,
                    DatabaseSystem::MicrosoftSqlServer,
                ]),
                ..Default::default()
            },
            &reporter,
        )
        .unwrap();
        let databases = sre.databases.get().unwrap();
        assert_eq!(
            databases.items(),
            &[DatabaseSystem::Postgresql, DatabaseSystem::MicrosoftSqlServer]
        );
        assert_eq!(reporter.warnings().len(), 1);
        assert!(reporter.warnings()[0].contains("W0101"));
    }

    #[test]
    fn test_update_applies_false_values() {
        let mut sre = sre();
        sre.remote_desktop.allow_copy.set(true);
        let reporter = RecordingReporter::new();
        sre.update(
            SreChanges {
                allow_copy: Some(false),
                ..Default::default()
            },
            &reporter,
        )
        .unwrap();
        assert_eq!(sre.remote_desktop.allow_copy.get(), Some(&false));
        assert!(sre.remote_desktop.allow_copy.is_set());
        assert_eq!(
            reporter.value_of("remote_desktop", "allow_copy").as_deref(),
            Some("forbidden")
        );
    }

    #[test]
    fn test_update_reports_workspace_skus() {
        let mut sre = sre();
        let reporter = RecordingReporter::new();
        sre.update(
            SreChanges {
                workspace_skus: Some(vec![sku("Standard_D2s_v3")]),
                ..Default::default()
            },
            &reporter,
        )
        .unwrap();
        assert_eq!(
            reporter.value_of("sre", "workspace_skus").as_deref(),
            Some("[Standard_D2s_v3]")
        );
    }

    // ==========================================================================
    // Dictionaries
    // ==========================================================================

    #[test]
    fn test_dict_round_trip_with_subsections() {
        let mut sre = sre();
        sre.set_research_desktops(&[sku("Standard_D2s_v3")]);
        sre.remote_desktop.allow_paste.set(true);
        let map = sre.to_dict().unwrap();
        assert!(map.contains_key("remote_desktop"));
        assert!(map.contains_key("research_desktops"));
        assert_eq!(ConfigSectionSre::from_dict(&map).unwrap(), sre);
    }

    #[test]
    fn test_invalid_desktop_sku_names_path() {
        let map = serde_yaml::from_str(
            "index: 1\nresearch_desktops:\n  workspace-00:\n    sku: large\n",
        )
        .unwrap();
        let err = ConfigSectionSre::from_dict(&map).unwrap_err();
        assert_eq!(err.code, DiagnosticCode::E0109InvalidVmSku);
        assert_eq!(err.subject, "research_desktops.workspace-00.sku");
    }

    #[test]
    fn test_template_fails_validation() {
        let template = ConfigSectionSre::template();
        assert!(template.validate().is_err());
        let map = template.to_dict_unchecked().unwrap();
        assert_eq!(
            map.get("index"),
            Some(&Value::String("Positive integer unique to this SRE".into()))
        );
    }
}
