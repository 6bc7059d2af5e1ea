//! Config document tests - completeness, round-trips, updates and SRE indices.

mod common;

use common::{acme, complete_config, config_with_sre};
use dsh_config::section::{
    AzureChanges, ConfigSectionSre, Section, ShmChanges, SreChanges, TagsChanges,
};
use dsh_config::types::{AzureVmSku, DatabaseSystem};
use dsh_config::{Config, DiagnosticCode, RecordingReporter, SilentReporter};

fn sku(name: &str) -> AzureVmSku {
    name.parse().unwrap()
}

// =============================================================================
// Completeness
// =============================================================================

/// Test: a fresh document is incomplete until every required section is valid
#[test]
fn test_is_complete_requires_every_section() {
    let context = acme();
    let mut config = Config::for_context(&context);
    assert!(!config.is_complete(false));

    config.backend_mut();
    config.pulumi_mut();
    config.tags_mut();
    assert!(!config.is_complete(false), "azure and shm still missing");

    config = complete_config(&context);
    assert!(config.is_complete(false));
}

/// Test: a present but invalid section keeps the document incomplete
#[test]
fn test_is_complete_false_with_unset_required_field() {
    let context = acme();
    let mut config = Config::for_context(&context);
    config.azure_mut();
    config.backend_mut();
    config.pulumi_mut();
    config.shm_mut();
    config.tags_mut();
    assert!(!config.is_complete(false));
}

/// Test: requiring SREs needs at least one valid SRE
#[test]
fn test_is_complete_with_required_sres() {
    let context = acme();
    let config = complete_config(&context);
    assert!(!config.is_complete(true));

    let config = config_with_sre(&context, "sre1");
    assert!(config.is_complete(true));
}

/// Test: templates are never complete
#[test]
fn test_template_never_complete() {
    assert!(!Config::template().is_complete(false));
    assert!(!Config::template().is_complete(true));
}

// =============================================================================
// Round-trips
// =============================================================================

/// Test: decode(encode(doc)) == doc for a complete document
#[test]
fn test_yaml_round_trip_complete_document() {
    let context = acme();
    let mut config = config_with_sre(&context, "sre1");
    config.add_stack("shm-acmedeployment", "azblob://pulumi/shm").unwrap();
    config
        .sre_mut("sre1")
        .unwrap()
        .update(
            SreChanges {
                allow_paste: Some(true),
                databases: Some(vec![DatabaseSystem::MicrosoftSqlServer]),
                ..Default::default()
            },
            &SilentReporter,
        )
        .unwrap();

    let yaml = config.to_yaml().unwrap();
    let decoded = Config::from_yaml(&yaml).unwrap();
    assert_eq!(decoded, config);
    assert!(decoded.is_complete(true));
}

/// Test: defaults are read but not written, and stay unset after a round-trip
#[test]
fn test_defaults_not_serialized() {
    let context = acme();
    let config = complete_config(&context);
    let yaml = config.to_yaml().unwrap();
    assert!(!yaml.contains("deployed_by"));
    assert!(!yaml.contains("project"));

    let decoded = Config::from_yaml(&yaml).unwrap();
    let tags = decoded.tags().unwrap();
    assert!(!tags.project.is_set());
    assert_eq!(tags.project.get().map(|p| p.as_str()), Some("Data Safe Haven"));
}

/// Test: IP addresses are written in CIDR form
#[test]
fn test_ip_addresses_written_as_cidr() {
    let context = acme();
    let yaml = complete_config(&context).to_yaml().unwrap();
    assert!(yaml.contains("193.60.220.253/32"));
}

/// Test: serialized form of an SRE-only document
#[test]
fn test_sre_document_layout() {
    let mut config = Config::new();
    let sre = config.sre_mut("sre1").unwrap();
    sre.set_research_desktops(&[sku("Standard_D2s_v3")]);
    sre.update(
        SreChanges {
            databases: Some(vec![DatabaseSystem::Postgresql]),
            ..Default::default()
        },
        &SilentReporter,
    )
    .unwrap();

    insta::assert_snapshot!(config.to_yaml().unwrap(), @r"
    sre:
      sre1:
        databases:
        - postgresql
        index: 1
        remote_desktop: {}
        research_desktops:
          workspace-00:
            sku: Standard_D2s_v3
    ");
}

/// Test: serialization refuses a document with a malformed value
#[test]
fn test_to_yaml_fails_on_unset_required_field() {
    let context = acme();
    let mut config = Config::for_context(&context);
    config.shm_mut();
    let err = config.to_yaml().unwrap_err();
    assert!(err.is_parameter_error());
    assert_eq!(err.code, DiagnosticCode::E0111FieldNotSet);
    assert_eq!(err.subject, "shm.admin_email_address");
}

/// Test: a malformed SRE value is reported with its full path
#[test]
fn test_decode_names_sre_field_path() {
    let err = Config::from_yaml("sre:\n  sre1:\n    index: 1\n    databases: [oracle]\n").unwrap_err();
    assert!(err.is_parameter_error());
    assert_eq!(err.subject, "sre.sre1.databases");
    assert!(err.message.contains("oracle"));
}

/// Test: a section that is not a mapping is rejected
#[test]
fn test_decode_rejects_scalar_section() {
    let err = Config::from_yaml("shm: nope\n").unwrap_err();
    assert_eq!(err.code, DiagnosticCode::E0119SectionInvalid);
    assert_eq!(err.subject, "shm");
}

// =============================================================================
// Updates
// =============================================================================

/// Test: update changes only the supplied fields
#[test]
fn test_update_leaves_other_fields_unchanged() {
    let context = acme();
    let mut config = complete_config(&context);
    let before = config.clone();

    config
        .shm_mut()
        .update(
            ShmChanges {
                fqdn: Some("other.example.com".parse().unwrap()),
                ..Default::default()
            },
            &SilentReporter,
        )
        .unwrap();

    let before_shm = before.shm().unwrap();
    let after_shm = config.shm().unwrap();
    assert_ne!(before_shm.fqdn, after_shm.fqdn);
    assert_eq!(before_shm.admin_email_address, after_shm.admin_email_address);
    assert_eq!(before_shm.admin_ip_addresses, after_shm.admin_ip_addresses);
    assert_eq!(before_shm.entra_tenant_id, after_shm.entra_tenant_id);
    assert_eq!(before_shm.name, after_shm.name);
    assert_eq!(before_shm.timezone, after_shm.timezone);
    assert_eq!(before.azure(), config.azure());
    assert_eq!(before.tags(), config.tags());
}

/// Test: an update with no changes reports nothing and changes nothing
#[test]
fn test_empty_update_is_noop() {
    let context = acme();
    let mut config = complete_config(&context);
    let before = config.clone();
    let reporter = RecordingReporter::new();
    config
        .azure_mut()
        .update(AzureChanges::default(), &reporter)
        .unwrap();
    config
        .tags_mut()
        .update(TagsChanges::default(), &reporter)
        .unwrap();
    assert_eq!(config, before);
    assert!(reporter.reports().is_empty());
}

/// Test: updates report the resulting value of each touched field
#[test]
fn test_update_reports_values() {
    let context = acme();
    let mut config = complete_config(&context);
    let reporter = RecordingReporter::new();
    config
        .sre_mut("sre1")
        .unwrap()
        .update(
            SreChanges {
                allow_copy: Some(true),
                software_packages: Some("pre-approved".parse().unwrap()),
                ..Default::default()
            },
            &reporter,
        )
        .unwrap();
    assert_eq!(
        reporter.value_of("remote_desktop", "allow_copy").as_deref(),
        Some("allowed")
    );
    assert_eq!(
        reporter.value_of("sre", "software_packages").as_deref(),
        Some("pre-approved")
    );
}

// =============================================================================
// SREs
// =============================================================================

/// Test: get-or-create returns the same SRE; new names get increasing indices
#[test]
fn test_sre_indices() {
    let context = acme();
    let mut config = complete_config(&context);
    let first = *config.sre_mut("alpha").unwrap().index.get().unwrap();
    let again = *config.sre_mut("alpha").unwrap().index.get().unwrap();
    let second = *config.sre_mut("beta").unwrap().index.get().unwrap();
    assert_eq!(first, again);
    assert!(second > first);
}

/// Test: set_research_desktops twice with the same list is idempotent
#[test]
fn test_set_research_desktops_idempotent() {
    let mut config = Config::new();
    let skus = [sku("Standard_D2s_v3"), sku("Standard_NC6s_v3")];
    config.sre_mut("sre1").unwrap().set_research_desktops(&skus);
    let once = config.sre("sre1").unwrap().clone();
    assert!(!config.sre_mut("sre1").unwrap().set_research_desktops(&skus));
    assert_eq!(config.sre("sre1").unwrap(), &once);
}

/// Test: must-exist access distinguishes unknown SREs
#[test]
fn test_existing_sre_access() {
    let mut config = Config::new();
    assert!(config.existing_sre_mut("ghost").unwrap_err().is_config_error());
    config.sre_mut("ghost").unwrap();
    assert!(config.existing_sre_mut("ghost").is_ok());
    assert_eq!(config.sre_names().collect::<Vec<_>>(), vec!["ghost"]);
}

/// Test: a decoded SRE validates on its own
#[test]
fn test_decoded_sre_section() {
    let context = acme();
    let yaml = config_with_sre(&context, "SRE One").to_yaml().unwrap();
    let decoded = Config::from_yaml(&yaml).unwrap();
    let sre: &ConfigSectionSre = decoded.sre("sreone").unwrap();
    assert!(sre.validate().is_ok());
    assert_eq!(sre.workspace_skus(), vec![sku("Standard_D2s_v3")]);
}

/// Test: stacks are registered through the document and removal is idempotent
#[test]
fn test_stack_registry() {
    let mut config = Config::new();
    config.remove_stack("missing");
    assert!(config.pulumi().is_none());
    config.add_stack("sre1", "azblob://pulumi/sre1").unwrap();
    assert_eq!(config.pulumi().unwrap().stack("sre1"), Some("azblob://pulumi/sre1"));
    config.remove_stack("sre1");
    config.remove_stack("sre1");
    assert_eq!(config.pulumi().unwrap().stack("sre1"), None);
}
