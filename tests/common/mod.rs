//! Common fixtures for configuration integration tests.

#![allow(dead_code)] // Functions used across different test binaries

use dsh_config::section::{AzureChanges, ShmChanges, SreChanges};
use dsh_config::{Config, Context, ContextRegistry, LocalBlobStore, SilentReporter};
use std::path::PathBuf;
use tempfile::TempDir;

pub const ADMIN_GROUP_ID: &str = "d5c5c439-1115-4cb6-ab50-b8e547b6c8dd";
pub const SUBSCRIPTION_ID: &str = "3aa3a3b0-55a4-4f2a-9c7e-4b4c0e6f1a11";
pub const TENANT_ID: &str = "0d6ecb05-64e7-4f38-a4ea-5a5ab2cbe4a8";

/// The context used throughout the tests ("acmedeployment")
pub fn acme() -> Context {
    Context::new("Acme Deployment", ADMIN_GROUP_ID, "uksouth", "Data Safe Haven Acme")
        .unwrap()
}

/// A document whose every required section is present and valid
pub fn complete_config(context: &Context) -> Config {
    let reporter = SilentReporter;
    let mut config = Config::for_context(context);
    config
        .azure_mut()
        .update(
            AzureChanges {
                subscription_id: Some(SUBSCRIPTION_ID.parse().unwrap()),
                tenant_id: Some(TENANT_ID.parse().unwrap()),
                ..Default::default()
            },
            &reporter,
        )
        .unwrap();
    config.backend_mut();
    config.pulumi_mut();
    config
        .shm_mut()
        .update(
            ShmChanges {
                admin_email_address: Some("admin@example.com".parse().unwrap()),
                admin_ip_addresses: Some(vec!["193.60.220.253".parse().unwrap()]),
                entra_tenant_id: Some(TENANT_ID.parse().unwrap()),
                fqdn: Some("sandbox.example.com".parse().unwrap()),
                timezone: Some("Europe/London".parse().unwrap()),
            },
            &reporter,
        )
        .unwrap();
    config.tags_mut();
    config
}

/// A complete document with one configured SRE
pub fn config_with_sre(context: &Context, sre_name: &str) -> Config {
    let mut config = complete_config(context);
    config
        .sre_mut(sre_name)
        .unwrap()
        .update(
            SreChanges {
                research_user_ip_addresses: Some(vec!["10.10.0.0/24".parse().unwrap()]),
                workspace_skus: Some(vec!["Standard_D2s_v3".parse().unwrap()]),
                ..Default::default()
            },
            &SilentReporter,
        )
        .unwrap();
    config
}

/// Temporary local blob store
pub fn local_store() -> (TempDir, LocalBlobStore) {
    let temp_dir = TempDir::new().unwrap();
    let store = LocalBlobStore::new(temp_dir.path().join("blobs"));
    (temp_dir, store)
}

/// Registry file path inside a temporary directory (the file is not created)
pub fn registry_path(temp_dir: &TempDir) -> PathBuf {
    temp_dir.path().join("data_safe_haven").join("contexts.yaml")
}

/// Registry holding the "acme" context, selected
pub fn acme_registry() -> ContextRegistry {
    let mut registry = ContextRegistry::default();
    let key = registry
        .add("Acme Deployment", "Data Safe Haven Acme", ADMIN_GROUP_ID, "uksouth")
        .unwrap();
    registry.set_selected(Some(&key)).unwrap();
    registry
}
