//! Shared fixtures for installer and upgrade tests
#![allow(dead_code)]

use provctl_core::{Metadata, ProviderConfig, ProviderInstance, ProviderType};
use provctl_repo::{
    Components, ComponentsOptions, MapVariables, MemoryRepository, ProviderCatalog, Repositories,
};
use std::sync::Arc;

pub const CORE: &str = "cluster-api";
pub const INFRA: &str = "infra1";
pub const DOCKER: &str = "docker";
pub const KUBEADM: &str = "kubeadm";

/// A `metadata.yaml` document with the given (major, minor, contract) rows
pub fn metadata_yaml(rows: &[(u64, u64, &str)]) -> String {
    let mut yaml = String::from("apiVersion: provctl.io/v1\nkind: Metadata\nreleaseSeries:\n");
    for (major, minor, contract) in rows {
        yaml.push_str(&format!(
            "  - major: {}\n    minor: {}\n    contract: {}\n",
            major, minor, contract
        ));
    }
    yaml
}

pub fn metadata(rows: &[(u64, u64, &str)]) -> Metadata {
    Metadata::from_yaml(&metadata_yaml(rows)).unwrap()
}

/// A `components.yaml` with a Namespace, a CRD and a controller Deployment
pub fn components_yaml(name: &str, namespace: &str, version: &str) -> String {
    format!(
        r#"apiVersion: v1
kind: Namespace
metadata:
  name: {namespace}
---
apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: {name}machines.provctl.io
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: {name}-controller-manager
spec:
  template:
    spec:
      containers:
        - name: manager
          image: registry.example.com/{name}-controller:{version}
"#
    )
}

pub fn config(name: &str, provider_type: ProviderType) -> ProviderConfig {
    ProviderConfig::new(name, provider_type, format!("memory://{}", name))
}

pub fn catalog() -> ProviderCatalog {
    let mut catalog = ProviderCatalog::new();
    catalog
        .merge(vec![
            config(CORE, ProviderType::Core),
            config(KUBEADM, ProviderType::Bootstrap),
            config(INFRA, ProviderType::Infrastructure),
            config(DOCKER, ProviderType::Infrastructure),
        ])
        .unwrap();
    catalog
}

/// Processed components with release metadata attached
pub fn components(
    provider: ProviderConfig,
    version: &str,
    namespace: &str,
    watching: &str,
    rows: &[(u64, u64, &str)],
) -> Components {
    let yaml = components_yaml(&provider.name, namespace, version);
    let options = ComponentsOptions::new()
        .version(version)
        .target_namespace(namespace)
        .watching(watching);
    Components::from_manifest(provider, version, yaml.as_bytes(), &options, &MapVariables::new())
        .unwrap()
        .with_metadata(metadata(rows))
}

pub fn core(version: &str, namespace: &str, watching: &str) -> ProviderInstance {
    ProviderInstance::new(CORE, ProviderType::Core, version, namespace).watching(watching)
}

pub fn infra(version: &str, namespace: &str, watching: &str) -> ProviderInstance {
    ProviderInstance::new(INFRA, ProviderType::Infrastructure, version, namespace)
        .watching(watching)
}

/// A repository publishing `versions`, each with the same release series
pub fn repository(name: &str, versions: &[&str], rows: &[(u64, u64, &str)]) -> MemoryRepository {
    let metadata = metadata_yaml(rows);
    let mut repo = MemoryRepository::new(format!("memory://{}", name));
    for version in versions {
        repo = repo
            .with_metadata(version, &metadata)
            .with_components(version, &components_yaml(name, &format!("{}-system", name), version));
    }
    repo
}

/// Registry over [`catalog`] backed by in-memory repositories
pub fn repositories(repos: Vec<(&str, MemoryRepository)>) -> Repositories {
    let mut repositories = Repositories::new(catalog()).with_variables(MapVariables::new());
    for (label, repo) in repos {
        repositories = repositories.with_repository(label, repo);
    }
    repositories
}

pub fn shared(repositories: Repositories) -> Arc<Repositories> {
    Arc::new(repositories)
}
