//! Shared setup: catalog, repositories and inventory from global flags

use clap::Args;
use provctl_core::{InstanceKey, ProviderType, manifest_label};
use provctl_kube::{
    ConfigMapInventory, DEFAULT_INVENTORY_NAMESPACE, FileInventory, InventoryStore,
};
use provctl_repo::{
    EnvVariables, FetchOptions, LayeredVariables, MapVariables, Overrides, ProviderCatalog,
    Repositories,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{CliError, Result};

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Provider catalog file merged over the built-in providers
    #[arg(long, global = true, env = "PROVCTL_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Directory of the file inventory
    #[arg(long, global = true, env = "PROVCTL_INVENTORY", conflicts_with = "cluster")]
    pub inventory: Option<PathBuf>,

    /// Keep the inventory in ConfigMaps of the current cluster
    #[arg(long, global = true)]
    pub cluster: bool,

    /// Namespace holding the ConfigMap inventory
    #[arg(long, global = true, default_value = DEFAULT_INVENTORY_NAMESPACE)]
    pub inventory_namespace: String,

    /// YAML file of variables, taking precedence over the environment
    #[arg(long, global = true)]
    pub variables: Option<PathBuf>,

    /// Local override directory (`<label>/<version>/<file>`)
    #[arg(long, global = true, env = "PROVCTL_OVERRIDES")]
    pub overrides: Option<PathBuf>,

    /// Repository fetch timeout in seconds (0 disables it)
    #[arg(long, global = true, default_value_t = 30)]
    pub timeout: u64,
}

impl GlobalArgs {
    pub fn repositories(&self) -> Result<Arc<Repositories>> {
        let catalog = ProviderCatalog::load(self.catalog.as_deref())?;

        let mut variables = LayeredVariables::new();
        if let Some(path) = &self.variables {
            variables = variables.then(MapVariables::from_file(path)?);
        }
        let variables = variables.then(EnvVariables);

        let options = match self.timeout {
            0 => FetchOptions { timeout: None },
            secs => FetchOptions::with_timeout(Duration::from_secs(secs)),
        };

        let mut repositories = Repositories::new(catalog)
            .with_variables(variables)
            .with_fetch_options(options);

        let overrides = self
            .overrides
            .clone()
            .map(Overrides::new)
            .or_else(Overrides::default_location);
        if let Some(overrides) = overrides {
            tracing::debug!(root = %overrides.root().display(), "using local overrides");
            repositories = repositories.with_overrides(overrides);
        }
        Ok(Arc::new(repositories))
    }

    pub async fn inventory(&self) -> Result<Box<dyn InventoryStore>> {
        if self.cluster {
            let inventory = ConfigMapInventory::new(&self.inventory_namespace).await?;
            return Ok(Box::new(inventory));
        }

        let inventory = match &self.inventory {
            Some(dir) => FileInventory::new(dir),
            None => FileInventory::default_location().ok_or_else(|| CliError::Config {
                message: "could not determine a config directory for the inventory".to_string(),
                help: Some("pass --inventory <dir> or --cluster".to_string()),
            })?,
        };
        tracing::debug!(dir = %inventory.base_dir().display(), "using file inventory");
        Ok(Box::new(inventory))
    }
}

/// A provider named on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSpec {
    pub name: String,
    pub provider_type: ProviderType,
    pub version: Option<String>,
}

impl ProviderSpec {
    /// Parse `name[:version]`
    pub fn parse(raw: &str, provider_type: ProviderType) -> Result<Self> {
        let (name, version) = match raw.split_once(':') {
            Some((name, version)) => (name, Some(version.to_string())),
            None => (raw, None),
        };
        if name.is_empty() || version.as_deref() == Some("") {
            return Err(CliError::usage(format!(
                "invalid provider '{}', expected name[:version]",
                raw
            )));
        }
        Ok(Self {
            name: name.to_string(),
            provider_type,
            version,
        })
    }

    pub fn manifest_label(&self) -> String {
        manifest_label(&self.name, self.provider_type)
    }
}

/// Parse `namespace/manifest-label`
pub fn parse_instance_key(raw: &str) -> Result<InstanceKey> {
    match raw.split_once('/') {
        Some((namespace, label)) if !namespace.is_empty() && !label.is_empty() => Ok(InstanceKey {
            manifest_label: label.to_string(),
            namespace: namespace.to_string(),
        }),
        _ => Err(CliError::usage(format!(
            "invalid provider '{}', expected namespace/manifest-label",
            raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_spec() {
        let spec = ProviderSpec::parse("docker:v1.0.0", ProviderType::Infrastructure).unwrap();
        assert_eq!(spec.name, "docker");
        assert_eq!(spec.version.as_deref(), Some("v1.0.0"));
        assert_eq!(spec.manifest_label(), "infrastructure-docker");

        let spec = ProviderSpec::parse("kubeadm", ProviderType::Bootstrap).unwrap();
        assert_eq!(spec.version, None);

        assert!(ProviderSpec::parse("docker:", ProviderType::Infrastructure).is_err());
        assert!(ProviderSpec::parse(":v1.0.0", ProviderType::Infrastructure).is_err());
    }

    #[test]
    fn test_parse_instance_key() {
        let key = parse_instance_key("capi-system/cluster-api").unwrap();
        assert_eq!(key.namespace, "capi-system");
        assert_eq!(key.manifest_label, "cluster-api");

        assert!(parse_instance_key("cluster-api").is_err());
        assert!(parse_instance_key("/cluster-api").is_err());
    }
}
