//! Provider catalog
//!
//! Built-in providers merged with the user's `~/.config/provctl/providers.yaml`:
//!
//! ```yaml
//! providers:
//!   - name: aws
//!     type: InfrastructureProvider
//!     url: https://github.com/kubernetes-sigs/cluster-api-provider-aws/releases
//!     preConfigHook: aws-credentials
//! ```
//!
//! Later definitions with the same `(name, type)` override earlier ones.

use indexmap::IndexMap;
use provctl_core::{ProviderConfig, ProviderKey, ProviderType};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RepoError, Result};

/// Providers known without any configuration
const BUILTIN_PROVIDERS: &[(&str, ProviderType, &str)] = &[
    (
        "cluster-api",
        ProviderType::Core,
        "https://github.com/kubernetes-sigs/cluster-api/releases",
    ),
    (
        "undistro",
        ProviderType::Undistro,
        "https://github.com/getupio-undistro/undistro/releases",
    ),
    (
        "kubeadm",
        ProviderType::Bootstrap,
        "https://github.com/kubernetes-sigs/cluster-api/releases",
    ),
    (
        "kubeadm",
        ProviderType::ControlPlane,
        "https://github.com/kubernetes-sigs/cluster-api/releases",
    ),
    (
        "docker",
        ProviderType::Infrastructure,
        "https://github.com/kubernetes-sigs/cluster-api/releases",
    ),
];

/// User catalog file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFile {
    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

fn default_api_version() -> String {
    "provctl.io/v1".to_string()
}

impl CatalogFile {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}

/// Registry of provider definitions, keyed by `(name, type)`.
///
/// Built once at startup and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ProviderCatalog {
    providers: IndexMap<ProviderKey, ProviderConfig>,
}

impl ProviderCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog of built-in providers only
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        for (name, provider_type, url) in BUILTIN_PROVIDERS {
            catalog.insert(ProviderConfig::new(*name, *provider_type, *url));
        }
        catalog
    }

    /// Built-in providers merged with the user file at `path`, when it exists
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut catalog = Self::builtin();
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::default_path().ok().filter(|p| p.exists()),
        };
        if let Some(path) = path {
            tracing::debug!(path = %path.display(), "loading provider catalog");
            catalog.merge(CatalogFile::load_from(&path)?.providers)?;
        }
        Ok(catalog)
    }

    /// Default user catalog path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| RepoError::InvalidConfig {
            message: "Could not determine config directory".to_string(),
        })?;
        Ok(config_dir.join("provctl").join("providers.yaml"))
    }

    /// Validate and add definitions; later ones override earlier ones
    pub fn merge(&mut self, providers: Vec<ProviderConfig>) -> Result<()> {
        for provider in providers {
            provider.validate()?;
            url::Url::parse(&provider.url)
                .map(|_| ())
                .or_else(|e| {
                    if is_local_path(&provider.url) {
                        Ok(())
                    } else {
                        Err(RepoError::InvalidRepositoryUrl {
                            url: provider.url.clone(),
                            reason: e.to_string(),
                        })
                    }
                })?;
            self.insert(provider);
        }
        Ok(())
    }

    fn insert(&mut self, provider: ProviderConfig) {
        if self.providers.contains_key(&provider.key()) {
            tracing::debug!(provider = %provider.key(), "overriding provider definition");
        }
        self.providers.insert(provider.key(), provider);
    }

    pub fn get(&self, name: &str, provider_type: ProviderType) -> Result<&ProviderConfig> {
        let key = ProviderKey {
            name: name.to_string(),
            provider_type,
        };
        self.providers.get(&key).ok_or_else(|| RepoError::ProviderNotFound {
            name: name.to_string(),
            provider_type,
        })
    }

    /// Look a provider up by manifest label
    pub fn get_by_label(&self, manifest_label: &str) -> Result<&ProviderConfig> {
        self.providers
            .values()
            .find(|p| p.manifest_label() == manifest_label)
            .ok_or_else(|| RepoError::LabelNotFound {
                label: manifest_label.to_string(),
            })
    }

    /// Providers sorted by type, then name
    pub fn list(&self) -> Vec<&ProviderConfig> {
        let mut providers: Vec<&ProviderConfig> = self.providers.values().collect();
        providers.sort_by(|a, b| {
            a.provider_type
                .cmp(&b.provider_type)
                .then_with(|| a.name.cmp(&b.name))
        });
        providers
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

fn is_local_path(url: &str) -> bool {
    Path::new(url).is_absolute() || url.starts_with("./") || url.starts_with("../")
}
