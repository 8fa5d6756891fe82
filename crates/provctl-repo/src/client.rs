//! Repository client: version resolution, metadata and components for one provider
//!
//! [`RepositoryClient`] wraps a [`Repository`] backend with:
//! - local overrides checked before the repository is consulted
//! - a caller-supplied timeout on every fetch
//! - fetch errors wrapped with the provider, version and path involved
//!
//! [`Repositories`] is the explicit registry handed to the installer and the
//! upgrade planner: catalog, backends, overrides, variables and hooks.

use provctl_core::{Metadata, ProviderConfig, ProviderType, latest_version, parse_version};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::catalog::ProviderCatalog;
use crate::components::{Components, ComponentsOptions};
use crate::error::{RepoError, Result};
use crate::hooks::HookRegistry;
use crate::overrides::Overrides;
use crate::repository::{COMPONENTS_FILE, LATEST, METADATA_FILE, Repository, create_repository};
use crate::variables::{EnvVariables, LayeredVariables, VariableSource};

/// Default bound on a single repository operation
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Repository I/O options
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    /// Bound on each repository operation; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_FETCH_TIMEOUT),
        }
    }
}

impl FetchOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

/// Client for one catalog entry
#[derive(Clone)]
pub struct RepositoryClient {
    provider: ProviderConfig,
    repository: Arc<dyn Repository>,
    overrides: Option<Overrides>,
    options: FetchOptions,
}

impl RepositoryClient {
    pub fn new(provider: ProviderConfig, repository: Arc<dyn Repository>) -> Self {
        Self {
            provider,
            repository,
            overrides: None,
            options: FetchOptions::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = Some(overrides);
        self
    }

    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    pub fn manifest_label(&self) -> String {
        self.provider.manifest_label()
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repository
    }

    async fn bounded<T>(
        &self,
        operation: String,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match self.options.timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| RepoError::Timeout {
                    operation,
                    seconds: limit.as_secs(),
                })?,
            None => fut.await,
        }
    }

    /// All published versions
    pub async fn versions(&self) -> Result<Vec<String>> {
        self.bounded(
            format!("listing versions of {}", self.manifest_label()),
            self.repository.versions(),
        )
        .await
    }

    /// Turn a requested version (or the repository default) into a concrete one.
    ///
    /// [`LATEST`] resolves to the highest non-prerelease version.
    pub async fn resolve_version(&self, requested: Option<&str>) -> Result<String> {
        let requested = requested
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.repository.default_version());
        if requested != LATEST {
            return Ok(requested.to_string());
        }

        let versions = self.versions().await?;
        latest_version(versions.iter().map(String::as_str), false)
            .map(|(raw, _)| raw.to_string())
            .ok_or_else(|| RepoError::NoVersionsAvailable {
                label: self.manifest_label(),
            })
    }

    /// Fetch a file; a local override shadows the repository
    pub async fn get_file(&self, version: &str, path: &str) -> Result<Vec<u8>> {
        let label = self.manifest_label();
        let fetch = async {
            if let Some(overrides) = &self.overrides
                && let Some(data) = overrides.get(&label, version, path).await?
            {
                return Ok(data);
            }
            self.bounded(
                format!("fetching {} {}", version, path),
                self.repository.get_file(version, path),
            )
            .await
        };

        fetch.await.map_err(|e| RepoError::Fetch {
            provider: label.clone(),
            version: version.to_string(),
            path: path.to_string(),
            source: Box::new(e),
        })
    }

    /// Release metadata for a version.
    ///
    /// Falls back to the embedded table only when `metadata.yaml` does not exist.
    pub async fn metadata(&self, version: &str) -> Result<Metadata> {
        match self.get_file(version, METADATA_FILE).await {
            Ok(data) => Ok(Metadata::from_bytes(&data)?),
            Err(e) if e.is_not_found() => {
                let label = self.manifest_label();
                match Metadata::embedded(&label) {
                    Some(metadata) => {
                        tracing::warn!(
                            provider = %label,
                            version,
                            "metadata.yaml not found, using embedded release series"
                        );
                        Ok(metadata)
                    }
                    None => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Components at a concrete version
    pub async fn components_at(
        &self,
        version: &str,
        options: &ComponentsOptions,
        vars: &dyn VariableSource,
    ) -> Result<Components> {
        let manifest = self.get_file(version, COMPONENTS_FILE).await?;
        Components::from_manifest(self.provider.clone(), version, &manifest, options, vars)
    }

    /// Components at the requested (or default) version
    pub async fn components(
        &self,
        options: &ComponentsOptions,
        vars: &dyn VariableSource,
    ) -> Result<Components> {
        let version = self.resolve_version(options.version.as_deref()).await?;
        self.components_at(&version, options, vars).await
    }

    /// Highest non-prerelease version belonging to `contract`.
    ///
    /// Contracts are read from the metadata of the latest release, which
    /// carries the most complete release-series table.
    pub async fn latest_for_contract(&self, contract: &str) -> Result<Option<String>> {
        let versions = self.versions().await?;
        let Some((latest, _)) = latest_version(versions.iter().map(String::as_str), false) else {
            return Ok(None);
        };
        let metadata = self.metadata(latest).await?;

        let candidates = versions.iter().map(String::as_str).filter(|raw| {
            parse_version(raw)
                .map(|v| metadata.contracts_for(&v).contains(contract))
                .unwrap_or(false)
        });
        Ok(latest_version(candidates, false).map(|(raw, _)| raw.to_string()))
    }
}

/// Registry of catalog entries and their repositories.
///
/// Constructed once and passed by reference to the installer and planner.
#[derive(Clone)]
pub struct Repositories {
    catalog: ProviderCatalog,
    registered: HashMap<String, Arc<dyn Repository>>,
    overrides: Option<Overrides>,
    variables: Arc<dyn VariableSource>,
    hooks: HookRegistry,
    options: FetchOptions,
}

impl Repositories {
    pub fn new(catalog: ProviderCatalog) -> Self {
        Self {
            catalog,
            registered: HashMap::new(),
            overrides: None,
            variables: Arc::new(EnvVariables),
            hooks: HookRegistry::new(),
            options: FetchOptions::default(),
        }
    }

    /// Use `repository` for the provider with `manifest_label` instead of its catalog URL
    pub fn with_repository(
        mut self,
        manifest_label: impl Into<String>,
        repository: impl Repository + 'static,
    ) -> Self {
        self.registered.insert(manifest_label.into(), Arc::new(repository));
        self
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = Some(overrides);
        self
    }

    pub fn with_variables(mut self, variables: impl VariableSource + 'static) -> Self {
        self.variables = Arc::new(variables);
        self
    }

    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_fetch_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn catalog(&self) -> &ProviderCatalog {
        &self.catalog
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Client for a catalog entry
    pub fn client(&self, provider: &ProviderConfig) -> Result<RepositoryClient> {
        let repository = match self.registered.get(&provider.manifest_label()) {
            Some(repository) => repository.clone(),
            None => create_repository(provider)?,
        };
        let mut client =
            RepositoryClient::new(provider.clone(), repository).with_options(self.options);
        if let Some(overrides) = &self.overrides {
            client = client.with_overrides(overrides.clone());
        }
        Ok(client)
    }

    /// Client for the catalog entry with `manifest_label`
    pub fn client_for_label(&self, manifest_label: &str) -> Result<RepositoryClient> {
        self.client(self.catalog.get_by_label(manifest_label)?)
    }

    /// Fetch and process components with their release metadata attached.
    ///
    /// The pre-config hook's variables take precedence over the configured
    /// variable source.
    pub async fn components(
        &self,
        name: &str,
        provider_type: ProviderType,
        options: &ComponentsOptions,
    ) -> Result<Components> {
        let provider = self.catalog.get(name, provider_type)?;
        self.components_for(provider, options).await
    }

    pub async fn components_for(
        &self,
        provider: &ProviderConfig,
        options: &ComponentsOptions,
    ) -> Result<Components> {
        let client = self.client(provider)?;
        let version = client.resolve_version(options.version.as_deref()).await?;

        let mut vars = LayeredVariables::new();
        if let Some(hook_vars) = self.hooks.run_pre_config(provider, &version).await? {
            vars = vars.then(hook_vars);
        }
        let vars = vars.then(self.variables.clone());

        let components = client.components_at(&version, options, &vars).await?;
        match client.metadata(&version).await {
            Ok(metadata) => Ok(components.with_metadata(metadata)),
            Err(e) if e.is_not_found() => {
                tracing::warn!(
                    provider = %provider.manifest_label(),
                    %version,
                    "no release metadata available"
                );
                Ok(components)
            }
            Err(e) => Err(e),
        }
    }

    /// Release metadata for a provider kind at a version
    pub async fn metadata(&self, manifest_label: &str, version: &str) -> Result<Metadata> {
        self.client_for_label(manifest_label)?.metadata(version).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRepository;
    use crate::variables::MapVariables;
    use async_trait::async_trait;
    use tempfile::TempDir;

    const METADATA_V1: &str = r#"
apiVersion: provctl.io/v1
kind: Metadata
releaseSeries:
  - major: 1
    minor: 1
    contract: v1alpha4
  - major: 1
    minor: 0
    contract: v1alpha3
"#;

    const COMPONENTS: &str = r#"
kind: Namespace
metadata:
  name: capd-system
---
kind: Deployment
metadata:
  name: capd-controller-manager
spec:
  template:
    spec:
      containers:
        - name: manager
          image: ${REGISTRY}/capd:v1
"#;

    fn docker() -> ProviderConfig {
        ProviderConfig::new("docker", ProviderType::Infrastructure, "memory://docker")
    }

    fn repo() -> MemoryRepository {
        MemoryRepository::new("memory://docker")
            .with_metadata("v1.0.0", METADATA_V1)
            .with_metadata("v1.0.2", METADATA_V1)
            .with_metadata("v1.1.0", METADATA_V1)
            .with_components("v1.1.0", COMPONENTS)
            .with_version("v1.2.0-rc.0")
    }

    fn client(repo: MemoryRepository) -> RepositoryClient {
        RepositoryClient::new(docker(), Arc::new(repo))
    }

    #[tokio::test]
    async fn test_resolve_latest() {
        let client = client(repo());
        assert_eq!(client.resolve_version(None).await.unwrap(), "v1.1.0");
        assert_eq!(client.resolve_version(Some("latest")).await.unwrap(), "v1.1.0");
        assert_eq!(client.resolve_version(Some("v1.0.0")).await.unwrap(), "v1.0.0");
    }

    #[tokio::test]
    async fn test_resolve_without_versions() {
        let client = client(MemoryRepository::new("memory://docker"));
        let err = client.resolve_version(None).await.unwrap_err();
        assert!(matches!(err, RepoError::NoVersionsAvailable { .. }));
    }

    #[tokio::test]
    async fn test_override_shadows_repository() {
        let dir = TempDir::new().unwrap();
        let overrides = Overrides::new(dir.path());
        let file = overrides.path_for("infrastructure-docker", "v1.0.0", METADATA_FILE);
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, "kind: Metadata\nreleaseSeries: []\n").unwrap();

        let repo = repo();
        let client =
            RepositoryClient::new(docker(), Arc::new(repo.clone())).with_overrides(overrides);
        let metadata = client.metadata("v1.0.0").await.unwrap();
        assert!(metadata.release_series.is_empty());
        assert_eq!(repo.fetch_count(), 0);

        client.metadata("v1.1.0").await.unwrap();
        assert_eq!(repo.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_embedded_metadata_fallback() {
        let client = client(MemoryRepository::new("memory://docker").with_version("v0.4.0"));
        let metadata = client.metadata("v0.4.0").await.unwrap();
        assert!(!metadata.release_series.is_empty());

        let unknown = RepositoryClient::new(
            ProviderConfig::new("acme", ProviderType::Infrastructure, "memory://acme"),
            Arc::new(MemoryRepository::new("memory://acme")),
        );
        let err = unknown.metadata("v0.1.0").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("infrastructure-acme@v0.1.0"));
    }

    #[tokio::test]
    async fn test_explicit_metadata_beats_embedded() {
        let client = client(repo());
        let metadata = client.metadata("v1.0.0").await.unwrap();
        assert_eq!(metadata.release_series.len(), 2);
    }

    #[tokio::test]
    async fn test_latest_for_contract() {
        let client = client(repo());
        assert_eq!(
            client.latest_for_contract("v1alpha3").await.unwrap().as_deref(),
            Some("v1.0.2")
        );
        assert_eq!(
            client.latest_for_contract("v1alpha4").await.unwrap().as_deref(),
            Some("v1.1.0")
        );
        assert_eq!(client.latest_for_contract("v1beta1").await.unwrap(), None);
    }

    struct Slow;

    #[async_trait]
    impl Repository for Slow {
        fn url(&self) -> &str {
            "slow://"
        }

        fn default_version(&self) -> &str {
            LATEST
        }

        async fn versions(&self) -> Result<Vec<String>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![])
        }

        async fn get_file(&self, _version: &str, _path: &str) -> Result<Vec<u8>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let client = RepositoryClient::new(docker(), Arc::new(Slow))
            .with_options(FetchOptions::with_timeout(Duration::from_millis(20)));
        let err = client.get_file("v1.0.0", COMPONENTS_FILE).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(err, RepoError::Fetch { .. }));
    }

    #[tokio::test]
    async fn test_registry_components() {
        let repositories = Repositories::new(ProviderCatalog::builtin())
            .with_repository("infrastructure-docker", repo())
            .with_variables(MapVariables::new().with("REGISTRY", "registry.local"));

        let components = repositories
            .components("docker", ProviderType::Infrastructure, &ComponentsOptions::new())
            .await
            .unwrap();
        assert_eq!(components.version(), "v1.1.0");
        assert_eq!(components.target_namespace(), "capd-system");
        assert_eq!(components.images(), vec!["registry.local/capd:v1"]);
        assert_eq!(components.metadata().unwrap().release_series.len(), 2);
    }

    #[tokio::test]
    async fn test_registry_unknown_provider() {
        let repositories = Repositories::new(ProviderCatalog::builtin());
        let err = repositories
            .components("acme", ProviderType::Infrastructure, &ComponentsOptions::new())
            .await
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
