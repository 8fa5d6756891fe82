//! Provider hooks
//!
//! Catalog entries may name two hooks:
//! - `preConfigHook`: contributes variables before components are processed
//! - `initHook`: runs once a provider's objects have been applied
//!
//! Hook names are resolved through an explicit [`HookRegistry`].

use async_trait::async_trait;
use provctl_core::{ProviderConfig, ProviderInstance};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{RepoError, Result};
use crate::variables::MapVariables;

/// Hook run before components are processed
#[async_trait]
pub trait PreConfigHook: Send + Sync {
    /// Variables layered over the configured variable source
    async fn variables(&self, provider: &ProviderConfig, version: &str) -> Result<MapVariables>;
}

/// Hook run after a provider instance is installed
#[async_trait]
pub trait InitHook: Send + Sync {
    async fn run(&self, instance: &ProviderInstance) -> Result<()>;
}

/// Named hooks
#[derive(Clone, Default)]
pub struct HookRegistry {
    pre_config: HashMap<String, Arc<dyn PreConfigHook>>,
    init: HashMap<String, Arc<dyn InitHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_pre_config(
        &mut self,
        name: impl Into<String>,
        hook: impl PreConfigHook + 'static,
    ) {
        self.pre_config.insert(name.into(), Arc::new(hook));
    }

    pub fn register_init(&mut self, name: impl Into<String>, hook: impl InitHook + 'static) {
        self.init.insert(name.into(), Arc::new(hook));
    }

    pub fn pre_config(&self, name: &str) -> Result<Arc<dyn PreConfigHook>> {
        self.pre_config
            .get(name)
            .cloned()
            .ok_or_else(|| RepoError::HookNotFound {
                name: name.to_string(),
            })
    }

    pub fn init(&self, name: &str) -> Result<Arc<dyn InitHook>> {
        self.init.get(name).cloned().ok_or_else(|| RepoError::HookNotFound {
            name: name.to_string(),
        })
    }

    /// Fail with [`RepoError::HookNotFound`] if a hook named by `provider`
    /// is not registered
    pub fn ensure_registered(&self, provider: &ProviderConfig) -> Result<()> {
        if let Some(name) = provider.pre_config_hook.as_deref() {
            self.pre_config(name)?;
        }
        if let Some(name) = provider.init_hook.as_deref() {
            self.init(name)?;
        }
        Ok(())
    }

    /// Variables contributed by the provider's pre-config hook, if it has one
    pub async fn run_pre_config(
        &self,
        provider: &ProviderConfig,
        version: &str,
    ) -> Result<Option<MapVariables>> {
        let Some(name) = provider.pre_config_hook.as_deref() else {
            return Ok(None);
        };
        let hook = self.pre_config(name)?;
        tracing::debug!(
            hook = name,
            provider = %provider.manifest_label(),
            "running pre-config hook"
        );
        let vars = hook
            .variables(provider, version)
            .await
            .map_err(|e| hook_failed(name, e))?;
        Ok(Some(vars))
    }

    /// Run the init hook named by `hook`, if any
    pub async fn run_init(&self, hook: Option<&str>, instance: &ProviderInstance) -> Result<()> {
        let Some(name) = hook else {
            return Ok(());
        };
        let init = self.init(name)?;
        tracing::debug!(hook = name, provider = %instance, "running init hook");
        init.run(instance).await.map_err(|e| hook_failed(name, e))
    }
}

fn hook_failed(name: &str, e: RepoError) -> RepoError {
    match e {
        RepoError::HookFailed { .. } => e,
        other => RepoError::HookFailed {
            name: name.to_string(),
            message: other.to_string(),
        },
    }
}
