//! Kubernetes ConfigMap inventory
//!
//! One ConfigMap per instance in an inventory namespace.
//! The ConfigMap's `resourceVersion` is the concurrency token, so the API
//! server performs the compare-and-swap.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Client;
use kube::api::{Api, ListParams, PostParams};
use provctl_core::{InstanceKey, ProviderInstance};
use std::collections::BTreeMap;

use super::InventoryStore;
use crate::error::{KubeError, Result};

/// Namespace holding the inventory unless configured otherwise
pub const DEFAULT_INVENTORY_NAMESPACE: &str = "provctl-system";

const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
const MANAGED_BY: &str = "provctl";
const PROVIDER_LABEL: &str = "provctl.io/provider";
const NAMESPACE_LABEL: &str = "provctl.io/instance-namespace";
const UPDATED_AT_ANNOTATION: &str = "provctl.io/updated-at";
const INSTANCE_KEY: &str = "instance";

/// ConfigMap-backed inventory
pub struct ConfigMapInventory {
    client: Client,
    namespace: String,
}

impl ConfigMapInventory {
    /// Connect with the default kubeconfig
    pub async fn new(namespace: impl Into<String>) -> Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self::with_client(client, namespace))
    }

    /// Create with an existing client
    pub fn with_client(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    fn config_maps(&self) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

/// ConfigMap name for an instance key
pub(crate) fn config_map_name(key: &InstanceKey) -> String {
    format!("provctl.{}.{}", key.namespace, key.manifest_label)
}

/// Build the ConfigMap recording an instance
pub(crate) fn build_config_map(
    instance: &ProviderInstance,
    inventory_namespace: &str,
) -> Result<ConfigMap> {
    let mut record = instance.clone();
    record.resource_version = None;

    let mut labels = BTreeMap::new();
    labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string());
    labels.insert(PROVIDER_LABEL.to_string(), instance.manifest_label.clone());
    labels.insert(NAMESPACE_LABEL.to_string(), instance.namespace.clone());

    let mut annotations = BTreeMap::new();
    annotations.insert(UPDATED_AT_ANNOTATION.to_string(), chrono::Utc::now().to_rfc3339());

    let mut data = BTreeMap::new();
    data.insert(INSTANCE_KEY.to_string(), serde_json::to_string(&record)?);

    Ok(ConfigMap {
        metadata: ObjectMeta {
            name: Some(config_map_name(&instance.key())),
            namespace: Some(inventory_namespace.to_string()),
            labels: Some(labels),
            annotations: Some(annotations),
            resource_version: instance.resource_version.clone(),
            ..Default::default()
        },
        data: Some(data),
        ..Default::default()
    })
}

/// Read the instance recorded in a ConfigMap, token included
pub(crate) fn parse_config_map(config_map: &ConfigMap) -> Result<ProviderInstance> {
    let name = config_map.metadata.name.as_deref().unwrap_or("<unnamed>");
    let data = config_map
        .data
        .as_ref()
        .and_then(|d| d.get(INSTANCE_KEY))
        .ok_or_else(|| {
            KubeError::Storage(format!("ConfigMap {} missing '{}' data", name, INSTANCE_KEY))
        })?;
    let mut instance: ProviderInstance = serde_json::from_str(data).map_err(|e| {
        KubeError::Storage(format!("ConfigMap {} holds an unreadable record: {}", name, e))
    })?;
    instance.resource_version = config_map.metadata.resource_version.clone();
    Ok(instance)
}

fn is_status(e: &kube::Error, code: u16) -> bool {
    matches!(e, kube::Error::Api(response) if response.code == code)
}

#[async_trait]
impl InventoryStore for ConfigMapInventory {
    async fn ensure_schema(&self) -> Result<()> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        if namespaces.get_opt(&self.namespace).await?.is_some() {
            return Ok(());
        }

        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(self.namespace.clone()),
                labels: Some(BTreeMap::from([(
                    MANAGED_BY_LABEL.to_string(),
                    MANAGED_BY.to_string(),
                )])),
                ..Default::default()
            },
            ..Default::default()
        };
        match namespaces.create(&PostParams::default(), &namespace).await {
            Ok(_) => {
                tracing::info!(namespace = %self.namespace, "created inventory namespace");
                Ok(())
            }
            // created concurrently
            Err(e) if is_status(&e, 409) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<ProviderInstance>> {
        let lp = ListParams::default().labels(&format!("{}={}", MANAGED_BY_LABEL, MANAGED_BY));
        let config_maps = self.config_maps().list(&lp).await?;

        let mut instances = config_maps
            .items
            .iter()
            .map(parse_config_map)
            .collect::<Result<Vec<_>>>()?;
        instances.sort_by_key(|i| i.key());
        Ok(instances)
    }

    async fn get(&self, key: &InstanceKey) -> Result<Option<ProviderInstance>> {
        match self.config_maps().get_opt(&config_map_name(key)).await? {
            Some(config_map) => parse_config_map(&config_map).map(Some),
            None => Ok(None),
        }
    }

    async fn create(&self, instance: &ProviderInstance) -> Result<ProviderInstance> {
        let api = self.config_maps();
        let config_map = build_config_map(instance, &self.namespace)?;
        let name = config_map_name(&instance.key());

        let result = match &instance.resource_version {
            None => api.create(&PostParams::default(), &config_map).await,
            Some(_) => api.replace(&name, &PostParams::default(), &config_map).await,
        };

        match result {
            Ok(stored) => parse_config_map(&stored),
            Err(e) if is_status(&e, 409) => Err(KubeError::conflict(
                &instance.manifest_label,
                &instance.namespace,
                if instance.resource_version.is_none() {
                    "instance already exists".to_string()
                } else {
                    "record was modified concurrently".to_string()
                },
            )),
            Err(e) if is_status(&e, 404) => Err(KubeError::conflict(
                &instance.manifest_label,
                &instance.namespace,
                "record was deleted concurrently",
            )),
            Err(e) => Err(e.into()),
        }
    }
}
