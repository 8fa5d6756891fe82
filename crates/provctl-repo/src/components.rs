//! Provider components: a version-bound, variable-resolved install manifest
//!
//! Processing of a raw `components.yaml`:
//! 1. `${VAR}` placeholders are resolved; every missing variable is reported
//! 2. multi-document YAML is parsed into objects
//! 3. the target namespace is applied (defaulting to the manifest's `Namespace`)
//! 4. controller Deployments are pointed at the watched namespace
//! 5. every object is labelled with the provider's manifest label

use provctl_core::{Metadata, ProviderConfig, ProviderInstance, ProviderType};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::error::{RepoError, Result};
use crate::variables::{VariableSource, substitute, variable_names};

/// Label identifying the provider an object belongs to
pub const PROVIDER_LABEL: &str = "provctl.io/provider";

/// Label marking objects shared by every instance of a provider kind
pub const LIFECYCLE_LABEL: &str = "provctl.io/lifecycle";

/// Value of [`LIFECYCLE_LABEL`] for shared objects
pub const SHARED_LIFECYCLE: &str = "shared";

/// Container whose arguments receive the watched namespace
const MANAGER_CONTAINER: &str = "manager";

const NAMESPACE_ARG: &str = "--namespace";

/// Kinds that are never namespaced
const CLUSTER_SCOPED_KINDS: &[&str] = &[
    "Namespace",
    "CustomResourceDefinition",
    "ClusterRole",
    "ClusterRoleBinding",
    "ValidatingWebhookConfiguration",
    "MutatingWebhookConfiguration",
    "APIService",
    "PriorityClass",
    "StorageClass",
    "PersistentVolume",
];

/// Kinds installed once per provider kind
const SHARED_KINDS: &[&str] = &[
    "CustomResourceDefinition",
    "ValidatingWebhookConfiguration",
    "MutatingWebhookConfiguration",
];

/// Options selecting and placing a provider's components
#[derive(Debug, Clone, Default)]
pub struct ComponentsOptions {
    /// Version to fetch; `None` uses the repository default
    pub version: Option<String>,

    /// Namespace to install into; `None` uses the manifest's `Namespace`
    pub target_namespace: Option<String>,

    /// Namespace(s) the provider watches; empty means all
    pub watching_namespace: String,
}

impl ComponentsOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn target_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.target_namespace = Some(namespace.into());
        self
    }

    pub fn watching(mut self, namespace: impl Into<String>) -> Self {
        self.watching_namespace = namespace.into();
        self
    }
}

/// Processed components of one provider at one version
#[derive(Debug, Clone, PartialEq)]
pub struct Components {
    provider: ProviderConfig,
    version: String,
    target_namespace: String,
    watching_namespace: String,
    variables: Vec<String>,
    objects: Vec<Value>,
    metadata: Option<Metadata>,
}

impl Components {
    /// Build components from already processed objects
    pub fn new(
        provider: ProviderConfig,
        version: impl Into<String>,
        target_namespace: impl Into<String>,
        watching_namespace: impl Into<String>,
        objects: Vec<Value>,
    ) -> Self {
        Self {
            provider,
            version: version.into(),
            target_namespace: target_namespace.into(),
            watching_namespace: watching_namespace.into(),
            variables: Vec::new(),
            objects,
            metadata: None,
        }
    }

    /// Process a raw manifest for `provider` at the concrete `version`
    pub fn from_manifest(
        provider: ProviderConfig,
        version: &str,
        manifest: &[u8],
        options: &ComponentsOptions,
        vars: &dyn VariableSource,
    ) -> Result<Self> {
        let label = provider.manifest_label();
        let text = std::str::from_utf8(manifest).map_err(|e| RepoError::InvalidComponents {
            provider: label.clone(),
            message: format!("manifest is not valid UTF-8: {}", e),
        })?;

        let variables = variable_names(text);
        let resolved = substitute(text, vars).map_err(|missing| RepoError::MissingVariables {
            provider: label.clone(),
            variables: missing,
        })?;

        let mut objects = parse_objects(&resolved).map_err(|message| RepoError::InvalidComponents {
            provider: label.clone(),
            message,
        })?;

        let target_namespace = match &options.target_namespace {
            Some(ns) if !ns.is_empty() => ns.clone(),
            _ => objects
                .iter()
                .find(|o| kind_of(o) == "Namespace")
                .and_then(|o| o.pointer("/metadata/name"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| RepoError::TargetNamespaceUnknown {
                    provider: label.clone(),
                })?,
        };

        for object in &mut objects {
            place_in_namespace(object, &target_namespace);
            if !options.watching_namespace.is_empty() {
                set_watch_namespace(object, &options.watching_namespace);
            }
            set_label(object, PROVIDER_LABEL, &label);
        }

        Ok(Self {
            provider,
            version: version.to_string(),
            target_namespace,
            watching_namespace: options.watching_namespace.clone(),
            variables,
            objects,
            metadata: None,
        })
    }

    /// Attach the release metadata of this version
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.provider
    }

    pub fn name(&self) -> &str {
        &self.provider.name
    }

    pub fn provider_type(&self) -> ProviderType {
        self.provider.provider_type
    }

    pub fn manifest_label(&self) -> String {
        self.provider.manifest_label()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn target_namespace(&self) -> &str {
        &self.target_namespace
    }

    pub fn watching_namespace(&self) -> &str {
        &self.watching_namespace
    }

    /// Placeholder names found in the raw manifest
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    pub fn objects(&self) -> &[Value] {
        &self.objects
    }

    /// Objects installed once per provider kind
    pub fn shared_objects(&self) -> Vec<&Value> {
        self.objects.iter().filter(|o| is_shared(o)).collect()
    }

    /// Objects installed for every instance
    pub fn instance_objects(&self) -> Vec<&Value> {
        self.objects.iter().filter(|o| !is_shared(o)).collect()
    }

    /// Container images referenced by the workloads, deduplicated in order
    pub fn images(&self) -> Vec<String> {
        let mut images: Vec<String> = Vec::new();
        for object in &self.objects {
            for image in workload_images(object) {
                if !images.contains(&image) {
                    images.push(image);
                }
            }
        }
        images
    }

    /// The inventory record this install produces
    pub fn instance(&self) -> ProviderInstance {
        ProviderInstance::new(
            self.provider.name.clone(),
            self.provider.provider_type,
            self.version.clone(),
            self.target_namespace.clone(),
        )
        .watching(self.watching_namespace.clone())
    }
}

/// Parse multi-document YAML; empty documents are skipped
fn parse_objects(text: &str) -> std::result::Result<Vec<Value>, String> {
    let mut objects = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_str(text).enumerate() {
        let value = Value::deserialize(document)
            .map_err(|e| format!("document {}: {}", index + 1, e))?;
        match value {
            Value::Null => continue,
            Value::Object(_) => {
                if kind_of(&value).is_empty() {
                    return Err(format!("document {} has no kind", index + 1));
                }
                objects.push(value);
            }
            _ => return Err(format!("document {} is not a mapping", index + 1)),
        }
    }
    Ok(objects)
}

pub(crate) fn kind_of(object: &Value) -> &str {
    object.get("kind").and_then(Value::as_str).unwrap_or_default()
}

fn is_cluster_scoped(kind: &str) -> bool {
    CLUSTER_SCOPED_KINDS.contains(&kind)
}

/// Whether an object is installed once per provider kind
pub fn is_shared(object: &Value) -> bool {
    SHARED_KINDS.contains(&kind_of(object))
        || object
            .pointer(&format!("/metadata/labels/{}", LIFECYCLE_LABEL.replace('/', "~1")))
            .and_then(Value::as_str)
            == Some(SHARED_LIFECYCLE)
}

fn metadata_mut(object: &mut Value) -> Option<&mut Map<String, Value>> {
    let map = object.as_object_mut()?;
    map.entry("metadata")
        .or_insert_with(|| json!({}))
        .as_object_mut()
}

fn set_label(object: &mut Value, key: &str, value: &str) {
    if let Some(metadata) = metadata_mut(object)
        && let Some(labels) = metadata
            .entry("labels")
            .or_insert_with(|| json!({}))
            .as_object_mut()
    {
        labels.insert(key.to_string(), Value::String(value.to_string()));
    }
}

fn place_in_namespace(object: &mut Value, namespace: &str) {
    let kind = kind_of(object).to_string();
    match kind.as_str() {
        "Namespace" => {
            if let Some(metadata) = metadata_mut(object) {
                metadata.insert("name".to_string(), Value::String(namespace.to_string()));
            }
        }
        "ClusterRoleBinding" | "RoleBinding" => {
            if let Some(subjects) = object.get_mut("subjects").and_then(Value::as_array_mut) {
                for subject in subjects {
                    if subject.get("kind").and_then(Value::as_str) == Some("ServiceAccount") {
                        subject["namespace"] = Value::String(namespace.to_string());
                    }
                }
            }
        }
        "ValidatingWebhookConfiguration" | "MutatingWebhookConfiguration" => {
            if let Some(webhooks) = object.get_mut("webhooks").and_then(Value::as_array_mut) {
                for webhook in webhooks {
                    if let Some(service) = webhook.pointer_mut("/clientConfig/service")
                        && service.is_object()
                    {
                        service["namespace"] = Value::String(namespace.to_string());
                    }
                }
            }
        }
        "CustomResourceDefinition" => {
            if let Some(service) =
                object.pointer_mut("/spec/conversion/webhook/clientConfig/service")
                && service.is_object()
            {
                service["namespace"] = Value::String(namespace.to_string());
            }
        }
        _ => {}
    }

    if !is_cluster_scoped(&kind)
        && let Some(metadata) = metadata_mut(object)
    {
        metadata.insert("namespace".to_string(), Value::String(namespace.to_string()));
    }
}

fn set_watch_namespace(object: &mut Value, watch: &str) {
    if kind_of(object) != "Deployment" {
        return;
    }
    let Some(containers) = object
        .pointer_mut("/spec/template/spec/containers")
        .and_then(Value::as_array_mut)
    else {
        return;
    };

    for container in containers {
        if container.get("name").and_then(Value::as_str) != Some(MANAGER_CONTAINER) {
            continue;
        }
        let Some(container) = container.as_object_mut() else {
            continue;
        };
        let args = container.entry("args").or_insert_with(|| json!([]));
        if let Some(args) = args.as_array_mut() {
            args.retain(|a| {
                a.as_str()
                    .is_none_or(|s| s != NAMESPACE_ARG && !s.starts_with("--namespace="))
            });
            args.push(Value::String(format!("{}={}", NAMESPACE_ARG, watch)));
        }
    }
}

fn workload_images(object: &Value) -> Vec<String> {
    let pod_spec = match kind_of(object) {
        "Pod" => object.get("spec"),
        "CronJob" => object.pointer("/spec/jobTemplate/spec/template/spec"),
        _ => object.pointer("/spec/template/spec"),
    };
    let Some(pod_spec) = pod_spec else {
        return Vec::new();
    };

    ["initContainers", "containers"]
        .iter()
        .filter_map(|field| pod_spec.get(*field).and_then(Value::as_array))
        .flatten()
        .filter_map(|c| c.get("image").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}
