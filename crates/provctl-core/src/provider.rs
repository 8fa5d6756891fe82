//! Provider model: types, catalog entries and installed instances

use once_cell::sync::Lazy;
use regex::Regex;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};
use crate::scope::WatchScope;
use crate::version::parse_version;

/// DNS-1123 label, the shape every provider name must have
static PROVIDER_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("valid regex"));

const MAX_NAME_LEN: usize = 63;

/// Kind of provider.
///
/// The declaration order is the sort order used everywhere a deterministic
/// ordering of providers is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderType {
    #[serde(rename = "CoreProvider")]
    Core,
    /// Meta-core provider layered on top of the core provider
    #[serde(rename = "UndistroProvider")]
    Undistro,
    #[serde(rename = "BootstrapProvider")]
    Bootstrap,
    #[serde(rename = "ControlPlaneProvider")]
    ControlPlane,
    #[serde(rename = "InfrastructureProvider")]
    Infrastructure,
}

impl ProviderType {
    pub const ALL: [ProviderType; 5] = [
        ProviderType::Core,
        ProviderType::Undistro,
        ProviderType::Bootstrap,
        ProviderType::ControlPlane,
        ProviderType::Infrastructure,
    ];

    /// Prefix prepended to provider names to build manifest labels
    pub fn label_prefix(&self) -> &'static str {
        match self {
            ProviderType::Core | ProviderType::Undistro => "",
            ProviderType::Bootstrap => "bootstrap-",
            ProviderType::ControlPlane => "control-plane-",
            ProviderType::Infrastructure => "infrastructure-",
        }
    }

    /// Core providers root management groups
    pub fn is_core(&self) -> bool {
        matches!(self, ProviderType::Core)
    }

    /// Short lowercase name used on the command line
    pub fn short_name(&self) -> &'static str {
        match self {
            ProviderType::Core => "core",
            ProviderType::Undistro => "undistro",
            ProviderType::Bootstrap => "bootstrap",
            ProviderType::ControlPlane => "control-plane",
            ProviderType::Infrastructure => "infrastructure",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderType::Core => write!(f, "CoreProvider"),
            ProviderType::Undistro => write!(f, "UndistroProvider"),
            ProviderType::Bootstrap => write!(f, "BootstrapProvider"),
            ProviderType::ControlPlane => write!(f, "ControlPlaneProvider"),
            ProviderType::Infrastructure => write!(f, "InfrastructureProvider"),
        }
    }
}

impl FromStr for ProviderType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        ProviderType::ALL
            .into_iter()
            .find(|t| s == t.short_name() || s == t.to_string())
            .ok_or_else(|| CoreError::InvalidProviderType {
                value: s.to_string(),
            })
    }
}

/// Stable identity of a provider kind: core and undistro names pass
/// through, every other type gets a type-specific prefix.
pub fn manifest_label(name: &str, provider_type: ProviderType) -> String {
    format!("{}{}", provider_type.label_prefix(), name)
}

/// Check a provider name against DNS-1123 label rules
pub fn validate_provider_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CoreError::MissingField {
            field: "name".to_string(),
        });
    }
    if name.len() > MAX_NAME_LEN {
        return Err(CoreError::InvalidProviderName {
            name: name.to_string(),
            reason: format!("must be at most {} characters", MAX_NAME_LEN),
        });
    }
    if !PROVIDER_NAME.is_match(name) {
        return Err(CoreError::InvalidProviderName {
            name: name.to_string(),
            reason: "must consist of lowercase alphanumerics or '-', and start and end with an alphanumeric"
                .to_string(),
        });
    }
    Ok(())
}

/// Catalog key: a provider is identified by name and type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderKey {
    pub name: String,
    pub provider_type: ProviderType,
}

impl fmt::Display for ProviderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.provider_type)
    }
}

/// A catalog entry describing where a provider's manifests live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub provider_type: ProviderType,

    /// Manifest repository location
    pub url: String,

    /// Hook run after the provider's objects are installed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_hook: Option<String>,

    /// Hook run before the provider's components are processed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_config_hook: Option<String>,
}

impl ProviderConfig {
    pub fn new(
        name: impl Into<String>,
        provider_type: ProviderType,
        url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            provider_type,
            url: url.into(),
            init_hook: None,
            pre_config_hook: None,
        }
    }

    pub fn with_init_hook(mut self, hook: impl Into<String>) -> Self {
        self.init_hook = Some(hook.into());
        self
    }

    pub fn with_pre_config_hook(mut self, hook: impl Into<String>) -> Self {
        self.pre_config_hook = Some(hook.into());
        self
    }

    pub fn key(&self) -> ProviderKey {
        ProviderKey {
            name: self.name.clone(),
            provider_type: self.provider_type,
        }
    }

    pub fn manifest_label(&self) -> String {
        manifest_label(&self.name, self.provider_type)
    }

    /// Validate required fields and name syntax
    pub fn validate(&self) -> Result<()> {
        validate_provider_name(&self.name)?;
        if self.url.trim().is_empty() {
            return Err(CoreError::MissingField {
                field: format!("url (provider {})", self.name),
            });
        }
        Ok(())
    }
}

/// Inventory key: at most one instance per manifest label per namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceKey {
    pub manifest_label: String,
    pub namespace: String,
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.manifest_label)
    }
}

/// An installed provider instance, as recorded in the inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInstance {
    pub manifest_label: String,

    pub name: String,

    #[serde(rename = "type")]
    pub provider_type: ProviderType,

    /// Installed version (semver, usually with a `v` prefix)
    pub version: String,

    /// Target namespace the provider is installed in
    pub namespace: String,

    /// Watched namespace(s); empty means all namespaces
    #[serde(default)]
    pub watched_namespace: String,

    /// Opaque concurrency token assigned by the inventory store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

impl ProviderInstance {
    pub fn new(
        name: impl Into<String>,
        provider_type: ProviderType,
        version: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            manifest_label: manifest_label(&name, provider_type),
            name,
            provider_type,
            version: version.into(),
            namespace: namespace.into(),
            watched_namespace: String::new(),
            resource_version: None,
        }
    }

    /// Set the watched namespace(s)
    pub fn watching(mut self, watched_namespace: impl Into<String>) -> Self {
        self.watched_namespace = watched_namespace.into();
        self
    }

    pub fn key(&self) -> InstanceKey {
        InstanceKey {
            manifest_label: self.manifest_label.clone(),
            namespace: self.namespace.clone(),
        }
    }

    pub fn scope(&self) -> WatchScope {
        WatchScope::parse(&self.watched_namespace)
    }

    pub fn is_core(&self) -> bool {
        self.provider_type.is_core()
    }

    pub fn semver(&self) -> Result<Version> {
        parse_version(&self.version)
    }

    /// Same instance slot (manifest label and namespace)
    pub fn same_slot(&self, other: &ProviderInstance) -> bool {
        self.manifest_label == other.manifest_label && self.namespace == other.namespace
    }
}

impl fmt::Display for ProviderInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.namespace, self.manifest_label, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_label() {
        assert_eq!(manifest_label("cluster-api", ProviderType::Core), "cluster-api");
        assert_eq!(manifest_label("undistro", ProviderType::Undistro), "undistro");
        assert_eq!(manifest_label("kubeadm", ProviderType::Bootstrap), "bootstrap-kubeadm");
        assert_eq!(
            manifest_label("kubeadm", ProviderType::ControlPlane),
            "control-plane-kubeadm"
        );
        assert_eq!(
            manifest_label("aws", ProviderType::Infrastructure),
            "infrastructure-aws"
        );
    }

    #[test]
    fn test_type_order() {
        let mut types = vec![
            ProviderType::Infrastructure,
            ProviderType::Core,
            ProviderType::ControlPlane,
            ProviderType::Undistro,
            ProviderType::Bootstrap,
        ];
        types.sort();
        assert_eq!(types, ProviderType::ALL.to_vec());
    }

    #[test]
    fn test_type_from_str() {
        assert_eq!("core".parse::<ProviderType>().unwrap(), ProviderType::Core);
        assert_eq!(
            "InfrastructureProvider".parse::<ProviderType>().unwrap(),
            ProviderType::Infrastructure
        );
        assert!("network".parse::<ProviderType>().is_err());
    }

    #[test]
    fn test_type_serde() {
        let json = serde_json::to_string(&ProviderType::ControlPlane).unwrap();
        assert_eq!(json, "\"ControlPlaneProvider\"");
    }

    #[test]
    fn test_validate_provider_name() {
        assert!(validate_provider_name("cluster-api").is_ok());
        assert!(validate_provider_name("aws2").is_ok());
        assert!(matches!(
            validate_provider_name(""),
            Err(CoreError::MissingField { .. })
        ));
        assert!(validate_provider_name("Docker").is_err());
        assert!(validate_provider_name("-docker").is_err());
        assert!(validate_provider_name("docker_1").is_err());
        assert!(validate_provider_name(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_config_validate() {
        let config = ProviderConfig::new("docker", ProviderType::Infrastructure, "");
        let err = config.validate().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_instance_defaults() {
        let instance = ProviderInstance::new("aws", ProviderType::Infrastructure, "v1.0.0", "capa")
            .watching("ns1");
        assert_eq!(instance.manifest_label, "infrastructure-aws");
        assert_eq!(instance.key().to_string(), "capa/infrastructure-aws");
        assert_eq!(instance.to_string(), "capa/infrastructure-aws@v1.0.0");
        assert!(!instance.scope().is_all());
    }

    #[test]
    fn test_instance_yaml_roundtrip_omits_token() {
        let instance = ProviderInstance::new("cluster-api", ProviderType::Core, "v1.0.0", "capi");
        let yaml = serde_yaml::to_string(&instance).unwrap();
        assert!(yaml.contains("type: CoreProvider"));
        assert!(!yaml.contains("resourceVersion"));
    }
}
