//! Error types for provctl-kube

use provctl_core::{CoreError, Violations};
use provctl_repo::RepoError;
use thiserror::Error;

use crate::report::ApplyReport;

/// Result type for provctl-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur while installing or upgrading providers
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Configuration or topology error from the provider model
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Repository, components or hook error
    #[error(transparent)]
    Repo(#[from] RepoError),

    /// Inventory write lost a compare-and-swap race
    #[error(
        "inventory conflict for {manifest_label} in namespace '{namespace}': {message}\nHint: re-run the command to pick up the current inventory"
    )]
    Conflict {
        manifest_label: String,
        namespace: String,
        message: String,
    },

    /// Core provider named by an upgrade is not installed
    #[error("core provider {provider} is not installed")]
    CoreProviderNotFound { provider: String },

    /// No upgrade plan exists for the requested contract
    #[error("no upgrade plan for contract '{contract}' in the management group of {core}")]
    ContractNotFound { core: String, contract: String },

    /// Object application failed
    #[error("failed to apply {object}: {message}")]
    ApplyFailed { object: String, message: String },

    /// Some items were applied, others failed
    #[error("{0}")]
    PartialApply(ApplyReport),

    /// Storage error
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl KubeError {
    /// Transient failures the caller may retry
    pub fn is_retryable(&self) -> bool {
        match self {
            KubeError::Conflict { .. } => true,
            KubeError::Repo(e) => e.is_retryable(),
            KubeError::Api(kube::Error::Api(e)) => e.code == 409 || e.code == 429 || e.code >= 500,
            _ => false,
        }
    }

    /// Aggregated violations carried by a topology error
    pub fn violations(&self) -> Option<&Violations> {
        match self {
            KubeError::Core(e) => e.violations(),
            _ => None,
        }
    }

    pub fn is_configuration(&self) -> bool {
        match self {
            KubeError::Core(e) => e.is_configuration(),
            KubeError::Repo(e) => e.is_configuration(),
            _ => false,
        }
    }

    pub(crate) fn conflict(
        manifest_label: &str,
        namespace: &str,
        message: impl Into<String>,
    ) -> Self {
        KubeError::Conflict {
            manifest_label: manifest_label.to_string(),
            namespace: namespace.to_string(),
            message: message.into(),
        }
    }
}

impl From<Violations> for KubeError {
    fn from(violations: Violations) -> Self {
        KubeError::Core(CoreError::Topology(violations))
    }
}

impl From<serde_json::Error> for KubeError {
    fn from(e: serde_json::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}
