//! Error types for repository operations

use provctl_core::{CoreError, ProviderType};
use thiserror::Error;

/// Repository operation errors
#[derive(Debug, Error)]
pub enum RepoError {
    // ============ Configuration Errors ============
    #[error("Provider not found in catalog: {name} ({provider_type})")]
    ProviderNotFound {
        name: String,
        provider_type: ProviderType,
    },

    #[error("No catalog entry for manifest label {label}")]
    LabelNotFound { label: String },

    #[error("Invalid repository URL: {url} - {reason}")]
    InvalidRepositoryUrl { url: String, reason: String },

    #[error("Invalid provider configuration: {message}")]
    InvalidConfig { message: String },

    #[error(transparent)]
    Core(#[from] CoreError),

    // ============ Network Errors ============
    #[error("HTTP error: {status} - {url}")]
    HttpError { status: u16, url: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Request timeout after {seconds}s while {operation}")]
    Timeout { operation: String, seconds: u64 },

    // ============ Repository Content Errors ============
    #[error("File {path} not found for version {version} in {repository}")]
    FileNotFound {
        repository: String,
        version: String,
        path: String,
    },

    #[error("No versions available for provider {label}")]
    NoVersionsAvailable { label: String },

    #[error("Invalid repository index at {url}: {message}")]
    InvalidIndex { url: String, message: String },

    /// Wraps a fetch failure with the provider, version and path involved
    #[error("failed to fetch {path} for {provider}@{version}: {source}")]
    Fetch {
        provider: String,
        version: String,
        path: String,
        #[source]
        source: Box<RepoError>,
    },

    // ============ Components Errors ============
    #[error("Missing value(s) for variable(s) {} required by {provider}", .variables.join(", "))]
    MissingVariables {
        provider: String,
        variables: Vec<String>,
    },

    #[error("Invalid components for {provider}: {message}")]
    InvalidComponents { provider: String, message: String },

    #[error(
        "Target namespace for {provider} cannot be determined: set one explicitly or add a Namespace object to the manifest"
    )]
    TargetNamespaceUnknown { provider: String },

    // ============ Hook Errors ============
    #[error("Hook not registered: {name}")]
    HookNotFound { name: String },

    #[error("Hook '{name}' failed: {message}")]
    HookFailed { name: String, message: String },

    // ============ IO Errors ============
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, RepoError>;

impl RepoError {
    /// Transient failures the caller may retry
    pub fn is_retryable(&self) -> bool {
        match self {
            RepoError::Timeout { .. } | RepoError::NetworkError { .. } => true,
            RepoError::HttpError { status, .. } => *status == 429 || *status >= 500,
            RepoError::Fetch { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Configuration errors: never retried, surfaced immediately
    pub fn is_configuration(&self) -> bool {
        match self {
            RepoError::ProviderNotFound { .. }
            | RepoError::LabelNotFound { .. }
            | RepoError::InvalidRepositoryUrl { .. }
            | RepoError::InvalidConfig { .. }
            | RepoError::HookNotFound { .. } => true,
            RepoError::Core(e) => e.is_configuration(),
            _ => false,
        }
    }

    /// Whether the underlying cause is a missing file
    pub fn is_not_found(&self) -> bool {
        match self {
            RepoError::FileNotFound { .. } => true,
            RepoError::Fetch { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for RepoError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RepoError::Timeout {
                operation: e
                    .url()
                    .map(|u| format!("requesting {}", u))
                    .unwrap_or_else(|| "sending request".to_string()),
                seconds: 0,
            }
        } else if let Some(status) = e.status() {
            RepoError::HttpError {
                status: status.as_u16(),
                url: e.url().map(|u| u.to_string()).unwrap_or_default(),
            }
        } else {
            RepoError::NetworkError {
                message: e.to_string(),
            }
        }
    }
}

impl From<serde_yaml::Error> for RepoError {
    fn from(e: serde_yaml::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(e: serde_json::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}

impl From<url::ParseError> for RepoError {
    fn from(e: url::ParseError) -> Self {
        RepoError::InvalidRepositoryUrl {
            url: String::new(),
            reason: e.to_string(),
        }
    }
}
