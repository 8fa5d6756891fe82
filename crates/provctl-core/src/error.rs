//! Core error types

use thiserror::Error;

use crate::violation::Violations;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid provider name '{name}': {reason}")]
    InvalidProviderName { name: String, reason: String },

    #[error("Invalid provider type: {value}")]
    InvalidProviderType { value: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid version '{version}': {message}")]
    InvalidVersion { version: String, message: String },

    #[error("Invalid metadata: {message}")]
    InvalidMetadata { message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("{0}")]
    Topology(Violations),
}

impl CoreError {
    /// Violations carried by a topology error, if this is one
    pub fn violations(&self) -> Option<&Violations> {
        match self {
            CoreError::Topology(v) => Some(v),
            _ => None,
        }
    }

    /// Configuration errors are surfaced immediately and never retried
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidProviderName { .. }
                | CoreError::InvalidProviderType { .. }
                | CoreError::MissingField { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
