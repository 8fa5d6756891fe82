//! CLI error types with exit code handling
//!
//! This module provides a unified error type for CLI operations that
//! maps errors to appropriate exit codes.

use miette::Diagnostic;
use provctl_core::CoreError;
use provctl_kube::KubeError;
use provctl_repo::RepoError;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Topology or contract violations
    #[error("Validation failed: {message}")]
    #[diagnostic(code(provctl::cli::validation))]
    Validation {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Bad catalog entry, provider name or repository URL
    #[error("Configuration error: {message}")]
    #[diagnostic(code(provctl::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Invalid command line input
    #[error("{message}")]
    #[diagnostic(code(provctl::cli::usage))]
    Usage { message: String },

    /// Repository fetch failure
    #[error("Repository error: {message}")]
    #[diagnostic(code(provctl::cli::repository))]
    Repository { message: String, retryable: bool },

    /// Some items were applied, others failed
    #[error("{message}")]
    #[diagnostic(
        code(provctl::cli::partial),
        help(
            "applied items are not rolled back; re-run `provctl upgrade plan` to see where each provider stands"
        )
    )]
    PartialApply { message: String, retryable: bool },

    /// Inventory write lost a race with another writer
    #[error("{message}")]
    #[diagnostic(
        code(provctl::cli::conflict),
        help("re-run the command to pick up the current inventory")
    )]
    Conflict { message: String },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(provctl::cli::io))]
    Io { message: String },

    /// Anything else
    #[error("{message}")]
    #[diagnostic(code(provctl::cli::error))]
    Other { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Validation { .. } => exit_codes::VALIDATION_ERROR,
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Repository { retryable: true, .. } => exit_codes::TEMP_FAILURE,
            CliError::Repository { .. } => exit_codes::REPOSITORY_ERROR,
            CliError::PartialApply { retryable: true, .. } => exit_codes::TEMP_FAILURE,
            CliError::PartialApply { .. } => exit_codes::PARTIAL_APPLY,
            CliError::Conflict { .. } => exit_codes::TEMP_FAILURE,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Other { .. } => exit_codes::ERROR,
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }
}

impl From<RepoError> for CliError {
    fn from(err: RepoError) -> Self {
        if err.is_configuration() {
            return CliError::Config {
                message: err.to_string(),
                help: match &err {
                    RepoError::ProviderNotFound { .. } | RepoError::LabelNotFound { .. } => {
                        Some("add the provider to your catalog file (--catalog)".to_string())
                    }
                    RepoError::HookNotFound { .. } => {
                        Some("provctl registers no hooks; drop it from the catalog".to_string())
                    }
                    _ => None,
                },
            };
        }
        match err {
            RepoError::MissingVariables { .. } => CliError::Config {
                message: err.to_string(),
                help: Some(
                    "set the variables in the environment or a --variables file".to_string(),
                ),
            },
            RepoError::Io(e) => CliError::Io { message: e.to_string() },
            other => CliError::Repository {
                retryable: other.is_retryable(),
                message: other.to_string(),
            },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match &err {
            CoreError::Topology(_) => CliError::Validation {
                message: err.to_string(),
                help: Some("fix every listed violation; nothing was changed".to_string()),
            },
            _ if err.is_configuration() => CliError::Config {
                message: err.to_string(),
                help: None,
            },
            _ => CliError::Other {
                message: err.to_string(),
            },
        }
    }
}

impl From<KubeError> for CliError {
    fn from(err: KubeError) -> Self {
        match err {
            KubeError::Core(e) => e.into(),
            KubeError::Repo(e) => e.into(),
            KubeError::Conflict { .. } => CliError::Conflict {
                message: err.to_string(),
            },
            KubeError::PartialApply(report) => CliError::PartialApply {
                retryable: report.failed.iter().all(|f| f.retryable),
                message: report.to_string(),
            },
            KubeError::CoreProviderNotFound { .. } | KubeError::ContractNotFound { .. } => {
                CliError::usage(err.to_string())
            }
            KubeError::Io(e) => CliError::Io { message: e.to_string() },
            other => CliError::Other {
                message: other.to_string(),
            },
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
