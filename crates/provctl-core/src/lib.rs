//! Provctl Core - Core types for managing cluster providers
//!
//! This crate provides the foundational, I/O-free pieces of provctl:
//! - `ProviderType`, `ProviderConfig`, `ProviderInstance`: the provider model
//! - `WatchScope`: watched-namespace sets and their overlap rules
//! - `Metadata`: release series mapping versions to contracts
//! - `ManagementGroup`: clustering of installed providers around core providers
//! - `Violations`: aggregated topology and contract diagnostics

pub mod contract;
pub mod error;
pub mod group;
pub mod metadata;
pub mod provider;
pub mod scope;
pub mod version;
pub mod violation;

pub use contract::{MetadataIndex, check_group_contracts, check_members_contracts};
pub use error::{CoreError, Result};
pub use group::{ManagementGroup, collect_management_groups, find_group, resolve_management_groups};
pub use metadata::{Metadata, ReleaseSeries};
pub use provider::{
    InstanceKey, ProviderConfig, ProviderInstance, ProviderKey, ProviderType, manifest_label,
    validate_provider_name,
};
pub use scope::WatchScope;
pub use version::{is_newer, latest_version, parse_version};
pub use violation::{Violation, ViolationKind, Violations};
