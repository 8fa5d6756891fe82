//! Provctl Repository Management
//!
//! This crate provides everything between the provider catalog and a
//! processed install manifest:
//!
//! - **Catalog**: built-in providers merged with user definitions
//! - **Repositories**: HTTP(S), local directory and in-memory backends
//! - **Overrides**: local files shadowing repository files
//! - **Components**: `${VAR}` resolution, namespace placement, shared/instance split
//!
//! ## Example
//!
//! ```rust,no_run
//! use provctl_core::ProviderType;
//! use provctl_repo::{ComponentsOptions, ProviderCatalog, Repositories};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let repositories = Repositories::new(ProviderCatalog::load(None)?);
//!
//! let components = repositories
//!     .components("docker", ProviderType::Infrastructure, &ComponentsOptions::new())
//!     .await?;
//! println!("{} images", components.images().len());
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod client;
pub mod components;
pub mod error;
pub mod file;
pub mod hooks;
pub mod http;
pub mod memory;
pub mod overrides;
pub mod repository;
pub mod variables;

// Re-exports for convenience
pub use catalog::{CatalogFile, ProviderCatalog};
pub use client::{DEFAULT_FETCH_TIMEOUT, FetchOptions, Repositories, RepositoryClient};
pub use components::{
    Components, ComponentsOptions, LIFECYCLE_LABEL, PROVIDER_LABEL, SHARED_LIFECYCLE, is_shared,
};
pub use error::{RepoError, Result};
pub use file::FileRepository;
pub use hooks::{HookRegistry, InitHook, PreConfigHook};
pub use http::HttpRepository;
pub use memory::MemoryRepository;
pub use overrides::Overrides;
pub use repository::{COMPONENTS_FILE, LATEST, METADATA_FILE, Repository, create_repository};
pub use variables::{EnvVariables, LayeredVariables, MapVariables, VariableSource, substitute};
