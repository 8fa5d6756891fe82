//! Unified repository trait
//!
//! A repository serves versioned files for one provider. Two paths matter:
//! `components.yaml` (install manifest) and `metadata.yaml` (release series).

use async_trait::async_trait;
use provctl_core::ProviderConfig;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

use crate::error::{RepoError, Result};
use crate::file::FileRepository;
use crate::http::HttpRepository;

/// Install manifest path
pub const COMPONENTS_FILE: &str = "components.yaml";

/// Release-series metadata path
pub const METADATA_FILE: &str = "metadata.yaml";

/// Version alias resolved to the highest released version
pub const LATEST: &str = "latest";

/// Manifest repository backend
#[async_trait]
pub trait Repository: Send + Sync {
    /// Repository location, for diagnostics
    fn url(&self) -> &str;

    /// Version used when none is requested; may be [`LATEST`]
    fn default_version(&self) -> &str;

    /// All published versions
    async fn versions(&self) -> Result<Vec<String>>;

    /// Fetch a file for a concrete version.
    ///
    /// Missing files yield [`RepoError::FileNotFound`].
    async fn get_file(&self, version: &str, path: &str) -> Result<Vec<u8>>;
}

/// Create a repository backend for a catalog entry (HTTP(S), `file://` or a local path)
pub fn create_repository(provider: &ProviderConfig) -> Result<Arc<dyn Repository>> {
    let raw = provider.url.trim();
    if raw.starts_with('/') || raw.starts_with("./") || raw.starts_with("../") {
        return Ok(Arc::new(FileRepository::new(PathBuf::from(raw))));
    }

    let url = Url::parse(raw).map_err(|e| RepoError::InvalidRepositoryUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(Arc::new(HttpRepository::new(url)?)),
        "file" => {
            let path = url.to_file_path().map_err(|_| RepoError::InvalidRepositoryUrl {
                url: raw.to_string(),
                reason: "not a valid local path".to_string(),
            })?;
            Ok(Arc::new(FileRepository::new(path)))
        }
        other => Err(RepoError::InvalidRepositoryUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}
