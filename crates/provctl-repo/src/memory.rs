//! In-memory repository for testing
//!
//! Serves files from a map, useful for unit tests without a filesystem
//! or HTTP server. Fetches are recorded for assertions.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use crate::error::{RepoError, Result};
use crate::repository::{COMPONENTS_FILE, LATEST, METADATA_FILE, Repository};

/// In-memory repository
#[derive(Clone)]
pub struct MemoryRepository {
    url: String,
    default_version: String,
    /// version -> path -> content
    files: Arc<RwLock<BTreeMap<String, BTreeMap<String, Vec<u8>>>>>,
    /// Extra versions listed without any file
    listed: Arc<RwLock<BTreeSet<String>>>,
    fetches: Arc<RwLock<Vec<(String, String)>>>,
}

impl MemoryRepository {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            default_version: LATEST.to_string(),
            files: Arc::new(RwLock::new(BTreeMap::new())),
            listed: Arc::new(RwLock::new(BTreeSet::new())),
            fetches: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn with_default_version(mut self, version: impl Into<String>) -> Self {
        self.default_version = version.into();
        self
    }

    /// Add a file for a version (the version becomes listed)
    pub fn with_file(self, version: &str, path: &str, content: impl Into<Vec<u8>>) -> Self {
        self.files
            .write()
            .unwrap()
            .entry(version.to_string())
            .or_default()
            .insert(path.to_string(), content.into());
        self
    }

    pub fn with_metadata(self, version: &str, yaml: &str) -> Self {
        self.with_file(version, METADATA_FILE, yaml)
    }

    pub fn with_components(self, version: &str, yaml: &str) -> Self {
        self.with_file(version, COMPONENTS_FILE, yaml)
    }

    /// List a version that has no files
    pub fn with_version(self, version: &str) -> Self {
        self.listed.write().unwrap().insert(version.to_string());
        self
    }

    /// Every `(version, path)` fetched so far, in order
    pub fn fetches(&self) -> Vec<(String, String)> {
        self.fetches.read().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.read().unwrap().len()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    fn url(&self) -> &str {
        &self.url
    }

    fn default_version(&self) -> &str {
        &self.default_version
    }

    async fn versions(&self) -> Result<Vec<String>> {
        let mut versions: BTreeSet<String> = self.files.read().unwrap().keys().cloned().collect();
        versions.extend(self.listed.read().unwrap().iter().cloned());
        Ok(versions.into_iter().collect())
    }

    async fn get_file(&self, version: &str, path: &str) -> Result<Vec<u8>> {
        self.fetches
            .write()
            .unwrap()
            .push((version.to_string(), path.to_string()));

        self.files
            .read()
            .unwrap()
            .get(version)
            .and_then(|files| files.get(path))
            .cloned()
            .ok_or_else(|| RepoError::FileNotFound {
                repository: self.url.clone(),
                version: version.to_string(),
                path: path.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_repository() {
        let repo = MemoryRepository::new("memory://docker")
            .with_metadata("v1.0.0", "kind: Metadata")
            .with_version("v0.9.0");

        assert_eq!(repo.versions().await.unwrap(), vec!["v0.9.0", "v1.0.0"]);
        assert_eq!(repo.get_file("v1.0.0", METADATA_FILE).await.unwrap(), b"kind: Metadata");
        assert!(repo.get_file("v0.9.0", METADATA_FILE).await.unwrap_err().is_not_found());
        assert_eq!(repo.fetch_count(), 2);
    }
}
