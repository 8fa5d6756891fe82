//! Local directory repository
//!
//! Layout: `<root>/<version>/<file>`, e.g. `docker/v1.0.0/components.yaml`.
//! Useful for development, air-gapped installs and tests.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::{RepoError, Result};
use crate::repository::{LATEST, Repository};

/// File-based repository
pub struct FileRepository {
    root: PathBuf,
    url: String,
}

impl FileRepository {
    pub fn new(root: PathBuf) -> Self {
        let url = root.display().to_string();
        Self { root, url }
    }
}

#[async_trait]
impl Repository for FileRepository {
    fn url(&self) -> &str {
        &self.url
    }

    fn default_version(&self) -> &str {
        LATEST
    }

    async fn versions(&self) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut versions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir()
                && let Some(name) = entry.file_name().to_str()
            {
                versions.push(name.to_string());
            }
        }
        versions.sort();
        Ok(versions)
    }

    async fn get_file(&self, version: &str, path: &str) -> Result<Vec<u8>> {
        let file = self.root.join(version).join(path);
        match tokio::fs::read(&file).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RepoError::FileNotFound {
                repository: self.url.clone(),
                version: version.to_string(),
                path: path.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> TempDir {
        let dir = TempDir::new().unwrap();
        for version in ["v1.0.0", "v1.1.0"] {
            let vdir = dir.path().join(version);
            std::fs::create_dir_all(&vdir).unwrap();
            std::fs::write(vdir.join("metadata.yaml"), format!("# {}", version)).unwrap();
        }
        std::fs::write(dir.path().join("README.md"), "not a version").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_versions_lists_directories() {
        let dir = setup();
        let repo = FileRepository::new(dir.path().to_path_buf());
        assert_eq!(repo.versions().await.unwrap(), vec!["v1.0.0", "v1.1.0"]);
    }

    #[tokio::test]
    async fn test_get_file() {
        let dir = setup();
        let repo = FileRepository::new(dir.path().to_path_buf());
        let data = repo.get_file("v1.1.0", "metadata.yaml").await.unwrap();
        assert_eq!(data, b"# v1.1.0");
    }

    #[tokio::test]
    async fn test_get_missing_file() {
        let dir = setup();
        let repo = FileRepository::new(dir.path().to_path_buf());
        let err = repo.get_file("v1.0.0", "components.yaml").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
