//! Local override files
//!
//! A file at `<root>/<manifestLabel>/<version>/<path>` shadows the
//! repository file for that tuple; the repository is then never consulted.

use std::path::{Path, PathBuf};

use crate::error::Result;

/// Local override directory
#[derive(Debug, Clone)]
pub struct Overrides {
    root: PathBuf,
}

impl Overrides {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default location: `<config dir>/provctl/overrides`
    pub fn default_location() -> Option<Self> {
        dirs::config_dir().map(|d| Self::new(d.join("provctl").join("overrides")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, manifest_label: &str, version: &str, path: &str) -> PathBuf {
        self.root.join(manifest_label).join(version).join(path)
    }

    /// Read the override for a tuple, `None` when there is none
    pub async fn get(
        &self,
        manifest_label: &str,
        version: &str,
        path: &str,
    ) -> Result<Option<Vec<u8>>> {
        let file = self.path_for(manifest_label, version, path);
        match tokio::fs::read(&file).await {
            Ok(data) => {
                tracing::debug!(path = %file.display(), "using local override");
                Ok(Some(data))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_override_lookup() {
        let dir = TempDir::new().unwrap();
        let overrides = Overrides::new(dir.path());
        let file = overrides.path_for("infrastructure-docker", "v1.0.0", "metadata.yaml");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, "local").unwrap();

        let hit = overrides
            .get("infrastructure-docker", "v1.0.0", "metadata.yaml")
            .await
            .unwrap();
        assert_eq!(hit.as_deref(), Some(&b"local"[..]));

        let miss = overrides
            .get("infrastructure-docker", "v1.1.0", "metadata.yaml")
            .await
            .unwrap();
        assert!(miss.is_none());
    }
}
