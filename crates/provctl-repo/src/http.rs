//! HTTP repository implementation
//!
//! Layout served over HTTP(S):
//! - `{base}/index.yaml` lists published versions (`versions: [v1.0.0, ...]`)
//! - `{base}/{version}/{file}` serves the files of one release

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::error::{RepoError, Result};
use crate::repository::{LATEST, Repository};

const INDEX_FILE: &str = "index.yaml";

/// Version listing served at the repository root
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionIndex {
    #[serde(default)]
    pub versions: Vec<String>,

    /// Optional explicit default; otherwise [`LATEST`]
    #[serde(default)]
    pub default_version: Option<String>,
}

/// HTTP repository client
pub struct HttpRepository {
    base: Url,
    url: String,
    client: reqwest::Client,
}

impl HttpRepository {
    pub fn new(base: Url) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("provctl/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let url = base.as_str().trim_end_matches('/').to_string();
        Ok(Self { base, url, client })
    }

    fn join(&self, path: &str) -> Result<Url> {
        let mut base = self.base.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(base.join(path)?)
    }

    async fn get_bytes(&self, url: Url) -> Result<Option<Vec<u8>>> {
        let response = self.client.get(url.clone()).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if !status.is_success() => Err(RepoError::HttpError {
                status: status.as_u16(),
                url: url.to_string(),
            }),
            _ => Ok(Some(response.bytes().await?.to_vec())),
        }
    }

    /// Fetch and parse the version index
    pub async fn fetch_index(&self) -> Result<VersionIndex> {
        let url = self.join(INDEX_FILE)?;
        let data = self
            .get_bytes(url.clone())
            .await?
            .ok_or_else(|| RepoError::InvalidIndex {
                url: url.to_string(),
                message: "index not found".to_string(),
            })?;
        serde_yaml::from_slice(&data).map_err(|e| RepoError::InvalidIndex {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl Repository for HttpRepository {
    fn url(&self) -> &str {
        &self.url
    }

    fn default_version(&self) -> &str {
        LATEST
    }

    async fn versions(&self) -> Result<Vec<String>> {
        Ok(self.fetch_index().await?.versions)
    }

    async fn get_file(&self, version: &str, path: &str) -> Result<Vec<u8>> {
        let url = self.join(&format!("{}/{}", version, path))?;
        tracing::debug!(%url, "fetching repository file");
        self.get_bytes(url).await?.ok_or_else(|| RepoError::FileNotFound {
            repository: self.url.clone(),
            version: version.to_string(),
            path: path.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn repo(server: &MockServer) -> HttpRepository {
        let base = Url::parse(&format!("{}/docker", server.uri())).unwrap();
        HttpRepository::new(base).unwrap()
    }

    #[tokio::test]
    async fn test_versions_from_index() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/docker/index.yaml"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("versions:\n  - v1.0.0\n  - v1.1.0\n"),
            )
            .mount(&server)
            .await;

        let repo = repo(&server).await;
        assert_eq!(repo.versions().await.unwrap(), vec!["v1.0.0", "v1.1.0"]);
    }

    #[tokio::test]
    async fn test_get_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/docker/v1.1.0/metadata.yaml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("kind: Metadata"))
            .mount(&server)
            .await;

        let repo = repo(&server).await;
        let data = repo.get_file("v1.1.0", "metadata.yaml").await.unwrap();
        assert_eq!(data, b"kind: Metadata");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let repo = repo(&server).await;
        let err = repo.get_file("v1.1.0", "metadata.yaml").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let repo = repo(&server).await;
        let err = repo.get_file("v1.1.0", "components.yaml").await.unwrap_err();
        assert!(matches!(err, RepoError::HttpError { status: 503, .. }));
        assert!(err.is_retryable());
    }
}
