//! HTTP client for the upstream PyPI JSON API.
//!
//! Two lookups exist: the per-package release index
//! (`{base}/{name}/json`) and the per-wheel core metadata file
//! (`{wheel_url}.metadata`, PEP 658). The base URL is a constructor
//! parameter so tests can point the engine at a mock server.

use crate::error::Result;
use crate::metadata::WheelMetadata;
use wheelbridge_schema::{PackageName, ProjectReleases};

/// Production PyPI JSON API base.
pub const PYPI_INDEX_BASE: &str = "https://pypi.org/pypi";

/// Asynchronous client for the upstream index. Cheap to clone; all clones
/// share one connection pool.
#[derive(Debug, Clone)]
pub struct PypiClient {
    client: reqwest::Client,
    index_base: String,
}

impl Default for PypiClient {
    fn default() -> Self {
        Self::new(PYPI_INDEX_BASE)
    }
}

impl PypiClient {
    /// Create a client against `index_base` (no trailing slash required).
    pub fn new(index_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            index_base: index_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the full release list for a package.
    ///
    /// # Errors
    ///
    /// [`crate::Error::UpstreamUnavailable`] on any transport or non-2xx
    /// failure; a missing package is a 404 and therefore also an error here,
    /// matching the upstream contract.
    pub async fn fetch_releases(&self, name: &PackageName) -> Result<ProjectReleases> {
        let url = format!("{}/{name}/json", self.index_base);
        let resp = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    /// Fetch and parse the core metadata published next to a wheel.
    ///
    /// # Errors
    ///
    /// [`crate::Error::UpstreamUnavailable`] on transport or non-2xx failure.
    pub async fn fetch_wheel_metadata(&self, wheel_url: &str) -> Result<WheelMetadata> {
        let resp = self
            .client
            .get(format!("{wheel_url}.metadata"))
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .send()
            .await?
            .error_for_status()?;
        let text = resp.text().await?;
        Ok(WheelMetadata::parse(&text))
    }

    /// The underlying HTTP client, shared with the artifact downloader.
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_releases() {
        let mut server = mockito::Server::new_async().await;

        let mock_body = r#"{
            "releases": {
                "3.7.2": [
                    {
                        "filename": "niquests-3.7.2-py3-none-any.whl",
                        "url": "https://files.example.invalid/niquests-3.7.2-py3-none-any.whl",
                        "size": 122880,
                        "digests": {"md5": "aa", "sha256": "bb"},
                        "upload_time_iso_8601": "2024-06-24T18:02:31Z",
                        "requires_python": ">=3.7"
                    }
                ]
            }
        }"#;

        let _m = server
            .mock("GET", "/niquests/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(mock_body)
            .create_async()
            .await;

        let client = PypiClient::new(server.url());
        let project = client
            .fetch_releases(&PackageName::new("niquests"))
            .await
            .unwrap();
        assert_eq!(project.releases.len(), 1);
        assert!(project.releases["3.7.2"][0].is_wheel());
    }

    #[tokio::test]
    async fn test_missing_package_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/nope/json")
            .with_status(404)
            .create_async()
            .await;

        let client = PypiClient::new(server.url());
        let err = client
            .fetch_releases(&PackageName::new("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn test_fetch_wheel_metadata() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/wheels/niquests-3.7.2-py3-none-any.whl.metadata")
            .with_status(200)
            .with_body("Name: niquests\nLicense: Apache-2.0\nRequires-Dist: idna\n")
            .create_async()
            .await;

        let client = PypiClient::new(server.url());
        let url = format!("{}/wheels/niquests-3.7.2-py3-none-any.whl", server.url());
        let meta = client.fetch_wheel_metadata(&url).await.unwrap();
        assert_eq!(meta.requires_dist, vec!["idna"]);
        assert_eq!(meta.license_summary(), "Apache-2.0");
    }
}
