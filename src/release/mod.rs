//! Release resolver: asks the GitHub REST API for the latest published
//! release of a repository.

pub mod error;
pub mod types;

pub use error::ReleaseError;
pub use types::Release;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolves a repository identifier (`owner/name`) to its latest release.
///
/// Implementations hold no per-call state, so one instance is shared by all
/// concurrently running work items.
#[async_trait]
pub trait ReleaseResolver: Send + Sync {
    async fn resolve_latest(&self, repository: &str) -> Result<Release, ReleaseError>;
}

/// Build the HTTP client shared by the resolver and the asset fetcher.
///
/// GitHub rejects requests without a `User-Agent`, so one is always set.
/// `timeout` bounds a whole request including the body; `None` leaves large
/// downloads unbounded.
pub fn build_client(timeout: Option<Duration>) -> reqwest::Result<Client> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/vnd.github+json"),
    );

    let mut builder = Client::builder()
        .user_agent(concat!("asset-downloader/", env!("CARGO_PKG_VERSION")))
        .default_headers(default_headers)
        .connect_timeout(CONNECT_TIMEOUT);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build()
}

/// Resolver backed by the GitHub releases API.
#[derive(Debug, Clone)]
pub struct GithubResolver {
    client: Client,
    api_url: String,
}

impl GithubResolver {
    pub fn new(client: Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    fn latest_release_url(&self, repository: &str) -> String {
        format!("{}/repos/{}/releases/latest", self.api_url, repository)
    }
}

#[async_trait]
impl ReleaseResolver for GithubResolver {
    async fn resolve_latest(&self, repository: &str) -> Result<Release, ReleaseError> {
        let url = self.latest_release_url(repository);
        tracing::debug!(repo = repository, %url, "resolving latest release");

        let network = |source: reqwest::Error| ReleaseError::Network {
            repository: repository.to_string(),
            source,
        };

        let response = self.client.get(&url).send().await.map_err(network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ReleaseError::Status {
                repository: repository.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(network)?;
        let release: Release =
            serde_json::from_slice(&body).map_err(|source| ReleaseError::Decode {
                repository: repository.to_string(),
                source,
            })?;

        tracing::debug!(
            repo = repository,
            tag = %release.tag_name,
            assets = release.assets.len(),
            "resolved latest release"
        );
        Ok(release)
    }
}
