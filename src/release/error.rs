use thiserror::Error;

/// Errors from resolving the latest release of a repository.
#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("Request for latest release of {repository} failed: {source}")]
    Network {
        repository: String,
        source: reqwest::Error,
    },

    #[error("Release API returned HTTP {status} for {repository}")]
    Status { repository: String, status: u16 },

    #[error("Malformed release response for {repository}: {source}")]
    Decode {
        repository: String,
        source: serde_json::Error,
    },
}
