use std::path::PathBuf;

use thiserror::Error;

use crate::records::RecordError;
use crate::release::ReleaseError;

/// Typed asset-fetch errors enabling retry classification.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP {status} downloading {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Transfer of {url} failed after {bytes_written} bytes: {source}")]
    Http {
        source: reqwest::Error,
        url: String,
        bytes_written: u64,
    },

    #[error("Disk error on {path}: {source}")]
    Disk {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl DownloadError {
    /// Whether this error is transient and worth retrying.
    ///
    /// Rate limits and server errors are retried, as are transport failures.
    /// Client errors and local disk failures are permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            DownloadError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            DownloadError::Http { .. } => true,
            DownloadError::Disk { .. } => false,
        }
    }
}

/// Why a single work item failed, tagged with the step that failed.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("loading record: {0}")]
    LoadRecord(#[source] RecordError),

    #[error("getting release: {0}")]
    Resolve(#[source] ReleaseError),

    #[error("release {tag} of {repository} has no asset named {filename}")]
    AssetNotFound {
        repository: String,
        tag: String,
        filename: String,
    },

    #[error("downloading asset: {0}")]
    Fetch(#[source] DownloadError),

    #[error("writing record: {0}")]
    WriteRecord(#[source] RecordError),
}
