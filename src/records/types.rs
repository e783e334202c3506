//! Types for the record store.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Persisted state for one (repository, filename, destination) triple.
///
/// `identifier` is always derived from the other three identity fields, so a
/// record can be located again without any separate index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub repository_name: String,
    pub file_name: String,
    /// Destination directory, normalized to end with a path separator.
    pub download_path: String,
    /// Empty until the first successful download.
    #[serde(default)]
    pub last_downloaded_tag: String,
    #[serde(default)]
    pub author_name: String,
    #[serde(rename = "uuid")]
    pub identifier: String,
}

impl Record {
    /// A fresh record that has never been downloaded.
    pub fn new(repository: &str, filename: &str, destination: &str) -> Self {
        Self {
            repository_name: repository.to_string(),
            file_name: filename.to_string(),
            download_path: destination.to_string(),
            last_downloaded_tag: String::new(),
            author_name: String::new(),
            identifier: super::identifier_for(repository, filename, destination),
        }
    }

    /// Local path of the downloaded asset.
    pub fn asset_path(&self) -> PathBuf {
        PathBuf::from(format!("{}{}", self.download_path, self.file_name))
    }

    /// Whether this record has ever been written after a download.
    pub fn is_downloaded(&self) -> bool {
        !self.last_downloaded_tag.is_empty()
    }
}
