//! Error types for the record store.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or writing record files.
#[derive(Error, Debug)]
pub enum RecordError {
    /// The record file does not exist.
    #[error("Record not found at {path}")]
    NotFound { path: PathBuf },

    /// Filesystem failure on a record file or the records directory.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A record file exists but is not valid YAML for a record.
    #[error("Failed to decode record {path}: {source}")]
    Decode {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// Serializing a record to YAML failed.
    #[error("Failed to encode record {identifier}: {source}")]
    Encode {
        identifier: String,
        source: serde_yaml::Error,
    },
}

impl RecordError {
    /// Wrap an I/O error, mapping `NotFound` to the dedicated variant.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Io { path, source }
        }
    }
}
