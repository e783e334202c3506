//! Listing and deleting stored records.
//!
//! Indices are 1-based positions in the store's listing order, which is
//! stable between invocations, so a `delete` can refer to what `list` showed.

use std::fmt::Write as _;
use std::path::PathBuf;

use futures_util::future::join_all;
use thiserror::Error;

use crate::records::{Record, RecordError, RecordStore};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("no records found")]
    NoRecords,

    #[error("index {index} is out of range (1..={count}), record does not exist")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("failed to delete asset file {path}: {source}")]
    AssetRemoval {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Render every record with its 1-based index.
pub async fn list_all(store: &dyn RecordStore) -> Result<String, LifecycleError> {
    let records = store.list().await?;
    if records.is_empty() {
        return Err(LifecycleError::NoRecords);
    }
    Ok(format_records(&records))
}

fn format_records(records: &[Record]) -> String {
    let mut out = String::new();
    for (i, r) in records.iter().enumerate() {
        let tag = if r.is_downloaded() {
            r.last_downloaded_tag.as_str()
        } else {
            "(never downloaded)"
        };
        let _ = writeln!(out, "{}: {}", i + 1, r.repository_name);
        let _ = writeln!(out, "   file:   {}", r.file_name);
        let _ = writeln!(out, "   path:   {}", r.download_path);
        let _ = writeln!(out, "   tag:    {}", tag);
        let _ = writeln!(out, "   author: {}", r.author_name);
        let _ = writeln!(out, "   id:     {}", r.identifier);
    }
    out
}

/// Delete the records at the given 1-based indices together with their
/// downloaded files.
///
/// The listing is read once up front so every index refers to the same
/// snapshot. Each index succeeds or fails on its own; results come back in
/// request order.
pub async fn delete_by_index(
    store: &dyn RecordStore,
    indices: &[usize],
) -> Result<Vec<(usize, Result<Record, LifecycleError>)>, LifecycleError> {
    let snapshot = store.list().await?;
    let snapshot = &snapshot;

    let results = join_all(indices.iter().map(|&index| async move {
        let result = delete_one(store, snapshot, index).await;
        (index, result)
    }))
    .await;
    Ok(results)
}

async fn delete_one(
    store: &dyn RecordStore,
    snapshot: &[Record],
    index: usize,
) -> Result<Record, LifecycleError> {
    if index == 0 || index > snapshot.len() {
        return Err(LifecycleError::IndexOutOfRange {
            index,
            count: snapshot.len(),
        });
    }
    let record = &snapshot[index - 1];

    let asset_path = record.asset_path();
    match tokio::fs::remove_file(&asset_path).await {
        Ok(()) => tracing::debug!(path = %asset_path.display(), "removed asset file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(LifecycleError::AssetRemoval {
                path: asset_path,
                source,
            })
        }
    }

    store.remove(record).await?;
    tracing::info!(
        "Deleted record {} for {} {}",
        index,
        record.repository_name,
        record.file_name
    );
    Ok(record.clone())
}
