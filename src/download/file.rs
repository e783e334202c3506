use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::error::DownloadError;
use crate::retry::{self, RetryPolicy};

/// Streams a remote asset to a local path, replacing any existing file.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Download `url` to `download_path`, returning the number of bytes
    /// written.
    async fn fetch(&self, url: &str, download_path: &Path) -> Result<u64, DownloadError>;
}

/// Fetcher backed by a shared `reqwest::Client`, retrying transient failures.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    retry: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(client: Client, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }
}

#[async_trait]
impl AssetFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, download_path: &Path) -> Result<u64, DownloadError> {
        let part_path = part_path(download_path);
        retry::retry_with_backoff(&self.retry, DownloadError::is_retryable, || {
            attempt_download(&self.client, url, download_path, &part_path)
        })
        .await
    }
}

/// `<name>.<random>.part` next to the destination, unique per fetch so two
/// transfers aimed at the same file never write into one `.part` inode.
fn part_path(download_path: &Path) -> PathBuf {
    let mut name = download_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{:08x}.part", rand::random::<u32>()));
    download_path.with_file_name(name)
}

/// Single download attempt. The `.part` file is removed on any failure.
async fn attempt_download(
    client: &Client,
    url: &str,
    download_path: &Path,
    part_path: &Path,
) -> Result<u64, DownloadError> {
    let result = stream_to_part(client, url, part_path).await;
    let bytes_written = match result {
        Ok(n) => n,
        Err(e) => {
            let _ = fs::remove_file(part_path).await;
            return Err(e);
        }
    };

    if let Err(source) = fs::rename(part_path, download_path).await {
        let _ = fs::remove_file(part_path).await;
        return Err(DownloadError::Disk {
            path: download_path.to_path_buf(),
            source,
        });
    }
    Ok(bytes_written)
}

async fn stream_to_part(client: &Client, url: &str, part_path: &Path) -> Result<u64, DownloadError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| DownloadError::Http {
            source,
            url: url.to_string(),
            bytes_written: 0,
        })?;

    if !response.status().is_success() {
        return Err(DownloadError::HttpStatus {
            status: response.status().as_u16(),
            url: url.to_string(),
        });
    }

    let disk = |source: std::io::Error| DownloadError::Disk {
        path: part_path.to_path_buf(),
        source,
    };

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(part_path)
        .await
        .map_err(disk)?;

    let mut bytes_written: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|source| DownloadError::Http {
            source,
            url: url.to_string(),
            bytes_written,
        })?;
        file.write_all(&chunk).await.map_err(disk)?;
        bytes_written += chunk.len() as u64;
    }
    file.flush().await.map_err(disk)?;
    file.sync_all().await.map_err(disk)?;

    tracing::debug!(%url, bytes = bytes_written, "transfer complete");
    Ok(bytes_written)
}
