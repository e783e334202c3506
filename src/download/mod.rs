//! Reconciliation engine. For each requested asset, compare the locally
//! recorded tag against the latest release and download only when stale.
//!
//! Work items writing different files run concurrently. Items that write the
//! same file run one after another. A failing item is reported in its own
//! outcome; siblings always run to completion.

pub mod error;
pub mod file;
pub mod paths;

pub use error::{DownloadError, ReconcileError};
pub use file::{AssetFetcher, HttpFetcher};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};

use crate::records::RecordStore;
use crate::release::ReleaseResolver;

/// One requested download: an asset of a repository's latest release, kept
/// in a destination directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub repository: String,
    pub filename: String,
    /// Always ends with a path separator.
    pub destination: String,
}

impl WorkItem {
    pub fn new(repository: &str, filename: &str, destination: &str) -> Self {
        Self {
            repository: repository.to_string(),
            filename: filename.to_string(),
            destination: paths::normalize_destination(destination),
        }
    }

    /// Where the asset is stored locally.
    pub fn asset_path(&self) -> PathBuf {
        PathBuf::from(format!("{}{}", self.destination, self.filename))
    }
}

impl std::fmt::Display for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} -> {}", self.repository, self.filename, self.destination)
    }
}

/// Result of reconciling one work item.
#[derive(Debug)]
pub enum ReconcileOutcome {
    /// The local file exists and matches the latest release.
    Skipped { tag: String },
    /// The asset was downloaded and its record updated.
    Updated {
        tag: String,
        previous_tag: String,
        bytes: u64,
    },
    Failed(ReconcileError),
}

impl ReconcileOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, ReconcileOutcome::Failed(_))
    }
}

/// Outcomes of a reconciliation pass, in the order the items were given.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub results: Vec<(WorkItem, ReconcileOutcome)>,
}

impl ReconcileReport {
    pub fn updated(&self) -> usize {
        self.count(|o| matches!(o, ReconcileOutcome::Updated { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ReconcileOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(ReconcileOutcome::is_failed)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&WorkItem, &ReconcileError)> {
        self.results.iter().filter_map(|(item, outcome)| match outcome {
            ReconcileOutcome::Failed(e) => Some((item, e)),
            _ => None,
        })
    }

    /// Collapse the pass into a single result: an error if any item failed.
    pub fn ensure_success(&self) -> anyhow::Result<()> {
        let failed: Vec<String> = self.failures().map(|(item, _)| item.to_string()).collect();
        if !failed.is_empty() {
            anyhow::bail!(
                "{} of {} assets failed: {}",
                failed.len(),
                self.results.len(),
                failed.join(", ")
            );
        }
        Ok(())
    }

    fn count(&self, pred: impl Fn(&ReconcileOutcome) -> bool) -> usize {
        self.results.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Drives work items against a record store, release resolver and fetcher.
pub struct Reconciler {
    store: Arc<dyn RecordStore>,
    resolver: Arc<dyn ReleaseResolver>,
    fetcher: Arc<dyn AssetFetcher>,
    concurrency: Option<usize>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn RecordStore>,
        resolver: Arc<dyn ReleaseResolver>,
        fetcher: Arc<dyn AssetFetcher>,
    ) -> Self {
        Self {
            store,
            resolver,
            fetcher,
            concurrency: None,
        }
    }

    /// Cap the number of items in flight. `None` runs every item at once.
    pub fn with_concurrency(mut self, limit: Option<usize>) -> Self {
        self.concurrency = limit;
        self
    }

    /// Reconcile every item concurrently and wait for all of them.
    ///
    /// Items that target the same local file (a repeated triple, or two
    /// repositories publishing one filename into a shared destination) run
    /// one after another in argument order. Distinct files run concurrently.
    pub async fn reconcile_all(&self, items: Vec<WorkItem>) -> ReconcileReport {
        let total = items.len();
        let groups = group_by_asset_path(items);
        let limit = self.concurrency.unwrap_or(groups.len()).max(1);
        tracing::debug!(
            items = total,
            files = groups.len(),
            concurrency = limit,
            "starting reconciliation"
        );

        let finished: Vec<Vec<(usize, WorkItem, ReconcileOutcome)>> = stream::iter(groups)
            .map(|group| async move {
                let mut done = Vec::with_capacity(group.len());
                for (position, item) in group {
                    let outcome = self.reconcile(&item).await;
                    done.push((position, item, outcome));
                }
                done
            })
            .buffer_unordered(limit)
            .collect()
            .await;

        let mut results: Vec<_> = finished.into_iter().flatten().collect();
        results.sort_by_key(|(position, _, _)| *position);
        ReconcileReport {
            results: results
                .into_iter()
                .map(|(_, item, outcome)| (item, outcome))
                .collect(),
        }
    }

    /// Reconcile a single item, folding any error into its outcome.
    pub async fn reconcile(&self, item: &WorkItem) -> ReconcileOutcome {
        match self.try_reconcile(item).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::debug!("{}: {}", item, e);
                ReconcileOutcome::Failed(e)
            }
        }
    }

    async fn try_reconcile(&self, item: &WorkItem) -> Result<ReconcileOutcome, ReconcileError> {
        let mut record = self
            .store
            .load(&item.repository, &item.filename, &item.destination)
            .await
            .map_err(ReconcileError::LoadRecord)?;

        let release = self
            .resolver
            .resolve_latest(&item.repository)
            .await
            .map_err(ReconcileError::Resolve)?;

        let asset_path = item.asset_path();
        let on_disk = tokio::fs::try_exists(&asset_path).await.unwrap_or(false);
        if on_disk && record.last_downloaded_tag == release.tag_name {
            tracing::debug!(
                "{} {} is up to date ({})",
                item.repository,
                item.filename,
                release.tag_name
            );
            return Ok(ReconcileOutcome::Skipped {
                tag: release.tag_name,
            });
        }

        let asset = release
            .asset(&item.filename)
            .ok_or_else(|| ReconcileError::AssetNotFound {
                repository: item.repository.clone(),
                tag: release.tag_name.clone(),
                filename: item.filename.clone(),
            })?;

        tokio::fs::create_dir_all(&item.destination)
            .await
            .map_err(|source| {
                ReconcileError::Fetch(DownloadError::Disk {
                    path: PathBuf::from(&item.destination),
                    source,
                })
            })?;

        tracing::debug!(
            repo = %item.repository,
            url = %asset.browser_download_url,
            path = %asset_path.display(),
            "downloading"
        );
        let bytes = self
            .fetcher
            .fetch(&asset.browser_download_url, &asset_path)
            .await
            .map_err(ReconcileError::Fetch)?;

        let previous_tag =
            std::mem::replace(&mut record.last_downloaded_tag, release.tag_name.clone());
        record.author_name = release.author.login.clone();
        self.store
            .write(&record)
            .await
            .map_err(ReconcileError::WriteRecord)?;

        tracing::debug!(
            "Updated {} {} to {} ({} bytes)",
            item.repository,
            item.filename,
            release.tag_name,
            bytes
        );
        Ok(ReconcileOutcome::Updated {
            tag: release.tag_name,
            previous_tag,
            bytes,
        })
    }
}

/// Bucket items by the file they write, keeping each item's argument
/// position. Buckets are ordered by their first item.
fn group_by_asset_path(items: Vec<WorkItem>) -> Vec<Vec<(usize, WorkItem)>> {
    let mut groups: Vec<Vec<(usize, WorkItem)>> = Vec::new();
    let mut slots: HashMap<PathBuf, usize> = HashMap::new();
    for (position, item) in items.into_iter().enumerate() {
        let slot = *slots.entry(item.asset_path()).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push((position, item));
    }
    groups
}
