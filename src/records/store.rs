//! Record store trait and YAML-file implementation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use uuid::Uuid;

use super::error::RecordError;
use super::types::Record;

const RECORD_EXTENSION: &str = "yaml";

/// Derive the stable identifier for a (repository, filename, destination)
/// triple.
///
/// The parts are NUL-joined before hashing so that shifting characters
/// between fields (`"ab" + "c"` vs `"a" + "bc"`) yields a different key. The
/// result is a hyphenated name-based UUID, safe to use as a filename.
pub fn identifier_for(repository: &str, filename: &str, destination: &str) -> String {
    let key = [repository, filename, destination].join("\0");
    Uuid::new_v3(&Uuid::nil(), key.as_bytes()).to_string()
}

/// Trait for record persistence.
///
/// Object-safe so the engine can hold an `Arc<dyn RecordStore>` and share it
/// across concurrently running work items. Implementations must tolerate
/// concurrent calls for distinct identifiers.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Return the record for a triple, creating and persisting an empty one
    /// if none exists yet.
    async fn load(
        &self,
        repository: &str,
        filename: &str,
        destination: &str,
    ) -> Result<Record, RecordError>;

    /// Persist the full record, replacing whatever was stored before.
    async fn write(&self, record: &Record) -> Result<(), RecordError>;

    /// Every stored record, ordered by identifier.
    async fn list(&self) -> Result<Vec<Record>, RecordError>;

    /// Delete a stored record. Fails with `NotFound` if it is not stored.
    async fn remove(&self, record: &Record) -> Result<(), RecordError>;
}

/// Stores each record as `<dir>/<identifier>.yaml`.
#[derive(Debug, Clone)]
pub struct YamlRecordStore {
    dir: PathBuf,
}

impl YamlRecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[cfg(test)]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, identifier: &str) -> PathBuf {
        self.dir.join(format!("{identifier}.{RECORD_EXTENSION}"))
    }

    async fn ensure_dir(&self) -> Result<(), RecordError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| RecordError::io(&self.dir, e))
    }

    async fn read_record(path: &Path) -> Result<Record, RecordError> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|e| RecordError::io(path, e))?;
        serde_yaml::from_str(&contents).map_err(|source| RecordError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[async_trait]
impl RecordStore for YamlRecordStore {
    async fn load(
        &self,
        repository: &str,
        filename: &str,
        destination: &str,
    ) -> Result<Record, RecordError> {
        self.ensure_dir().await?;
        let record = Record::new(repository, filename, destination);
        let path = self.record_path(&record.identifier);

        match Self::read_record(&path).await {
            Ok(existing) => Ok(existing),
            Err(RecordError::NotFound { .. }) => {
                tracing::debug!(
                    id = %record.identifier,
                    repo = repository,
                    file = filename,
                    "creating new record"
                );
                self.write(&record).await?;
                Ok(record)
            }
            Err(e) => Err(e),
        }
    }

    async fn write(&self, record: &Record) -> Result<(), RecordError> {
        self.ensure_dir().await?;

        let mut record = record.clone();
        record.identifier = identifier_for(
            &record.repository_name,
            &record.file_name,
            &record.download_path,
        );
        let yaml = serde_yaml::to_string(&record).map_err(|source| RecordError::Encode {
            identifier: record.identifier.clone(),
            source,
        })?;

        // Write a uniquely named sibling first so readers never observe a
        // half-written file and concurrent writers never share a temp file.
        let path = self.record_path(&record.identifier);
        let tmp_path = path.with_extension(format!(
            "{RECORD_EXTENSION}.{:08x}.tmp",
            rand::random::<u32>()
        ));
        fs::write(&tmp_path, yaml)
            .await
            .map_err(|e| RecordError::io(&tmp_path, e))?;
        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(RecordError::io(&path, e));
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Record>, RecordError> {
        self.ensure_dir().await?;

        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| RecordError::io(&self.dir, e))?;
        let mut records = Vec::new();

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| RecordError::io(&self.dir, e))?
        {
            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| RecordError::io(&path, e))?;
            if file_type.is_dir() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }

            match Self::read_record(&path).await {
                Ok(record) => records.push(record),
                Err(RecordError::Decode { path, source }) => {
                    tracing::warn!("Skipping unreadable record {}: {}", path.display(), source);
                }
                // Removed by a concurrent delete between read_dir and read.
                Err(RecordError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        records.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        Ok(records)
    }

    async fn remove(&self, record: &Record) -> Result<(), RecordError> {
        let identifier = identifier_for(
            &record.repository_name,
            &record.file_name,
            &record.download_path,
        );
        let path = self.record_path(&identifier);
        fs::remove_file(&path)
            .await
            .map_err(|e| RecordError::io(&path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, YamlRecordStore) {
        let tmp = TempDir::new().unwrap();
        let store = YamlRecordStore::new(tmp.path().join("records"));
        (tmp, store)
    }

    #[test]
    fn test_identifier_is_deterministic() {
        let a = identifier_for("acme/pack", "pack.zip", "/srv/mods/");
        let b = identifier_for("acme/pack", "pack.zip", "/srv/mods/");
        assert_eq!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_identifier_changes_with_each_field() {
        let base = identifier_for("acme/pack", "pack.zip", "/srv/mods/");
        assert_ne!(base, identifier_for("acme/pack2", "pack.zip", "/srv/mods/"));
        assert_ne!(base, identifier_for("acme/pack", "pack.tar", "/srv/mods/"));
        assert_ne!(base, identifier_for("acme/pack", "pack.zip", "/srv/other/"));
    }

    #[test]
    fn test_identifier_field_boundaries_matter() {
        assert_ne!(
            identifier_for("ab", "c", "/d/"),
            identifier_for("a", "bc", "/d/")
        );
        assert_ne!(
            identifier_for("a", "b", "c/"),
            identifier_for("a", "bc", "/")
        );
    }

    #[test]
    fn test_identifier_is_filesystem_safe() {
        let id = identifier_for("acme/pack", "weird name?.zip", "C:\\mods\\");
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() || c == '-'));
    }

    #[tokio::test]
    async fn test_load_creates_and_persists_record() {
        let (_tmp, store) = store();
        let record = store.load("acme/pack", "pack.zip", "/srv/mods/").await.unwrap();
        assert_eq!(record.last_downloaded_tag, "");
        assert!(store.record_path(&record.identifier).exists());

        let listed = store.list().await.unwrap();
        assert_eq!(listed, vec![record]);
    }

    #[tokio::test]
    async fn test_load_returns_existing_record() {
        let (_tmp, store) = store();
        let mut record = store.load("acme/pack", "pack.zip", "/srv/mods/").await.unwrap();
        record.last_downloaded_tag = "v1".into();
        record.author_name = "octocat".into();
        store.write(&record).await.unwrap();

        let again = store.load("acme/pack", "pack.zip", "/srv/mods/").await.unwrap();
        assert_eq!(again, record);
    }

    #[tokio::test]
    async fn test_write_overwrites_and_leaves_no_temp_file() {
        let (_tmp, store) = store();
        let mut record = store.load("acme/pack", "pack.zip", "/srv/mods/").await.unwrap();
        record.last_downloaded_tag = "v1".into();
        store.write(&record).await.unwrap();
        record.last_downloaded_tag = "v2".into();
        store.write(&record).await.unwrap();

        let again = store.load("acme/pack", "pack.zip", "/srv/mods/").await.unwrap();
        assert_eq!(again.last_downloaded_tag, "v2");

        let names: Vec<_> = std::fs::read_dir(store.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec![format!("{}.yaml", record.identifier)]);
    }

    #[tokio::test]
    async fn test_write_repairs_stale_identifier() {
        let (_tmp, store) = store();
        let mut record = Record::new("acme/pack", "pack.zip", "/srv/mods/");
        record.identifier = "bogus".into();
        store.write(&record).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(
            listed[0].identifier,
            identifier_for("acme/pack", "pack.zip", "/srv/mods/")
        );
    }

    #[tokio::test]
    async fn test_list_on_fresh_store_is_empty() {
        let (_tmp, store) = store();
        assert!(store.list().await.unwrap().is_empty());
        assert!(store.dir().is_dir());
    }

    #[tokio::test]
    async fn test_list_skips_non_record_entries() {
        let (_tmp, store) = store();
        let record = store.load("acme/pack", "pack.zip", "/srv/mods/").await.unwrap();

        std::fs::create_dir_all(store.dir().join("nested.yaml")).unwrap();
        std::fs::write(store.dir().join("notes.txt"), "hello").unwrap();
        std::fs::write(store.dir().join("broken.yaml"), "[not, a, record").unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed, vec![record]);
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_identifier() {
        let (_tmp, store) = store();
        for repo in ["a/one", "b/two", "c/three", "d/four"] {
            store.load(repo, "asset.bin", "/srv/").await.unwrap();
        }
        let ids: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.identifier)
            .collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert_eq!(ids.len(), 4);
    }

    #[tokio::test]
    async fn test_remove_deletes_record() {
        let (_tmp, store) = store();
        let record = store.load("acme/pack", "pack.zip", "/srv/mods/").await.unwrap();
        store.remove(&record).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_missing_is_not_found() {
        let (_tmp, store) = store();
        let record = Record::new("acme/pack", "pack.zip", "/srv/mods/");
        let err = store.remove(&record).await.unwrap_err();
        assert!(matches!(err, RecordError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_load_fails_on_corrupt_record() {
        let (_tmp, store) = store();
        let id = identifier_for("acme/pack", "pack.zip", "/srv/mods/");
        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(store.record_path(&id), "{{{{").unwrap();

        let err = store
            .load("acme/pack", "pack.zip", "/srv/mods/")
            .await
            .unwrap_err();
        assert!(matches!(err, RecordError::Decode { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_load_and_write_of_one_record() {
        let (_tmp, store) = store();
        let store = std::sync::Arc::new(store);

        let tasks: Vec<_> = (0..16)
            .map(|n| {
                let store = store.clone();
                tokio::spawn(async move {
                    let mut record = store.load("acme/pack", "pack.zip", "/srv/mods/").await?;
                    record.last_downloaded_tag = format!("v{n}");
                    store.write(&record).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let names: Vec<_> = std::fs::read_dir(store.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names.len(), 1, "{names:?}");
        assert!(store.list().await.unwrap()[0]
            .last_downloaded_tag
            .starts_with('v'));
    }
}
