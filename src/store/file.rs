//! Record store that keeps one JSON document per record on local disk.
//!
//! Layout is `<root>/<collection>/<id>.json`. Writes go to a temporary file
//! first and are renamed into place so a crash never leaves half a record.
//! Each write uses its own temporary file, so concurrent writers to one
//! record never share a rename source.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tracing::warn;
use uuid::Uuid;

use super::{is_owned_by, merge_patch, sort_newest_first, RecordStore, StoreError};

pub struct FileRecordStore {
    root: PathBuf,
}

impl FileRecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn collection_dir(&self, collection: &str) -> Result<PathBuf, StoreError> {
        validate_segment(collection)?;
        Ok(self.root.join(collection))
    }

    fn record_path(&self, collection: &str, id: &str) -> Result<PathBuf, StoreError> {
        validate_segment(id)?;
        Ok(self.collection_dir(collection)?.join(format!("{id}.json")))
    }

    async fn read_record(path: &Path) -> Result<Option<Value>, StoreError> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(err)),
        }
    }

    async fn write_record(path: &Path, record: &Value) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(record)?;
        let tmp = path.with_extension(format!("json.{}.tmp", Uuid::new_v4().simple()));
        fs::write(&tmp, bytes).await.map_err(io_error)?;
        fs::rename(&tmp, path).await.map_err(io_error)
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn create(
        &self,
        collection: &str,
        record: Value,
        id: Option<&str>,
    ) -> Result<String, StoreError> {
        let id = id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let dir = self.collection_dir(collection)?;
        fs::create_dir_all(&dir).await.map_err(io_error)?;

        let path = self.record_path(collection, &id)?;
        if fs::try_exists(&path).await.map_err(io_error)? {
            return Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                id,
            });
        }

        Self::write_record(&path, &record).await?;
        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<(), StoreError> {
        let path = self.record_path(collection, id)?;
        let mut record = Self::read_record(&path)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        merge_patch(&mut record, patch)?;
        Self::write_record(&path, &record).await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        Self::read_record(&self.record_path(collection, id)?).await
    }

    async fn query_by_owner(
        &self,
        collection: &str,
        owner_id: &str,
    ) -> Result<Vec<Value>, StoreError> {
        let dir = self.collection_dir(collection)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_error(err)),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            let record = match Self::read_record(&path).await {
                Ok(Some(record)) => record,
                // Removed between listing and reading.
                Ok(None) => continue,
                Err(StoreError::Serialization(err)) => {
                    warn!(path = %path.display(), error = %err, "skipping unparseable record file");
                    continue;
                }
                Err(err) => return Err(err),
            };

            if is_owned_by(&record, owner_id) {
                records.push(record);
            }
        }

        sort_newest_first(&mut records);
        Ok(records)
    }
}

fn validate_segment(segment: &str) -> Result<(), StoreError> {
    let valid = !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(StoreError::Backend(format!("invalid key segment: {segment:?}")))
    }
}

fn io_error(err: std::io::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}
