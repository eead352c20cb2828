use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{is_owned_by, merge_patch, sort_newest_first, RecordStore, StoreError};

type Collection = HashMap<String, Value>;

/// In-process record store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryRecordStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create(
        &self,
        collection: &str,
        record: Value,
        id: Option<&str>,
    ) -> Result<String, StoreError> {
        let id = id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut collections = self.collections.write().await;
        let records = collections.entry(collection.to_string()).or_default();
        if records.contains_key(&id) {
            return Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                id,
            });
        }

        records.insert(id.clone(), record);
        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let record = collections
            .get_mut(collection)
            .and_then(|records| records.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        merge_patch(record, patch)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|records| records.get(id))
            .cloned())
    }

    async fn query_by_owner(
        &self,
        collection: &str,
        owner_id: &str,
    ) -> Result<Vec<Value>, StoreError> {
        let collections = self.collections.read().await;
        let mut records: Vec<Value> = collections
            .get(collection)
            .map(|records| {
                records
                    .values()
                    .filter(|record| is_owned_by(record, owner_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        sort_newest_first(&mut records);
        Ok(records)
    }
}
