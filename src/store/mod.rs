//! Persistence seam for order records.
//!
//! The record store itself is an external service; this module defines the
//! contract the engine consumes, two backends for running the service
//! locally, and the [`cache::OrderStore`] façade that keeps the signed-in
//! user's orders in memory.

pub mod cache;
pub mod file;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

pub const ORDERS: &str = "orders";
pub const USERS: &str = "users";

/// Field every owned record carries; `query_by_owner` filters on it.
pub const OWNER_FIELD: &str = "userId";
pub const CREATED_AT_FIELD: &str = "createdAt";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("record {collection}/{id} already exists")]
    AlreadyExists { collection: String, id: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("record store unavailable: {0}")]
    Unavailable(String),

    #[error("record store error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Durable collection/id storage for JSON records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Creates a record, generating an id when none is given. Returns the id.
    async fn create(
        &self,
        collection: &str,
        record: Value,
        id: Option<&str>,
    ) -> Result<String, StoreError>;

    /// Shallow-merges the fields of `patch` into an existing record.
    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<(), StoreError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// Records whose owner field equals `owner_id`, newest `createdAt` first.
    async fn query_by_owner(
        &self,
        collection: &str,
        owner_id: &str,
    ) -> Result<Vec<Value>, StoreError>;
}

pub(crate) fn merge_patch(record: &mut Value, patch: Value) -> Result<(), StoreError> {
    let (Some(target), Value::Object(fields)) = (record.as_object_mut(), patch) else {
        return Err(StoreError::Serialization(
            "record and patch must be JSON objects".to_string(),
        ));
    };

    for (key, value) in fields {
        target.insert(key, value);
    }
    Ok(())
}

pub(crate) fn is_owned_by(record: &Value, owner_id: &str) -> bool {
    record.get(OWNER_FIELD).and_then(Value::as_str) == Some(owner_id)
}

pub(crate) fn sort_newest_first(records: &mut [Value]) {
    records.sort_by_key(|record| std::cmp::Reverse(created_at(record)));
}

fn created_at(record: &Value) -> Option<DateTime<Utc>> {
    record
        .get(CREATED_AT_FIELD)
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|ts| ts.with_timezone(&Utc))
}
