//! In-process collaborators, used by tests.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{MetadataStore, ObjectStorage, PutOptions};
use crate::error::{AppError, Result};
use crate::models::{ImageRecord, NewImageRecord, sort_newest_first};

#[derive(Default)]
struct MemoryTable {
    rows: Vec<ImageRecord>,
    next_id: u64,
    last_created_ms: i64,
}

/// Metadata table held in memory
#[derive(Default)]
pub struct MemoryMetadataStore {
    table: Mutex<MemoryTable>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.table.lock().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn list(&self) -> Result<Vec<ImageRecord>> {
        let mut rows = self.table.lock().await.rows.clone();
        sort_newest_first(&mut rows);
        Ok(rows)
    }

    async fn insert(&self, record: NewImageRecord) -> Result<ImageRecord> {
        let mut table = self.table.lock().await;

        // Keep creation times strictly increasing so ordering is well defined
        let now_ms = Utc::now().timestamp_millis().max(table.last_created_ms + 1);
        table.last_created_ms = now_ms;
        table.next_id += 1;

        let created_at = DateTime::from_timestamp_millis(now_ms).unwrap_or_else(Utc::now);
        let record = record.into_record(table.next_id, created_at);
        table.rows.push(record.clone());

        Ok(record)
    }

    async fn delete(&self, id: u64) -> Result<()> {
        let mut table = self.table.lock().await;
        let before = table.rows.len();
        table.rows.retain(|row| row.id != id);

        if table.rows.len() == before {
            return Err(AppError::ImageNotFound);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// A stored object and the options it was written with
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Bytes,
    pub options: PutOptions,
}

/// Object storage held in memory, keyed by `(bucket, key)`
pub struct MemoryObjectStorage {
    base_url: String,
    objects: Mutex<HashMap<(String, String), StoredObject>>,
}

impl MemoryObjectStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub async fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .lock()
            .await
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn put(&self, bucket: &str, key: &str, bytes: Bytes, options: PutOptions) -> Result<()> {
        let mut objects = self.objects.lock().await;
        let id = (bucket.to_string(), key.to_string());

        if !options.upsert && objects.contains_key(&id) {
            return Err(AppError::ObjectAlreadyExists);
        }

        objects.insert(id, StoredObject { bytes, options });
        Ok(())
    }

    async fn remove(&self, bucket: &str, key: &str) -> Result<()> {
        self.objects
            .lock()
            .await
            .remove(&(bucket.to_string(), key.to_string()))
            .map(|_| ())
            .ok_or(AppError::ObjectNotFound)
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.base_url, bucket, key)
    }
}
