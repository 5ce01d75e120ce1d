use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored photo as seen by the gallery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Primary key assigned by the metadata store
    pub id: u64,
    /// When the record was created
    pub created_at: DateTime<Utc>,
    /// Original uploaded file name
    pub file_name: String,
    /// Original file size in bytes
    pub file_size: u64,
    /// Object key inside the storage bucket
    pub storage_path: String,
}

/// Insert payload; the store assigns `id` and `created_at`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewImageRecord {
    pub file_name: String,
    pub file_size: u64,
    pub storage_path: String,
}

impl NewImageRecord {
    pub fn into_record(self, id: u64, created_at: DateTime<Utc>) -> ImageRecord {
        ImageRecord {
            id,
            created_at,
            file_name: self.file_name,
            file_size: self.file_size,
            storage_path: self.storage_path,
        }
    }
}

/// Image row stored in redb
/// Uses a Unix timestamp in milliseconds for compact storage with bincode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRow {
    pub created_at_ms: i64,
    pub file_name: String,
    pub file_size: u64,
    pub storage_path: String,
}

impl ImageRow {
    pub fn new(record: NewImageRecord, created_at_ms: i64) -> Self {
        Self {
            created_at_ms,
            file_name: record.file_name,
            file_size: record.file_size,
            storage_path: record.storage_path,
        }
    }

    pub fn into_record(self, id: u64) -> ImageRecord {
        ImageRecord {
            id,
            created_at: DateTime::from_timestamp_millis(self.created_at_ms)
                .unwrap_or(DateTime::UNIX_EPOCH),
            file_name: self.file_name,
            file_size: self.file_size,
            storage_path: self.storage_path,
        }
    }
}

/// Sort records newest first, breaking timestamp ties by id
pub fn sort_newest_first(records: &mut [ImageRecord]) {
    records.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}
