//! Collaborator contracts for the gallery
//!
//! The gallery never talks to a backend directly. It goes through a
//! [`MetadataStore`] (one row per photo) and an [`ObjectStorage`] (the bytes).
//! Implementations live in the submodules and in [`crate::db`].

pub mod hosted;
pub mod local;
pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;

use crate::constants::OBJECT_CACHE_CONTROL_SECS;
use crate::error::Result;
use crate::models::{ImageRecord, NewImageRecord};

pub use hosted::HostedBackend;
pub use local::LocalObjectStorage;
pub use memory::{MemoryMetadataStore, MemoryObjectStorage};

/// Structured-record collaborator holding one row per uploaded image
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// All records, newest first
    async fn list(&self) -> Result<Vec<ImageRecord>>;

    /// Insert a record; the store assigns `id` and `created_at`
    async fn insert(&self, record: NewImageRecord) -> Result<ImageRecord>;

    /// Delete by id, `ImageNotFound` if no such row
    async fn delete(&self, id: u64) -> Result<()>;

    /// Check connectivity
    async fn health_check(&self) -> Result<()>;
}

/// Binary-blob collaborator addressed by bucket and key
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Write an object. Without `upsert`, an existing key is `ObjectAlreadyExists`.
    async fn put(&self, bucket: &str, key: &str, bytes: Bytes, options: PutOptions) -> Result<()>;

    async fn remove(&self, bucket: &str, key: &str) -> Result<()>;

    /// Fetchable URL for an object. Pure, no I/O.
    fn public_url(&self, bucket: &str, key: &str) -> String;
}

/// Options attached to an object write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type: String,
    /// Cache lifetime in seconds
    pub cache_control: u32,
    pub upsert: bool,
    pub metadata: BTreeMap<String, String>,
}

impl PutOptions {
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            cache_control: OBJECT_CACHE_CONTROL_SECS,
            upsert: false,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
