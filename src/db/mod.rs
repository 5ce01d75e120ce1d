pub mod tables;

use async_trait::async_trait;
use chrono::Utc;
use redb::{Database, Error as RedbError, ReadableDatabase, ReadableTable};
use std::path::Path;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{ImageRecord, ImageRow, NewImageRecord, sort_newest_first};
use crate::store::MetadataStore;

const BINCODE_CONFIG: bincode::config::Configuration = bincode::config::standard();

/// Database handle type (Arc-wrapped for sharing across handlers)
pub type Db = Arc<Database>;

/// Open or create the redb database at the given path
///
/// Creates all required tables on first run.
#[allow(clippy::result_large_err)]
pub fn open_database(path: impl AsRef<Path>) -> std::result::Result<Db, RedbError> {
    tracing::info!("Opening database at: {:?}", path.as_ref());

    // Create parent directory if it doesn't exist
    if let Some(parent) = path.as_ref().parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            tracing::error!("Failed to create database directory: {}", e);
            RedbError::Io(e)
        })?;
    }

    let db = Database::create(path)?;

    // Initialize tables on first run
    let write_txn = db.begin_write()?;
    {
        let _ = write_txn.open_table(tables::IMAGES)?;
        let _ = write_txn.open_table(tables::META)?;
    }
    write_txn.commit()?;

    tracing::info!("Database initialized successfully");

    Ok(Arc::new(db))
}

/// Metadata store backed by a local redb file
#[derive(Clone)]
pub struct RedbMetadataStore {
    db: Db,
}

impl RedbMetadataStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Open the database at `path` and wrap it
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(open_database(path)?))
    }
}

#[async_trait]
impl MetadataStore for RedbMetadataStore {
    async fn list(&self) -> Result<Vec<ImageRecord>> {
        let db = self.db.clone();

        let mut records = tokio::task::spawn_blocking(move || -> Result<Vec<ImageRecord>> {
            let read_txn = db.begin_read()?;
            let images = read_txn.open_table(tables::IMAGES)?;

            let mut records = Vec::new();
            for entry in images.iter()? {
                let (id, bytes) = entry?;
                let (row, _): (ImageRow, _) =
                    bincode::serde::decode_from_slice(bytes.value(), BINCODE_CONFIG)?;
                records.push(row.into_record(id.value()));
            }

            Ok(records)
        })
        .await??;

        sort_newest_first(&mut records);
        Ok(records)
    }

    async fn insert(&self, record: NewImageRecord) -> Result<ImageRecord> {
        let db = self.db.clone();

        let (id, row) = tokio::task::spawn_blocking(move || -> Result<(u64, ImageRow)> {
            let write_txn = db.begin_write()?;
            let id;
            let row;
            {
                let mut meta = write_txn.open_table(tables::META)?;
                let last_id = meta.get(tables::LAST_IMAGE_ID)?.map(|v| v.value()).unwrap_or(0);
                let last_ms = meta.get(tables::LAST_CREATED_MS)?.map(|v| v.value()).unwrap_or(0);

                id = last_id + 1;
                let now_ms = Utc::now().timestamp_millis().max(0) as u64;
                let created_at_ms = now_ms.max(last_ms + 1);

                meta.insert(tables::LAST_IMAGE_ID, id)?;
                meta.insert(tables::LAST_CREATED_MS, created_at_ms)?;
                drop(meta);

                let mut images = write_txn.open_table(tables::IMAGES)?;
                row = ImageRow::new(record, created_at_ms as i64);
                let bytes = bincode::serde::encode_to_vec(&row, BINCODE_CONFIG)?;
                images.insert(id, bytes.as_slice())?;
            }
            write_txn.commit()?;

            Ok((id, row))
        })
        .await??;

        tracing::debug!("Inserted image row {} ({})", id, row.storage_path);

        Ok(row.into_record(id))
    }

    async fn delete(&self, id: u64) -> Result<()> {
        let db = self.db.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let write_txn = db.begin_write()?;
            {
                let mut images = write_txn.open_table(tables::IMAGES)?;
                if images.remove(id)?.is_none() {
                    return Err(AppError::ImageNotFound);
                }
            }
            write_txn.commit()?;

            Ok(())
        })
        .await?
    }

    async fn health_check(&self) -> Result<()> {
        let db = self.db.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let read_txn = db.begin_read()?;
            let _ = read_txn.open_table(tables::IMAGES)?;
            Ok(())
        })
        .await?
    }
}
