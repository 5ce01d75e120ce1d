//! Filesystem object storage for self-hosted deployments.
//!
//! Objects live at `{root}/{bucket}/{key}`. The HTTP server exposes `{root}`
//! under `/storage`, which is what [`LocalObjectStorage::public_url`] points at.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::{ObjectStorage, PutOptions};
use crate::constants::ERR_INVALID_STORAGE_KEY;
use crate::error::{AppError, Result};

pub struct LocalObjectStorage {
    root: PathBuf,
    public_base_url: Url,
}

impl LocalObjectStorage {
    /// Store objects under `root`, served from `public_base_url` + `/storage`
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Result<Self> {
        let public_base_url = Url::parse(public_base_url)
            .map_err(|e| AppError::InvalidInput(format!("Invalid PUBLIC_BASE_URL: {}", e)))?;
        if public_base_url.cannot_be_a_base() {
            return Err(AppError::InvalidInput(
                "PUBLIC_BASE_URL must be an http(s) URL".to_string(),
            ));
        }

        Ok(Self {
            root: root.into(),
            public_base_url,
        })
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        for segment in [bucket, key] {
            if segment.is_empty()
                || segment.contains('/')
                || segment.contains('\\')
                || segment == "."
                || segment == ".."
            {
                tracing::warn!("Rejected storage path {}/{}", bucket, key);
                return Err(AppError::InvalidInput(ERR_INVALID_STORAGE_KEY.to_string()));
            }
        }
        Ok(self.root.join(bucket).join(key))
    }
}

/// Write `bytes` to the freshly opened `path`, removing the file if the write fails
async fn write_object<W: AsyncWrite + Unpin>(path: &Path, mut file: W, bytes: &[u8]) -> Result<()> {
    let written = async {
        file.write_all(bytes).await?;
        file.flush().await
    }
    .await;

    if let Err(e) = written {
        tracing::error!("Failed to write {:?}: {}", path, e);
        if let Err(cleanup) = tokio::fs::remove_file(path).await {
            tracing::warn!("Failed to remove partial object {:?}: {}", path, cleanup);
        }
        return Err(e.into());
    }

    Ok(())
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn put(&self, bucket: &str, key: &str, bytes: Bytes, options: PutOptions) -> Result<()> {
        let path = self.object_path(bucket, key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut open = tokio::fs::OpenOptions::new();
        open.write(true);
        if options.upsert {
            open.create(true).truncate(true);
        } else {
            open.create_new(true);
        }

        let file = match open.open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(AppError::ObjectAlreadyExists);
            }
            Err(e) => return Err(e.into()),
        };

        write_object(&path, file, &bytes).await?;

        tracing::debug!(
            "Stored object {}/{} ({} bytes, {})",
            bucket,
            key,
            bytes.len(),
            options.content_type
        );

        Ok(())
    }

    async fn remove(&self, bucket: &str, key: &str) -> Result<()> {
        let path = self.object_path(bucket, key)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(AppError::ObjectNotFound),
            Err(e) => Err(e.into()),
        }
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        let mut url = self.public_base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(["storage", bucket, key]);
        }
        url.to_string()
    }
}
