//! Photo Gallery Library
//!
//! This module exports the core types and functions for testing and reuse.

pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod gallery;
pub mod models;
pub mod routes;
pub mod store;

pub use config::{BackendMode, Config};
pub use db::{RedbMetadataStore, open_database};
pub use error::{AppError, Result};
pub use gallery::GalleryController;

use std::sync::Arc;

use store::{HostedBackend, LocalObjectStorage, MetadataStore, ObjectStorage};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub gallery: Arc<GalleryController>,
    pub config: Config,
}

impl AppState {
    /// Create a new AppState around an existing controller
    pub fn new(gallery: Arc<GalleryController>, config: Config) -> Self {
        Self { gallery, config }
    }

    /// Build the collaborators selected by `config.backend_mode` and a controller over them
    pub fn from_config(config: Config) -> Result<Self> {
        let (metadata, objects): (Arc<dyn MetadataStore>, Arc<dyn ObjectStorage>) =
            match config.backend_mode {
                BackendMode::Hosted => {
                    let url = config.backend_url.as_deref().ok_or_else(|| {
                        AppError::InvalidInput("BACKEND_URL is not set".to_string())
                    })?;
                    let api_key = config.backend_api_key.as_deref().ok_or_else(|| {
                        AppError::InvalidInput("BACKEND_API_KEY is not set".to_string())
                    })?;

                    let backend = Arc::new(HostedBackend::new(url, api_key, &config.images_table)?);
                    let metadata: Arc<dyn MetadataStore> = backend.clone();
                    let objects: Arc<dyn ObjectStorage> = backend;
                    (metadata, objects)
                }
                BackendMode::Local => {
                    let metadata: Arc<dyn MetadataStore> =
                        Arc::new(RedbMetadataStore::open(&config.database_path)?);
                    let objects: Arc<dyn ObjectStorage> = Arc::new(LocalObjectStorage::new(
                        &config.storage_dir,
                        &config.public_base_url,
                    )?);
                    (metadata, objects)
                }
            };

        let gallery = GalleryController::new(metadata, objects, &config.storage_bucket)
            .with_max_upload_bytes(config.max_upload_bytes);

        Ok(Self::new(Arc::new(gallery), config))
    }
}
