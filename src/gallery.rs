//! Gallery controller: the in-memory view of the gallery and the flows that
//! keep it in step with the metadata store and object storage.
//!
//! Every mutation is followed by a full [`GalleryController::list_images`]
//! refresh; nothing is inserted into the local list optimistically.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::constants::MAX_UPLOAD_SIZE_BYTES;
use crate::error::{AppError, Result};
use crate::models::{FileUpload, ImageCard, ImageRecord, NewImageRecord};
use crate::store::{MetadataStore, ObjectStorage, PutOptions};

#[derive(Default)]
struct GalleryState {
    images: Vec<ImageRecord>,
    /// Sequence number of the refresh that produced `images`
    applied_refresh: u64,
    selected: Option<FileUpload>,
}

/// Releases the upload gate when the upload finishes, on every path
struct UploadGuard<'a>(&'a AtomicBool);

impl<'a> UploadGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AppError::UploadInProgress)?;
        Ok(Self(flag))
    }
}

impl Drop for UploadGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct GalleryController {
    metadata: Arc<dyn MetadataStore>,
    objects: Arc<dyn ObjectStorage>,
    bucket: String,
    max_upload_bytes: usize,
    state: RwLock<GalleryState>,
    refresh_seq: AtomicU64,
    uploading: AtomicBool,
}

impl GalleryController {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        objects: Arc<dyn ObjectStorage>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            metadata,
            objects,
            bucket: bucket.into(),
            max_upload_bytes: MAX_UPLOAD_SIZE_BYTES,
            state: RwLock::new(GalleryState::default()),
            refresh_seq: AtomicU64::new(0),
            uploading: AtomicBool::new(false),
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    pub fn metadata_store(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }

    /// Reload all records, newest first
    ///
    /// On failure the previous list is kept and returned; the error is only logged.
    /// A response that arrives after a later refresh has already been applied
    /// is dropped, so overlapping refreshes never roll the list back.
    pub async fn list_images(&self) -> Vec<ImageRecord> {
        let refresh = self.refresh_seq.fetch_add(1, Ordering::AcqRel) + 1;

        match self.metadata.list().await {
            Ok(images) => {
                let mut state = self.state.write().await;
                if refresh > state.applied_refresh {
                    state.images = images;
                    state.applied_refresh = refresh;
                } else {
                    tracing::debug!(
                        "Dropping list from refresh {}, refresh {} already applied",
                        refresh,
                        state.applied_refresh
                    );
                }
                state.images.clone()
            }
            Err(e) => {
                tracing::warn!("Failed to list images, keeping previous list: {}", e);
                self.images().await
            }
        }
    }

    /// Current in-memory list without contacting the store
    pub async fn images(&self) -> Vec<ImageRecord> {
        self.state.read().await.images.clone()
    }

    pub async fn image(&self, id: u64) -> Option<ImageRecord> {
        self.state
            .read()
            .await
            .images
            .iter()
            .find(|image| image.id == id)
            .cloned()
    }

    pub async fn select_file(&self, file: FileUpload) {
        self.state.write().await.selected = Some(file);
    }

    pub async fn clear_selection(&self) {
        self.state.write().await.selected = None;
    }

    pub async fn has_selected_file(&self) -> bool {
        self.state.read().await.selected.is_some()
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading.load(Ordering::Acquire)
    }

    /// Whether the upload trigger should be enabled
    pub async fn can_upload(&self) -> bool {
        self.has_selected_file().await && !self.is_uploading()
    }

    /// Upload the selected file
    ///
    /// The selection is put back if the upload fails, so it can be retried.
    pub async fn upload_selected(&self) -> Result<ImageRecord> {
        let file = self
            .state
            .write()
            .await
            .selected
            .take()
            .ok_or(AppError::NoFileSelected)?;

        match self.upload_image(file.clone()).await {
            Ok(record) => Ok(record),
            Err(e) => {
                let mut state = self.state.write().await;
                if state.selected.is_none() {
                    state.selected = Some(file);
                }
                Err(e)
            }
        }
    }

    /// Store the file, record it, then refresh the list
    ///
    /// Only one upload runs at a time; a second call while one is in flight
    /// fails with `UploadInProgress` without touching either store.
    pub async fn upload_image(&self, file: FileUpload) -> Result<ImageRecord> {
        let _guard = UploadGuard::acquire(&self.uploading)?;

        file.validate(self.max_upload_bytes)?;

        let key = file.storage_key(Utc::now().timestamp_millis());
        let options = PutOptions::new(file.content_type.clone())
            .with_metadata("fileName", file.display_name())
            .with_metadata("fileSize", file.size().to_string());

        if let Err(e) = self
            .objects
            .put(&self.bucket, &key, file.bytes.clone(), options)
            .await
        {
            tracing::error!("Failed to store {}: {}", key, e);
            return Err(e);
        }

        let new_record = NewImageRecord {
            file_name: file.display_name().to_string(),
            file_size: file.size(),
            storage_path: key.clone(),
        };

        let record = match self.metadata.insert(new_record).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!("Failed to record {}: {}", key, e);
                // No record points at the object, so drop it rather than leave an orphan
                if let Err(cleanup) = self.objects.remove(&self.bucket, &key).await {
                    tracing::error!("Failed to remove unrecorded object {}: {}", key, cleanup);
                }
                return Err(e);
            }
        };

        tracing::info!(
            "Uploaded image {} as {} ({} bytes)",
            record.id,
            key,
            record.file_size
        );

        self.list_images().await;
        self.clear_selection().await;

        Ok(record)
    }

    /// Remove the object, then the record, then refresh the list
    ///
    /// If the object cannot be removed nothing changes. If the object is gone
    /// but the record cannot be deleted, the record is left dangling.
    pub async fn delete_image(&self, id: u64, storage_path: &str) -> Result<()> {
        if let Err(e) = self.objects.remove(&self.bucket, storage_path).await {
            tracing::error!("Failed to remove object {} for image {}: {}", storage_path, id, e);
            return Err(e);
        }

        if let Err(e) = self.metadata.delete(id).await {
            tracing::error!(
                "Removed object {} but failed to delete image {}; record now dangling: {}",
                storage_path,
                id,
                e
            );
            return Err(e);
        }

        tracing::info!("Deleted image {} ({})", id, storage_path);

        self.list_images().await;

        Ok(())
    }

    /// Fetchable URL for a stored object
    pub fn resolve_public_url(&self, storage_path: &str) -> String {
        self.objects.public_url(&self.bucket, storage_path)
    }

    /// Current list as cards for the grid
    pub async fn cards(&self, now: DateTime<Utc>) -> Vec<ImageCard> {
        self.images()
            .await
            .iter()
            .map(|record| self.card(record, now))
            .collect()
    }

    pub fn card(&self, record: &ImageRecord, now: DateTime<Utc>) -> ImageCard {
        ImageCard::new(record, self.resolve_public_url(&record.storage_path), now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryMetadataStore, MemoryObjectStorage};
    use async_trait::async_trait;
    use bytes::Bytes;
    use tokio::sync::Notify;
    use tokio_test::{assert_err, assert_ok};

    const BUCKET: &str = "images";

    /// Metadata store that can be told to fail individual operations
    #[derive(Default)]
    struct FlakyMetadata {
        inner: MemoryMetadataStore,
        fail_list: AtomicBool,
        fail_insert: AtomicBool,
        fail_delete: AtomicBool,
        hold_next_list: AtomicBool,
        list_started: Notify,
        release_list: Notify,
    }

    #[async_trait]
    impl MetadataStore for FlakyMetadata {
        async fn list(&self) -> Result<Vec<ImageRecord>> {
            if self.fail_list.load(Ordering::SeqCst) {
                return Err(AppError::Backend {
                    status: 503,
                    message: "unavailable".to_string(),
                });
            }
            if self.hold_next_list.swap(false, Ordering::SeqCst) {
                // Read now, answer late
                let snapshot = self.inner.list().await;
                self.list_started.notify_one();
                self.release_list.notified().await;
                return snapshot;
            }
            self.inner.list().await
        }

        async fn insert(&self, record: NewImageRecord) -> Result<ImageRecord> {
            if self.fail_insert.load(Ordering::SeqCst) {
                return Err(AppError::Backend {
                    status: 500,
                    message: "insert failed".to_string(),
                });
            }
            self.inner.insert(record).await
        }

        async fn delete(&self, id: u64) -> Result<()> {
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(AppError::Backend {
                    status: 500,
                    message: "delete failed".to_string(),
                });
            }
            self.inner.delete(id).await
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
    }

    /// Object storage that can fail, or block puts until released
    struct FlakyObjects {
        inner: MemoryObjectStorage,
        fail_put: AtomicBool,
        fail_remove: AtomicBool,
        hold_puts: AtomicBool,
        put_started: Notify,
        release_put: Notify,
    }

    impl Default for FlakyObjects {
        fn default() -> Self {
            Self {
                inner: MemoryObjectStorage::new("http://cdn.test"),
                fail_put: AtomicBool::new(false),
                fail_remove: AtomicBool::new(false),
                hold_puts: AtomicBool::new(false),
                put_started: Notify::new(),
                release_put: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl ObjectStorage for FlakyObjects {
        async fn put(&self, bucket: &str, key: &str, bytes: Bytes, options: PutOptions) -> Result<()> {
            if self.hold_puts.load(Ordering::SeqCst) {
                self.put_started.notify_one();
                self.release_put.notified().await;
            }
            if self.fail_put.load(Ordering::SeqCst) {
                return Err(AppError::Backend {
                    status: 500,
                    message: "put failed".to_string(),
                });
            }
            self.inner.put(bucket, key, bytes, options).await
        }

        async fn remove(&self, bucket: &str, key: &str) -> Result<()> {
            if self.fail_remove.load(Ordering::SeqCst) {
                return Err(AppError::Backend {
                    status: 500,
                    message: "remove failed".to_string(),
                });
            }
            self.inner.remove(bucket, key).await
        }

        fn public_url(&self, bucket: &str, key: &str) -> String {
            self.inner.public_url(bucket, key)
        }
    }

    fn setup() -> (Arc<GalleryController>, Arc<FlakyMetadata>, Arc<FlakyObjects>) {
        let metadata = Arc::new(FlakyMetadata::default());
        let objects = Arc::new(FlakyObjects::default());
        let controller = Arc::new(GalleryController::new(
            metadata.clone(),
            objects.clone(),
            BUCKET,
        ));
        (controller, metadata, objects)
    }

    fn png(name: &str, size: usize) -> FileUpload {
        FileUpload::new(name, "image/png", vec![7u8; size])
    }

    fn is_storage_key_for(key: &str, name: &str) -> bool {
        key.strip_suffix(name)
            .and_then(|prefix| prefix.strip_suffix('-'))
            .map(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn test_upload_cat_png() {
        let (controller, _, objects) = setup();
        let before = controller.list_images().await.len();

        let record = assert_ok!(controller.upload_image(png("cat.png", 2048)).await);

        assert_eq!(record.file_name, "cat.png");
        assert_eq!(record.file_size, 2048);
        assert!(
            is_storage_key_for(&record.storage_path, "cat.png"),
            "unexpected key {}",
            record.storage_path
        );

        // The refresh already happened inside the upload
        let images = controller.images().await;
        assert_eq!(images.len(), before + 1);
        assert_eq!(images[0], record);

        let stored = objects.inner.get(BUCKET, &record.storage_path).await.unwrap();
        assert_eq!(stored.bytes.len(), 2048);
        assert_eq!(stored.options.content_type, "image/png");
        assert!(!stored.options.upsert);
        assert_eq!(stored.options.cache_control, 3600);
        assert_eq!(stored.options.metadata["fileName"], "cat.png");
    }

    #[tokio::test]
    async fn test_upload_failure_creates_no_record() {
        let (controller, metadata, objects) = setup();
        objects.fail_put.store(true, Ordering::SeqCst);

        assert_err!(controller.upload_image(png("cat.png", 2048)).await);

        assert!(metadata.inner.is_empty().await);
        assert!(controller.list_images().await.is_empty());
        assert!(!controller.is_uploading());
    }

    #[tokio::test]
    async fn test_insert_failure_removes_object() {
        let (controller, metadata, objects) = setup();
        metadata.fail_insert.store(true, Ordering::SeqCst);

        assert_err!(controller.upload_image(png("cat.png", 2048)).await);

        assert!(objects.inner.keys(BUCKET).await.is_empty());
        assert!(metadata.inner.is_empty().await);
    }

    #[tokio::test]
    async fn test_invalid_upload_touches_nothing() {
        let (controller, metadata, objects) = setup();
        let controller = Arc::new(
            Arc::into_inner(controller)
                .unwrap()
                .with_max_upload_bytes(1024),
        );

        assert!(matches!(
            controller.upload_image(png("big.png", 2048)).await,
            Err(AppError::PayloadTooLarge)
        ));
        assert!(matches!(
            controller
                .upload_image(FileUpload::new("notes.txt", "text/plain", vec![1u8; 10]))
                .await,
            Err(AppError::InvalidInput(_))
        ));

        assert!(objects.inner.keys(BUCKET).await.is_empty());
        assert!(metadata.inner.is_empty().await);
        assert!(!controller.is_uploading());
    }

    #[tokio::test]
    async fn test_second_upload_rejected_while_first_in_flight() {
        let (controller, metadata, objects) = setup();
        objects.hold_puts.store(true, Ordering::SeqCst);

        let first = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.upload_image(png("a.png", 10)).await })
        };
        objects.put_started.notified().await;

        assert!(controller.is_uploading());
        assert!(matches!(
            controller.upload_image(png("b.png", 10)).await,
            Err(AppError::UploadInProgress)
        ));

        objects.hold_puts.store(false, Ordering::SeqCst);
        objects.release_put.notify_one();
        let record = first.await.unwrap().unwrap();

        assert_eq!(record.file_name, "a.png");
        assert_eq!(metadata.inner.len().await, 1);
        assert!(!controller.is_uploading());
    }

    #[tokio::test]
    async fn test_upload_selected_flow() {
        let (controller, _, objects) = setup();

        assert!(!controller.can_upload().await);
        assert!(matches!(
            controller.upload_selected().await,
            Err(AppError::NoFileSelected)
        ));

        controller.select_file(png("cat.png", 2048)).await;
        assert!(controller.can_upload().await);

        // A failed upload keeps the selection
        objects.fail_put.store(true, Ordering::SeqCst);
        assert_err!(controller.upload_selected().await);
        assert!(controller.has_selected_file().await);

        // A successful one clears it
        objects.fail_put.store(false, Ordering::SeqCst);
        let record = assert_ok!(controller.upload_selected().await);
        assert_eq!(record.file_name, "cat.png");
        assert!(!controller.has_selected_file().await);
        assert!(!controller.can_upload().await);
    }

    #[tokio::test]
    async fn test_delete_removes_object_and_record() {
        let (controller, _, objects) = setup();
        let a = controller.upload_image(png("a.png", 10)).await.unwrap();
        let b = controller.upload_image(png("b.png", 10)).await.unwrap();
        assert_eq!(controller.images().await.len(), 2);

        assert_ok!(controller.delete_image(a.id, &a.storage_path).await);

        let images = controller.images().await;
        assert_eq!(images, vec![b]);
        assert!(images.iter().all(|image| image.id != a.id));
        assert!(objects.inner.get(BUCKET, &a.storage_path).await.is_none());
    }

    #[tokio::test]
    async fn test_delete_object_failure_keeps_record() {
        let (controller, _, objects) = setup();
        let a = controller.upload_image(png("a.png", 10)).await.unwrap();
        objects.fail_remove.store(true, Ordering::SeqCst);

        assert_err!(controller.delete_image(a.id, &a.storage_path).await);

        assert_eq!(controller.list_images().await, vec![a.clone()]);
        assert!(objects.inner.get(BUCKET, &a.storage_path).await.is_some());
    }

    #[tokio::test]
    async fn test_delete_metadata_failure_leaves_dangling_record() {
        let (controller, metadata, objects) = setup();
        let a = controller.upload_image(png("a.png", 10)).await.unwrap();
        metadata.fail_delete.store(true, Ordering::SeqCst);

        assert_err!(controller.delete_image(a.id, &a.storage_path).await);

        // Object is gone but the record is still listed
        assert!(objects.inner.get(BUCKET, &a.storage_path).await.is_none());
        assert_eq!(controller.list_images().await, vec![a]);
    }

    #[tokio::test]
    async fn test_list_failure_keeps_stale_state() {
        let (controller, metadata, _) = setup();
        let a = controller.upload_image(png("a.png", 10)).await.unwrap();

        metadata.fail_list.store(true, Ordering::SeqCst);
        metadata
            .inner
            .insert(NewImageRecord {
                file_name: "hidden.png".to_string(),
                file_size: 1,
                storage_path: "1-hidden.png".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(controller.list_images().await, vec![a.clone()]);

        metadata.fail_list.store(false, Ordering::SeqCst);
        assert_eq!(controller.list_images().await.len(), 2);
    }

    #[tokio::test]
    async fn test_late_list_does_not_overwrite_newer_refresh() {
        let (controller, metadata, _) = setup();
        let a = controller.upload_image(png("a.png", 10)).await.unwrap();

        metadata.hold_next_list.store(true, Ordering::SeqCst);
        let slow = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.list_images().await })
        };
        metadata.list_started.notified().await;

        // Upload refreshes while the slow list is still pending
        let b = controller.upload_image(png("b.png", 10)).await.unwrap();
        assert_eq!(controller.images().await, vec![b.clone(), a.clone()]);

        metadata.release_list.notify_one();
        let returned = slow.await.unwrap();

        assert_eq!(returned, vec![b.clone(), a.clone()]);
        assert_eq!(controller.images().await, vec![b, a]);
    }

    #[tokio::test]
    async fn test_list_is_idempotent_and_sorted() {
        let (controller, _, _) = setup();
        for name in ["a.png", "b.png", "c.png"] {
            controller.upload_image(png(name, 10)).await.unwrap();
        }

        let first = controller.list_images().await;
        let second = controller.list_images().await;
        assert_eq!(first, second);
        assert!(first.windows(2).all(|w| w[0].created_at > w[1].created_at));
        assert_eq!(first[0].file_name, "c.png");
    }

    #[tokio::test]
    async fn test_resolve_public_url_and_cards() {
        let (controller, _, _) = setup();
        let record = controller.upload_image(png("cat.png", 2048)).await.unwrap();

        let url = controller.resolve_public_url(&record.storage_path);
        assert_eq!(url, format!("http://cdn.test/images/{}", record.storage_path));
        assert_eq!(controller.resolve_public_url(&record.storage_path), url);

        let cards = controller.cards(Utc::now()).await;
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].url, url);
        assert_eq!(cards[0].size_label, "2.00 KB");
        assert_eq!(cards[0].relative_time, "a few seconds ago");
    }
}
