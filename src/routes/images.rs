use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Serialize;

use crate::constants::UPLOAD_FIELD_NAME;
use crate::error::{AppError, Result};
use crate::models::{FileUpload, ImageCard};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ListImagesResponse {
    pub images: Vec<ImageCard>,
}

#[derive(Debug, Serialize)]
pub struct UploadImageResponse {
    pub image: ImageCard,
}

#[derive(Debug, Serialize)]
pub struct DeleteImageResponse {
    pub success: bool,
}

/// List the gallery, newest first
///
/// Reloads from the metadata store. If the store is unreachable the last
/// known list is returned instead of an error.
pub async fn list_images(State(state): State<AppState>) -> Json<ListImagesResponse> {
    let records = state.gallery.list_images().await;
    let now = Utc::now();

    Json(ListImagesResponse {
        images: records
            .iter()
            .map(|record| state.gallery.card(record, now))
            .collect(),
    })
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        AppError::InvalidInput(e.body_text())
    }
}

/// Upload an image
///
/// Expects a multipart body with the image in a `file` part. The part's file
/// name and content type are kept as the record's name and the object's type.
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadImageResponse>)> {
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD_NAME) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;

        upload = Some(FileUpload::new(file_name, content_type, bytes));
        break;
    }

    let upload = upload.ok_or(AppError::NoFileSelected)?;
    let record = state.gallery.upload_image(upload).await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadImageResponse {
            image: state.gallery.card(&record, Utc::now()),
        }),
    ))
}

/// Delete an image and its stored object
pub async fn delete_image(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<DeleteImageResponse>> {
    let record = match state.gallery.image(id).await {
        Some(record) => record,
        None => {
            // The card may come from a list this instance has not loaded yet
            state.gallery.list_images().await;
            state
                .gallery
                .image(id)
                .await
                .ok_or(AppError::ImageNotFound)?
        }
    };

    state.gallery.delete_image(record.id, &record.storage_path).await?;

    Ok(Json(DeleteImageResponse { success: true }))
}
