pub mod health;
pub mod images;

pub use health::health_check;
pub use images::{delete_image, list_images, upload_image};

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get},
    Router,
};
use tower_http::services::ServeDir;

use crate::config::BackendMode;
use crate::constants::MULTIPART_OVERHEAD_BYTES;
use crate::AppState;

/// Build the application router
///
/// In local mode the object directory is also served under `/storage`, which is
/// where local public URLs point.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/api/images", get(list_images).post(upload_image))
        .route("/api/images/:id", delete(delete_image))
        .layer(DefaultBodyLimit::max(body_limit));

    if state.config.backend_mode == BackendMode::Local {
        router = router.nest_service("/storage", ServeDir::new(&state.config.storage_dir));
    }

    router.with_state(state)
}
