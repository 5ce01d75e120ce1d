use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::AppState;

/// Health check endpoint
///
/// Returns the health status of the server and the metadata backend.
/// Used by load balancers and monitoring systems.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let backend_status = match state.gallery.metadata_store().health_check().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::error!("Backend health check failed: {:?}", e);
            "disconnected"
        }
    };

    Json(json!({
        "status": if backend_status == "connected" { "healthy" } else { "unhealthy" },
        "backend": backend_status,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
