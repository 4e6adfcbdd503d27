//! Health endpoint.
//!
//! Reports the storage backend in use and whether it answers. Failure
//! details are logged server-side, never returned.

use crate::models::HealthResponse;
use crate::routes::{AppState, StorageBackend};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

#[tracing::instrument(skip_all, name = "scheduler.health")]
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let storage = state.storage.as_str().to_string();
    let tracks_database = state.storage == StorageBackend::Postgres;

    match state.meetings.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy".to_string(),
                storage,
                database: tracks_database.then(|| "healthy".to_string()),
            }),
        ),
        Err(e) => {
            tracing::warn!(target: "scheduler.health", error = %e, "Storage ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy".to_string(),
                    storage,
                    database: tracks_database.then(|| "unhealthy".to_string()),
                }),
            )
        }
    }
}
