//! HTTP request handlers.

pub mod health;
pub mod meetings;
pub mod metrics;
pub mod users;

pub use health::health_check;
pub use meetings::{
    create_meeting, delete_meeting, finalize_meeting, get_meeting, search_meetings,
    update_meeting,
};
pub use metrics::metrics_handler;
pub use users::{create_user, delete_user, get_user, search_users, update_user};

use crate::errors::SchedulerError;
use axum::extract::{rejection::QueryRejection, Query};
use serde::de::DeserializeOwned;

/// Deserializes a JSON request body, answering 400 rather than axum's 422.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, SchedulerError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(target: "scheduler.handlers", error = %e, "Invalid request body");
        SchedulerError::BadRequest("Invalid request body".to_string())
    })
}

/// Unwraps query parameters, answering with the JSON error body rather
/// than axum's plain-text rejection.
fn parse_query<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, SchedulerError> {
    match query {
        Ok(Query(params)) => Ok(params),
        Err(rejection) => {
            tracing::debug!(target: "scheduler.handlers", error = %rejection, "Invalid query string");
            Err(SchedulerError::BadRequest("Invalid query parameters".to_string()))
        }
    }
}
