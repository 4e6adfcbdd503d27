//! Scheduler error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl.
//! Database and configuration details are logged server-side and replaced
//! by generic messages in client responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Which resource a `NotFound` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
    Meeting,
    User,
    /// A meeting references a manager or employee that no longer exists.
    ParticipantMissing,
}

impl NotFoundKind {
    fn message(self) -> &'static str {
        match self {
            NotFoundKind::Meeting => "Meeting not found.",
            NotFoundKind::User => "User not found.",
            NotFoundKind::ParticipantMissing => "Meeting participant not found.",
        }
    }
}

/// Why a state-changing operation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    AlreadyFinalized,
    FinalizedImmutable,
    OverlapExists,
    DuplicateEmail,
}

impl ConflictKind {
    fn message(self) -> &'static str {
        match self {
            ConflictKind::AlreadyFinalized => "Meeting is already finalized.",
            ConflictKind::FinalizedImmutable => "A finalized meeting cannot be modified.",
            ConflictKind::OverlapExists => {
                "Another finalized meeting already exists in the selected time range."
            }
            ConflictKind::DuplicateEmail => "A user with this email already exists.",
        }
    }
}

/// Scheduler error type.
///
/// Maps to HTTP status codes:
/// - Unauthenticated: 401 Unauthorized
/// - AccessDenied: 403 Forbidden
/// - NotFound: 404 Not Found
/// - Conflict: 409 Conflict
/// - BadRequest: 400 Bad Request
/// - Configuration, Database, Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Access denied")]
    AccessDenied,

    #[error("Not found: {0:?}")]
    NotFound(NotFoundKind),

    #[error("Conflict: {0:?}")]
    Conflict(ConflictKind),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An operation was wired against a subject lacking the capability its
    /// policy requires.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error")]
    Internal,
}

impl SchedulerError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            SchedulerError::Unauthenticated => 401,
            SchedulerError::AccessDenied => 403,
            SchedulerError::NotFound(_) => 404,
            SchedulerError::Conflict(_) => 409,
            SchedulerError::BadRequest(_) => 400,
            SchedulerError::Configuration(_)
            | SchedulerError::Database(_)
            | SchedulerError::Internal => 500,
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            SchedulerError::Unauthenticated => "UNAUTHENTICATED",
            SchedulerError::AccessDenied => "ACCESS_DENIED",
            SchedulerError::NotFound(_) => "NOT_FOUND",
            SchedulerError::Conflict(_) => "CONFLICT",
            SchedulerError::BadRequest(_) => "BAD_REQUEST",
            SchedulerError::Configuration(_) => "CONFIGURATION_ERROR",
            SchedulerError::Database(_) => "DATABASE_ERROR",
            SchedulerError::Internal => "INTERNAL_ERROR",
        }
    }

    /// Rejection for a meeting whose start is not strictly before its end.
    pub fn invalid_time_range() -> Self {
        SchedulerError::BadRequest("Meeting start date must be before end date.".to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for SchedulerError {
    fn into_response(self) -> Response {
        let message = match &self {
            SchedulerError::Unauthenticated => "Authentication required".to_string(),
            SchedulerError::AccessDenied => {
                "You are not allowed to access this resource.".to_string()
            }
            SchedulerError::NotFound(kind) => kind.message().to_string(),
            SchedulerError::Conflict(kind) => kind.message().to_string(),
            SchedulerError::BadRequest(reason) => reason.clone(),
            SchedulerError::Configuration(detail) => {
                tracing::error!(target: "scheduler.config", detail = %detail, "Authorization wiring defect");
                "An internal error occurred".to_string()
            }
            SchedulerError::Database(err) => {
                // Log actual error server-side, return generic message to client
                tracing::error!(target: "scheduler.database", error = %err, "Database operation failed");
                "An internal database error occurred".to_string()
            }
            SchedulerError::Internal => "An internal error occurred".to_string(),
        };

        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = "Bearer realm=\"scheduler-api\"".parse() {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

/// Convert sqlx errors to SchedulerError
impl From<sqlx::Error> for SchedulerError {
    fn from(err: sqlx::Error) -> Self {
        SchedulerError::Database(err.to_string())
    }
}
