//! Scheduler data models.
//!
//! Domain entities ([`Meeting`], [`User`]) together with the request and
//! response shapes of the HTTP API.

pub mod meeting;
pub mod user;

pub use meeting::{
    CreateMeetingRequest, Meeting, MeetingResponse, MeetingSearchParams, MeetingState,
    ParticipantRef, UpdateMeetingRequest,
};
pub use user::{
    CreateUserRequest, Position, UpdateUserRequest, User, UserResponse, UserSearchParams,
};

use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service health status ("healthy" or "unhealthy").
    pub status: String,

    /// Storage backend in use ("postgres" or "memory").
    pub storage: String,

    /// Storage connectivity status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_omits_missing_database() {
        let response = HealthResponse {
            status: "healthy".to_string(),
            storage: "memory".to_string(),
            database: None,
        };

        let json = serde_json::to_string(&response).expect("serialization should succeed");
        assert!(json.contains("\"status\":\"healthy\""));
        assert!(json.contains("\"storage\":\"memory\""));
        assert!(!json.contains("database"));
    }
}
