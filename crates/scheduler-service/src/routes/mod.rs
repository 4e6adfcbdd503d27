//! HTTP routes for the scheduler service.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::handlers;
use crate::identity::IdentityProvider;
use crate::middleware::{http_metrics_middleware, resolve_identity};
use crate::models::{Meeting, User};
use crate::repositories::memory::InMemoryRepository;
use crate::repositories::postgres::{PgMeetingRepository, PgUserRepository};
use crate::repositories::{MeetingRepository, Repository};
use crate::services::{MeetingService, UserService};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Storage backend behind the services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres,
}

impl StorageBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageBackend::Memory => "memory",
            StorageBackend::Postgres => "postgres",
        }
    }
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    pub meetings: Arc<MeetingService>,

    pub users: Arc<UserService>,

    /// Resolves bearer tokens for the identity middleware.
    pub identity_provider: Arc<dyn IdentityProvider>,

    pub storage: StorageBackend,
}

impl AppState {
    pub fn new(
        config: Config,
        meeting_repo: Arc<dyn MeetingRepository>,
        user_repo: Arc<dyn Repository<User>>,
        identity_provider: Arc<dyn IdentityProvider>,
        storage: StorageBackend,
    ) -> Self {
        Self {
            meetings: Arc::new(MeetingService::new(meeting_repo, Arc::clone(&user_repo))),
            users: Arc::new(UserService::new(user_repo)),
            config,
            identity_provider,
            storage,
        }
    }

    /// State over fresh in-memory repositories, with meetings resolving
    /// participant accounts from the user store.
    pub fn in_memory(config: Config, identity_provider: Arc<dyn IdentityProvider>) -> Self {
        let users = Arc::new(InMemoryRepository::<User>::new());
        Self::new(
            config,
            Arc::new(InMemoryRepository::<Meeting>::linked_to(Arc::clone(&users))),
            users,
            identity_provider,
            StorageBackend::Memory,
        )
    }

    /// State over PostgreSQL repositories sharing `pool`.
    pub fn postgres(
        config: Config,
        pool: PgPool,
        identity_provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self::new(
            config,
            Arc::new(PgMeetingRepository::new(pool.clone())),
            Arc::new(PgUserRepository::new(pool)),
            identity_provider,
            StorageBackend::Postgres,
        )
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness plus storage ping - public, unversioned
/// - `/metrics` - Prometheus metrics endpoint - public, unversioned
/// - `/api/v1/meetings[/:id[/finalize]]` - meeting operations
/// - `/api/v1/users[/:id]` - user operations
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
///
/// Every `/api/v1` route passes through the identity middleware.
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let api_routes = Router::new()
        .route(
            "/api/v1/meetings",
            post(handlers::create_meeting).get(handlers::search_meetings),
        )
        .route(
            "/api/v1/meetings/:id",
            get(handlers::get_meeting)
                .put(handlers::update_meeting)
                .delete(handlers::delete_meeting),
        )
        .route(
            "/api/v1/meetings/:id/finalize",
            post(handlers::finalize_meeting),
        )
        .route(
            "/api/v1/users",
            post(handlers::create_user).get(handlers::search_users),
        )
        .route(
            "/api/v1/users/:id",
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.identity_provider),
            resolve_identity,
        ))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer (innermost)
    // 2. TraceLayer
    // 3. http_metrics_middleware (outermost), so framework rejections are
    //    counted too
    public_routes
        .merge(metrics_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn test_storage_backend_labels() {
        assert_eq!(StorageBackend::Memory.as_str(), "memory");
        assert_eq!(StorageBackend::Postgres.as_str(), "postgres");
    }
}
