//! Test server harness for E2E testing
//!
//! Provides `TestSchedulerServer` for spawning real scheduler instances in
//! tests. The server validates bearer tokens with `TEST_JWT_SECRET`.

use crate::fixtures::test_config;
use scheduler_service::identity::jwt::JwtIdentityProvider;
use scheduler_service::identity::IdentityProvider;
use scheduler_service::observability::metrics::init_metrics_recorder;
use scheduler_service::routes::{self, AppState};
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Test harness for spawning the scheduler in E2E tests
///
/// # Example
/// ```rust,ignore
/// #[sqlx::test(migrations = "../../migrations")]
/// async fn test_finalize_e2e(pool: PgPool) -> Result<()> {
///     let server = TestSchedulerServer::spawn(pool).await?;
///     let client = reqwest::Client::new();
///
///     let response = client
///         .post(format!("{}/api/v1/meetings/1/finalize", server.url()))
///         .bearer_auth(TestTokenBuilder::new().for_user(1, "ana").sign())
///         .send()
///         .await?;
///     Ok(())
/// }
/// ```
pub struct TestSchedulerServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    handle: JoinHandle<()>,
}

impl TestSchedulerServer {
    /// Spawn a server over fresh in-memory storage
    pub async fn spawn_in_memory() -> Result<Self, anyhow::Error> {
        let config = test_config();
        let provider = jwt_provider(&config);
        Self::spawn_with_state(AppState::in_memory(config, provider)).await
    }

    /// Spawn a server over PostgreSQL (typically a `#[sqlx::test]` pool)
    pub async fn spawn(pool: PgPool) -> Result<Self, anyhow::Error> {
        let config = test_config();
        let provider = jwt_provider(&config);
        Self::spawn_with_state(AppState::postgres(config, pool, provider)).await
    }

    /// Spawn a server over a prepared state
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server in the background
    pub async fn spawn_with_state(state: AppState) -> Result<Self, anyhow::Error> {
        let state = Arc::new(state);

        // The global recorder can only be installed once per process; later
        // servers get a standalone recorder.
        let metrics_handle = match init_metrics_recorder() {
            Ok(handle) => handle,
            Err(_) => {
                use metrics_exporter_prometheus::PrometheusBuilder;
                let recorder = PrometheusBuilder::new().build_recorder();
                recorder.handle()
            }
        };

        let app = routes::build_routes(Arc::clone(&state), metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            state,
            handle,
        })
    }

    /// Get the base URL of the test server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shared state, for seeding data through the services
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }
}

impl Drop for TestSchedulerServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn jwt_provider(config: &scheduler_service::config::Config) -> Arc<dyn IdentityProvider> {
    Arc::new(JwtIdentityProvider::new(&config.jwt_secret))
}
