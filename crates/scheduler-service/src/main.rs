//! Meeting Scheduler
//!
//! Entry point for the scheduler HTTP service. Uses PostgreSQL when
//! `DATABASE_URL` is set and in-memory storage otherwise.

use anyhow::Context;
use common::config::LogFormat;
use common::secret::ExposeSecret;
use scheduler_service::config::Config;
use scheduler_service::identity::jwt::JwtIdentityProvider;
use scheduler_service::identity::IdentityProvider;
use scheduler_service::observability::metrics::init_metrics_recorder;
use scheduler_service::routes::{self, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(LogFormat::from_env_value(
        std::env::var("LOG_FORMAT").ok().as_deref(),
    ));

    info!("Starting Meeting Scheduler");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    let storage = if config.database.is_some() {
        "postgres"
    } else {
        "memory"
    };
    info!(
        bind_address = %config.bind_address,
        default_page_size = config.default_page_size,
        storage,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {e}"))?;

    let identity_provider: Arc<dyn IdentityProvider> =
        Arc::new(JwtIdentityProvider::new(&config.jwt_secret));

    let bind_address = config.bind_address.clone();
    let drain_seconds = config.shutdown_drain_seconds;

    let state = match config.database.clone() {
        Some(database) => {
            info!("Connecting to database...");
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(database.max_connections)
                .acquire_timeout(Duration::from_secs(5))
                .connect(database.url.expose_secret())
                .await
                .map_err(|e| {
                    error!("Failed to connect to database: {}", e);
                    e
                })?;

            sqlx::migrate!("../../migrations")
                .run(&pool)
                .await
                .context("failed to run database migrations")?;
            info!("Database connection established, migrations applied");

            AppState::postgres(config, pool, identity_provider)
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory storage");
            AppState::in_memory(config, identity_provider)
        }
    };

    let app = routes::build_routes(Arc::new(state), metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Meeting Scheduler listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(drain_seconds))
        .await?;

    info!("Meeting Scheduler shutdown complete");

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "scheduler_service=debug,scheduler=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and the drain period is over.
async fn shutdown_signal(drain_seconds: u64) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    if drain_seconds > 0 {
        warn!("Draining connections for {} seconds...", drain_seconds);
        tokio::time::sleep(Duration::from_secs(drain_seconds)).await;
        info!("Drain period complete");
    } else {
        info!("Skipping drain period (SHUTDOWN_DRAIN_SECONDS=0)");
    }
}
