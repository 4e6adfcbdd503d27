//! Scheduler service configuration.
//!
//! Configuration is loaded from environment variables. Secrets (token
//! signing key, database URL) are held as `SecretString` and redacted in
//! Debug output.

use common::config::{DatabaseConfig, LogFormat, ObservabilityConfig};
use common::secret::{ExposeSecret, SecretString};
use common::types::MAX_PAGE_SIZE;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default page size for list and search endpoints.
pub const DEFAULT_PAGE_SIZE: u32 = common::types::DEFAULT_PAGE_SIZE;

/// Default database pool size.
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

/// Default time to keep serving in-flight requests after a shutdown signal.
pub const DEFAULT_SHUTDOWN_DRAIN_SECONDS: u64 = 5;

/// Minimum accepted length of the HS256 signing secret, in bytes.
pub const MIN_JWT_SECRET_BYTES: usize = 32;

/// Scheduler service configuration.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL settings. `None` selects the in-memory storage backend.
    pub database: Option<DatabaseConfig>,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Shared secret used to validate bearer tokens.
    pub jwt_secret: SecretString,

    /// Page size applied when a request omits `size`.
    pub default_page_size: u32,

    /// Seconds to wait for in-flight requests during shutdown.
    pub shutdown_drain_seconds: u64,

    pub observability: ObservabilityConfig,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field(
                "database",
                &self.database.as_ref().map(|db| db.max_connections),
            )
            .field("bind_address", &self.bind_address)
            .field("jwt_secret", &"[REDACTED]")
            .field("default_page_size", &self.default_page_size)
            .field("shutdown_drain_seconds", &self.shutdown_drain_seconds)
            .field("observability", &self.observability)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWT secret: {0}")]
    InvalidJwtSecret(String),

    #[error("Invalid page size configuration: {0}")]
    InvalidPageSize(String),

    #[error("Invalid database configuration: {0}")]
    InvalidDatabase(String),

    #[error("Invalid shutdown drain configuration: {0}")]
    InvalidShutdownDrain(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let jwt_secret = vars
            .get("JWT_SECRET")
            .ok_or_else(|| ConfigError::MissingEnvVar("JWT_SECRET".to_string()))?;
        if jwt_secret.len() < MIN_JWT_SECRET_BYTES {
            return Err(ConfigError::InvalidJwtSecret(format!(
                "JWT_SECRET must be at least {} bytes, got {}",
                MIN_JWT_SECRET_BYTES,
                jwt_secret.len()
            )));
        }
        let jwt_secret = SecretString::from(jwt_secret.clone());

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let default_page_size = if let Some(value_str) = vars.get("DEFAULT_PAGE_SIZE") {
            let value: u32 = value_str.parse().map_err(|e| {
                ConfigError::InvalidPageSize(format!(
                    "DEFAULT_PAGE_SIZE must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 || value > MAX_PAGE_SIZE {
                return Err(ConfigError::InvalidPageSize(format!(
                    "DEFAULT_PAGE_SIZE must be between 1 and {}, got {}",
                    MAX_PAGE_SIZE, value
                )));
            }

            value
        } else {
            DEFAULT_PAGE_SIZE
        };

        let max_connections = if let Some(value_str) = vars.get("DB_MAX_CONNECTIONS") {
            let value: u32 = value_str.parse().map_err(|e| {
                ConfigError::InvalidDatabase(format!(
                    "DB_MAX_CONNECTIONS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidDatabase(
                    "DB_MAX_CONNECTIONS must be greater than 0".to_string(),
                ));
            }

            value
        } else {
            DEFAULT_DB_MAX_CONNECTIONS
        };

        let database = match vars.get("DATABASE_URL").map(|url| url.trim()) {
            Some(url) if !url.is_empty() => Some(DatabaseConfig {
                url: SecretString::from(url.to_string()),
                max_connections,
            }),
            _ => None,
        };

        let shutdown_drain_seconds = if let Some(value_str) = vars.get("SHUTDOWN_DRAIN_SECONDS")
        {
            value_str.parse().map_err(|e| {
                ConfigError::InvalidShutdownDrain(format!(
                    "SHUTDOWN_DRAIN_SECONDS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?
        } else {
            DEFAULT_SHUTDOWN_DRAIN_SECONDS
        };

        let observability = ObservabilityConfig {
            log_format: LogFormat::from_env_value(vars.get("LOG_FORMAT").map(String::as_str)),
        };

        Ok(Config {
            database,
            bind_address,
            jwt_secret,
            default_page_size,
            shutdown_drain_seconds,
            observability,
        })
    }

    /// Database URL, if a PostgreSQL backend is configured.
    pub fn database_url(&self) -> Option<&str> {
        self.database.as_ref().map(|db| db.url.expose_secret())
    }
}
