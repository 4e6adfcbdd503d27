//! Configuration sections shared by scheduler binaries and test harnesses.

use crate::secret::SecretString;
use serde::Deserialize;

/// PostgreSQL connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Connection string; redacted in `Debug` output.
    pub url: SecretString,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Parses `LOG_FORMAT`; anything other than `json` means plain text.
    #[must_use]
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObservabilityConfig {
    /// Output format for the tracing subscriber
    pub log_format: LogFormat,
}
