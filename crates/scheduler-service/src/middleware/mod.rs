//! HTTP middleware.
//!
//! - `identity` - resolves the bearer token into an `IdentityContext`
//! - `http_metrics` - request metrics for every response

pub mod http_metrics;
pub mod identity;

pub use http_metrics::http_metrics_middleware;
pub use identity::resolve_identity;
