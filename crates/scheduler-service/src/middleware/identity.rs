//! Identity resolution middleware for `/api/v1` routes.
//!
//! Inserts an [`IdentityContext`] into the request extensions:
//!
//! - no `Authorization` header: anonymous context; guarded operations
//!   reject it with 401
//! - `Bearer <token>` that resolves: authenticated context
//! - any other header value, or a token that does not resolve: 401 here

use crate::errors::SchedulerError;
use crate::identity::{IdentityContext, IdentityProvider};
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::instrument;

/// Bearer token from the `Authorization` header. `Ok(None)` when the header
/// is absent.
fn bearer_token(req: &Request) -> Result<Option<&str>, SchedulerError> {
    let Some(value) = req.headers().get(AUTHORIZATION) else {
        return Ok(None);
    };

    let header = value.to_str().map_err(|_| {
        tracing::debug!(target: "scheduler.middleware.identity", "Non-ASCII Authorization header");
        SchedulerError::Unauthenticated
    })?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(Some)
        .ok_or_else(|| {
            tracing::debug!(
                target: "scheduler.middleware.identity",
                "Invalid Authorization header format"
            );
            SchedulerError::Unauthenticated
        })
}

#[instrument(skip_all, name = "scheduler.middleware.identity")]
pub async fn resolve_identity(
    State(provider): State<Arc<dyn IdentityProvider>>,
    mut req: Request,
    next: Next,
) -> Result<Response, SchedulerError> {
    let ctx = match bearer_token(&req)? {
        None => IdentityContext::anonymous(),
        Some(token) => {
            let identity = provider.resolve(token).await.map_err(|e| {
                tracing::debug!(target: "scheduler.middleware.identity", error = %e, "Token rejected");
                SchedulerError::Unauthenticated
            })?;
            IdentityContext::authenticated(identity)
        }
    };

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}
