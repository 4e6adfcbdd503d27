//! Caller identity resolution.
//!
//! Every request carries an [`IdentityContext`]. The identity middleware
//! fills it from the bearer token through an [`IdentityProvider`]; requests
//! without a token get an anonymous context and are rejected by the
//! authorization guard, not by the middleware.

pub mod jwt;

use crate::errors::SchedulerError;
use async_trait::async_trait;
use common::identity::Identity;
use std::sync::Arc;
use thiserror::Error;

/// Identity of the current caller, if any. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct IdentityContext {
    identity: Option<Arc<Identity>>,
}

impl IdentityContext {
    /// Context for a request that presented no credentials.
    pub fn anonymous() -> Self {
        Self { identity: None }
    }

    pub fn authenticated(identity: Identity) -> Self {
        Self {
            identity: Some(Arc::new(identity)),
        }
    }

    /// The resolved identity, or `Unauthenticated`.
    pub fn current(&self) -> Result<&Identity, SchedulerError> {
        self.identity
            .as_deref()
            .ok_or(SchedulerError::Unauthenticated)
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.identity.as_deref().is_some_and(Identity::is_admin)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// Token is malformed, expired, badly signed or carries unusable claims.
    #[error("invalid token: {0}")]
    InvalidToken(String),
}

/// Resolves a bearer token into an [`Identity`].
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<Identity, IdentityError>;
}

/// Fixed token-to-identity map for tests.
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    pub struct StaticIdentityProvider {
        identities: HashMap<String, Identity>,
        resolve_calls: AtomicUsize,
    }

    impl StaticIdentityProvider {
        pub fn new() -> Self {
            Self::default()
        }

        /// Registers `token` as resolving to `identity`.
        pub fn with_token(mut self, token: impl Into<String>, identity: Identity) -> Self {
            self.identities.insert(token.into(), identity);
            self
        }

        pub fn resolve_calls(&self) -> usize {
            self.resolve_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl IdentityProvider for StaticIdentityProvider {
        async fn resolve(&self, token: &str) -> Result<Identity, IdentityError> {
            self.resolve_calls.fetch_add(1, Ordering::SeqCst);
            self.identities
                .get(token)
                .cloned()
                .ok_or_else(|| IdentityError::InvalidToken("unknown token".to_string()))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::mock::StaticIdentityProvider;
    use super::*;
    use common::identity::Role;

    #[test]
    fn test_anonymous_context_is_unauthenticated() {
        let ctx = IdentityContext::anonymous();
        assert!(!ctx.is_authenticated());
        assert!(!ctx.is_admin());
        assert!(matches!(ctx.current(), Err(SchedulerError::Unauthenticated)));
    }

    #[test]
    fn test_authenticated_context_exposes_identity() {
        let ctx = IdentityContext::authenticated(Identity::new(4, "dora", [Role::Admin]));
        assert!(ctx.is_authenticated());
        assert!(ctx.is_admin());
        assert_eq!(ctx.current().unwrap().username(), "dora");

        let cloned = ctx.clone();
        assert_eq!(cloned.current().unwrap().user_id(), 4);
    }

    #[tokio::test]
    async fn test_static_provider_resolves_known_tokens() {
        let provider = StaticIdentityProvider::new()
            .with_token("alice-token", Identity::new(1, "alice", [Role::User]));

        let identity = provider.resolve("alice-token").await.unwrap();
        assert_eq!(identity.username(), "alice");

        let err = provider.resolve("other").await.unwrap_err();
        assert!(matches!(err, IdentityError::InvalidToken(_)));
        assert_eq!(provider.resolve_calls(), 2);
    }
}
