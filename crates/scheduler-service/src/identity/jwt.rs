//! Shared-secret JWT identity provider.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing
//! - Only HS256 is accepted
//! - `exp` is required and validated; `iat` may not lie in the future
//! - Unknown roles invalidate the token rather than being dropped
//! - Client-facing errors are generic; reasons are logged at debug level

use super::{IdentityError, IdentityProvider};
use async_trait::async_trait;
use common::identity::{Identity, Role};
use common::secret::{ExposeSecret, SecretString};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::instrument;

/// Tokens larger than this are rejected without being parsed.
pub const MAX_TOKEN_BYTES: usize = 8192;

/// Tolerance for clock drift between issuer and scheduler, in seconds.
pub const CLOCK_SKEW_SECONDS: i64 = 60;

const GENERIC_REASON: &str = "The access token is invalid or expired";

/// Claims carried by scheduler access tokens.
#[derive(Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Username of the caller - redacted in Debug output.
    pub sub: String,

    /// Numeric user id of the caller.
    pub uid: i64,

    /// Role names, plain (`admin`) or prefixed (`ROLE_ADMIN`).
    #[serde(default)]
    pub roles: Vec<String>,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("sub", &"[REDACTED]")
            .field("uid", &self.uid)
            .field("roles", &self.roles)
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .finish()
    }
}

impl Claims {
    fn into_identity(self) -> Result<Identity, IdentityError> {
        let roles = self
            .roles
            .iter()
            .map(|name| name.parse::<Role>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                tracing::debug!(target: "scheduler.identity.jwt", error = %e, "Token carries unknown role");
                IdentityError::InvalidToken(GENERIC_REASON.to_string())
            })?;

        if self.sub.trim().is_empty() {
            tracing::debug!(target: "scheduler.identity.jwt", "Token has empty subject");
            return Err(IdentityError::InvalidToken(GENERIC_REASON.to_string()));
        }

        Ok(Identity::new(self.uid, self.sub, roles))
    }
}

/// Validates HS256 tokens signed with the configured shared secret.
pub struct JwtIdentityProvider {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityProvider {
    pub fn new(secret: &SecretString) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = CLOCK_SKEW_SECONDS.unsigned_abs();
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            decoding_key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation,
        }
    }

    fn verify(&self, token: &str) -> Result<Claims, IdentityError> {
        if token.len() > MAX_TOKEN_BYTES {
            tracing::debug!(
                target: "scheduler.identity.jwt",
                size = token.len(),
                "Token exceeds maximum size"
            );
            return Err(IdentityError::InvalidToken(GENERIC_REASON.to_string()));
        }

        let token_data =
            decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                tracing::debug!(target: "scheduler.identity.jwt", error = %e, "Token verification failed");
                IdentityError::InvalidToken(GENERIC_REASON.to_string())
            })?;

        let now = chrono::Utc::now().timestamp();
        if token_data.claims.iat > now + CLOCK_SKEW_SECONDS {
            tracing::debug!(target: "scheduler.identity.jwt", "Token issued in the future");
            return Err(IdentityError::InvalidToken(GENERIC_REASON.to_string()));
        }

        Ok(token_data.claims)
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    #[instrument(skip_all, name = "scheduler.identity.resolve")]
    async fn resolve(&self, token: &str) -> Result<Identity, IdentityError> {
        let identity = self.verify(token)?.into_identity()?;
        tracing::debug!(
            target: "scheduler.identity.jwt",
            user_id = identity.user_id(),
            "Token validated successfully"
        );
        Ok(identity)
    }
}
