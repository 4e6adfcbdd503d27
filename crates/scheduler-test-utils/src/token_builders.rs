//! Builder for signed test tokens
//!
//! Produces HS256 tokens accepted by `JwtIdentityProvider` when it is
//! configured with `TEST_JWT_SECRET`.

use crate::fixtures::TEST_JWT_SECRET;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;

/// Builder for scheduler access tokens
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_user(3, "alice")
///     .with_role("admin")
///     .expires_in(3600)
///     .sign();
/// ```
pub struct TestTokenBuilder {
    sub: String,
    uid: i64,
    roles: Vec<String>,
    exp: i64,
    iat: i64,
    secret: String,
}

impl TestTokenBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            sub: "test-user".to_string(),
            uid: 1,
            roles: vec!["user".to_string()],
            exp: (now + Duration::seconds(3600)).timestamp(),
            iat: now.timestamp(),
            secret: TEST_JWT_SECRET.to_string(),
        }
    }

    /// Set the user id and username
    pub fn for_user(mut self, uid: i64, username: &str) -> Self {
        self.uid = uid;
        self.sub = username.to_string();
        self
    }

    /// Add a role name
    pub fn with_role(mut self, role: &str) -> Self {
        self.roles.push(role.to_string());
        self
    }

    /// Set expiration in seconds from now (negative for expired tokens)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Sign with a different secret
    pub fn signed_with(mut self, secret: &str) -> Self {
        self.secret = secret.to_string();
        self
    }

    /// Encode and sign the token
    pub fn sign(self) -> String {
        let claims = json!({
            "sub": self.sub,
            "uid": self.uid,
            "roles": self.roles,
            "exp": self.exp,
            "iat": self.iat,
        });
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .expect("signing a test token should succeed")
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
