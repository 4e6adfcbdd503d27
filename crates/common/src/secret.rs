//! Secret wrappers for values that must never reach logs.
//!
//! Scheduler configuration carries two of these: the token signing secret
//! and the database connection string (which embeds a password). Both are
//! held as [`SecretString`], whose `Debug` output is redacted, so deriving
//! `Debug` on a config struct stays safe.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct TokenSettings {
//!     issuer: String,
//!     signing_secret: SecretString,
//! }
//!
//! let settings = TokenSettings {
//!     issuer: "scheduler".to_string(),
//!     signing_secret: SecretString::from("hs256-secret"),
//! };
//!
//! assert!(!format!("{settings:?}").contains("hs256-secret"));
//! assert_eq!(settings.signing_secret.expose_secret(), "hs256-secret");
//! ```

pub use secrecy::{ExposeSecret, SecretString};
