//! Declarative authorization.
//!
//! Resources expose capabilities ([`Ownable`], [`Participatable`]) through
//! [`AccessSubject`]. Guarded operations declare an [`AccessPolicy`] and run
//! through [`AccessGuard`], which evaluates the policy against the current
//! [`IdentityContext`](crate::identity::IdentityContext).

pub mod capability;
pub mod guard;
pub mod policy;

pub use capability::{AccessSubject, Ownable, Participatable};
pub use guard::{AccessDecision, AccessGuard};
pub use policy::{AccessPolicy, Capability};
