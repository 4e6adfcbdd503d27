//! Service layer.
//!
//! Services are shared behind `Arc` by every request task. Each operation
//! takes the caller's [`IdentityContext`](crate::identity::IdentityContext)
//! explicitly and runs its own authorization check.

pub mod finalize;
pub mod meetings;
pub mod users;

pub use finalize::FinalizeEngine;
pub use meetings::MeetingService;
pub use users::UserService;
