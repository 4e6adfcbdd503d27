//! # Scheduler Test Utilities
//!
//! Shared test utilities for the scheduler service.
//!
//! This crate provides:
//! - Fixtures (`fixtures`): configuration, identities, users, meetings
//! - Token builders (`token_builders`): signed bearer tokens for the JWT provider
//! - Server harness (`TestSchedulerServer`): a real server on a random port
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scheduler_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<()> {
//!     let server = TestSchedulerServer::spawn_in_memory().await?;
//!     let response = reqwest::get(format!("{}/health", server.url())).await?;
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod fixtures;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use fixtures::*;
pub use server_harness::*;
pub use token_builders::*;
