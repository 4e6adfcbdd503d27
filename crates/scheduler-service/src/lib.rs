//! Meeting Scheduler Service Library
//!
//! A meeting-scheduling backend where every resource sits behind a
//! declarative authorization layer and meetings move through a finalize
//! workflow that rejects overlapping commitments.
//!
//! # Architecture
//!
//! Handler -> Service -> (Guard, Secured facade) -> Repository:
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/*.rs -> repositories/*.rs
//!                                      |
//!                                 access/guard.rs
//! ```
//!
//! # Modules
//!
//! - `access` - capabilities, policies and the authorization guard
//! - `config` - service configuration from environment
//! - `errors` - error type with HTTP status mapping
//! - `filter` - composable search criteria
//! - `identity` - caller identity and token resolution
//! - `repositories` - storage backends and the secured facade
//! - `services` - meeting and user operations, finalize engine
//! - `routes` - Axum router setup

pub mod access;
pub mod config;
pub mod errors;
pub mod filter;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
