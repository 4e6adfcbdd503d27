//! Types shared by the scheduler service and its test utilities.

#![warn(clippy::pedantic)]

/// Caller identity and role model
pub mod identity;

/// Paging types
pub mod types;

/// Shared configuration sections
pub mod config;

/// Secret types that prevent accidental logging
pub mod secret;
