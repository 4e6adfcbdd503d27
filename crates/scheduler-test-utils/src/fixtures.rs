//! Fixtures for scheduler tests.
//!
//! Seeded users are linked to a login account named after them, so
//! `ctx_for(&user)` yields a caller who both owns the user record and
//! participates in that user's meetings.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use common::identity::{Identity, Role};
use scheduler_service::config::Config;
use scheduler_service::identity::IdentityContext;
use scheduler_service::models::{CreateMeetingRequest, Position, User};
use scheduler_service::repositories::Repository;
use std::collections::HashMap;

/// Signing secret shared by `test_config()` and the token builders.
pub const TEST_JWT_SECRET: &str = "scheduler-test-secret-0123456789abcdef";

/// User id of the admin returned by `admin_ctx()`. No user row has it.
pub const ADMIN_USER_ID: i64 = 1_000_000;

/// Valid configuration for in-process tests: random port, no drain, no
/// database.
pub fn test_config() -> Config {
    let vars: HashMap<String, String> = [
        ("JWT_SECRET", TEST_JWT_SECRET),
        ("BIND_ADDRESS", "127.0.0.1:0"),
        ("SHUTDOWN_DRAIN_SECONDS", "0"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    Config::from_vars(&vars).expect("test configuration should be valid")
}

pub fn identity(user_id: i64, username: &str) -> Identity {
    Identity::new(user_id, username, [Role::User])
}

/// Authenticated non-admin caller.
pub fn member(user_id: i64, username: &str) -> IdentityContext {
    IdentityContext::authenticated(identity(user_id, username))
}

pub fn admin_ctx() -> IdentityContext {
    IdentityContext::authenticated(Identity::new(ADMIN_USER_ID, "admin", [Role::Admin]))
}

/// Caller logged in as the account linked to `user`.
pub fn ctx_for(user: &User) -> IdentityContext {
    let username = user
        .username
        .as_deref()
        .expect("fixture user should have a linked account");
    member(user.id, username)
}

/// Unsaved user linked to the account `name.to_lowercase()`.
pub fn user(name: &str) -> User {
    let account = name.to_lowercase();
    User {
        id: 0,
        name: name.to_string(),
        position: Position::Employee,
        date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 15).expect("valid date"),
        email: format!("{account}@example.com"),
        username: Some(account),
    }
}

/// Saves one linked user per name, in order.
pub async fn seed_users<R>(repo: &R, names: &[&str]) -> Vec<User>
where
    R: Repository<User> + ?Sized,
{
    let mut saved = Vec::with_capacity(names.len());
    for name in names {
        saved.push(repo.save(user(name)).await.expect("seeding user should succeed"));
    }
    saved
}

/// A fixed day at `hour:minute` UTC.
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 18, hour, minute, 0)
        .single()
        .expect("valid timestamp")
}

pub fn meeting_request(
    manager_id: i64,
    employee_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> CreateMeetingRequest {
    CreateMeetingRequest {
        manager_id,
        employee_id,
        title: "One-on-one".to_string(),
        description: String::new(),
        start_time: start,
        end_time: end,
    }
}
