//! User model and its request/response shapes.

use crate::access::{AccessSubject, Ownable};
use crate::errors::{ConflictKind, NotFoundKind, SchedulerError};
use crate::filter::UserCriterion;
use crate::repositories::Entity;
use chrono::NaiveDate;
use common::identity::Identity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Employee,
    Manager,
    Director,
}

impl Position {
    pub fn as_str(self) -> &'static str {
        match self {
            Position::Employee => "employee",
            Position::Manager => "manager",
            Position::Director => "director",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "employee" => Ok(Position::Employee),
            "manager" => Ok(Position::Manager),
            "director" => Ok(Position::Director),
            other => Err(format!("unknown position: {other}")),
        }
    }
}

/// A person who can take part in meetings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Zero until the user is first saved.
    pub id: i64,
    pub name: String,
    pub position: Position,
    pub date_of_birth: NaiveDate,
    pub email: String,
    /// Linked login account; owns this record.
    pub username: Option<String>,
}

impl User {
    /// Applies the present fields of `patch`.
    pub fn apply_update(&mut self, patch: &UpdateUserRequest) {
        if let Some(name) = &patch.full_name {
            self.name.clone_from(name);
        }
        if let Some(email) = &patch.email {
            self.email.clone_from(email);
        }
        if let Some(position) = patch.position {
            self.position = position;
        }
        if let Some(date_of_birth) = patch.date_of_birth {
            self.date_of_birth = date_of_birth;
        }
    }
}

impl Ownable for User {
    fn has_access(&self, username: &str) -> bool {
        self.username.as_deref() == Some(username)
    }
}

impl AccessSubject for User {
    fn as_ownable(&self) -> Option<&dyn Ownable> {
        Some(self)
    }
}

impl Entity for User {
    type Criterion = UserCriterion;

    const NOT_FOUND: NotFoundKind = NotFoundKind::User;

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn access_criterion(identity: &Identity) -> UserCriterion {
        UserCriterion::AccessibleBy(identity.username().to_string())
    }

    fn uniqueness_violation(&self, other: &Self) -> Option<SchedulerError> {
        if self.email == other.email {
            return Some(SchedulerError::Conflict(ConflictKind::DuplicateEmail));
        }
        match (&self.username, &other.username) {
            (Some(a), Some(b)) if a == b => Some(account_already_linked()),
            _ => None,
        }
    }
}

/// Rejection for linking a login account that another user already holds.
pub(crate) fn account_already_linked() -> SchedulerError {
    SchedulerError::BadRequest("Login account is already linked to another user.".to_string())
}

/// Request body for `POST /api/v1/users`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateUserRequest {
    pub full_name: String,
    pub email: String,
    pub position: Position,
    pub date_of_birth: NaiveDate,
    /// Login account to link; defaults to none.
    #[serde(default)]
    pub username: Option<String>,
}

impl CreateUserRequest {
    pub fn into_user(self) -> User {
        User {
            id: 0,
            name: self.full_name,
            position: self.position,
            date_of_birth: self.date_of_birth,
            email: self.email,
            username: self.username,
        }
    }
}

/// Request body for `PUT /api/v1/users/:id`. Absent fields are kept.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub position: Option<Position>,
    pub date_of_birth: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub position: Position,
    pub date_of_birth: NaiveDate,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            full_name: user.name,
            email: user.email,
            position: user.position,
            date_of_birth: user.date_of_birth,
        }
    }
}

/// Query parameters for `GET /api/v1/users`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserSearchParams {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub position: Option<Position>,
    pub date_of_birth: Option<NaiveDate>,
    pub email: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}
