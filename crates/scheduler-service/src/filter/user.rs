//! User search criteria.

use super::{non_blank, Criterion, Filter};
use crate::access::Ownable;
use crate::models::{Position, User};
use chrono::NaiveDate;

pub type UserFilter = Filter<UserCriterion>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCriterion {
    Id(i64),
    /// Case-insensitive substring of the name; stored lowercased.
    NameContains(String),
    Position(Position),
    DateOfBirth(NaiveDate),
    /// Exact email match.
    Email(String),
    /// Excludes one user, used by uniqueness checks on update.
    ExcludeId(i64),
    /// The user's linked account is `username`.
    AccessibleBy(String),
}

impl UserCriterion {
    pub fn id(id: Option<i64>) -> Option<Self> {
        id.map(UserCriterion::Id)
    }

    pub fn name_contains(name: Option<&str>) -> Option<Self> {
        non_blank(name).map(|n| UserCriterion::NameContains(n.to_lowercase()))
    }

    pub fn position(position: Option<Position>) -> Option<Self> {
        position.map(UserCriterion::Position)
    }

    pub fn date_of_birth(date_of_birth: Option<NaiveDate>) -> Option<Self> {
        date_of_birth.map(UserCriterion::DateOfBirth)
    }

    pub fn email(email: Option<&str>) -> Option<Self> {
        non_blank(email).map(|e| UserCriterion::Email(e.to_string()))
    }
}

impl Criterion<User> for UserCriterion {
    fn matches(&self, user: &User) -> bool {
        match self {
            UserCriterion::Id(id) => user.id == *id,
            UserCriterion::NameContains(needle) => {
                user.name.to_lowercase().contains(needle.as_str())
            }
            UserCriterion::Position(position) => user.position == *position,
            UserCriterion::DateOfBirth(date) => user.date_of_birth == *date,
            UserCriterion::Email(email) => user.email == *email,
            UserCriterion::ExcludeId(id) => user.id != *id,
            UserCriterion::AccessibleBy(username) => user.has_access(username),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserFilterBuilder {
    filter: UserFilter,
}

impl UserFilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: Option<i64>) -> Self {
        self.filter = self.filter.and(UserCriterion::id(id));
        self
    }

    pub fn with_name(mut self, name: Option<&str>) -> Self {
        self.filter = self.filter.and(UserCriterion::name_contains(name));
        self
    }

    pub fn with_position(mut self, position: Option<Position>) -> Self {
        self.filter = self.filter.and(UserCriterion::position(position));
        self
    }

    pub fn with_date_of_birth(mut self, date_of_birth: Option<NaiveDate>) -> Self {
        self.filter = self.filter.and(UserCriterion::date_of_birth(date_of_birth));
        self
    }

    pub fn with_email(mut self, email: Option<&str>) -> Self {
        self.filter = self.filter.and(UserCriterion::email(email));
        self
    }

    pub fn build(self) -> UserFilter {
        self.filter
    }
}
