//! Composable query filters.
//!
//! A [`Filter`] is an ordered list of criteria joined by logical AND. Each
//! criterion is a plain value, so the same filter can be evaluated in
//! memory through [`Criterion::matches`] or rendered to SQL by a storage
//! backend. Absent inputs add nothing; an empty filter matches everything.

pub mod meeting;
pub mod user;

pub use meeting::{MeetingCriterion, MeetingFilter, MeetingFilterBuilder};
pub use user::{UserCriterion, UserFilter, UserFilterBuilder};

/// A single predicate over `T`.
pub trait Criterion<T> {
    fn matches(&self, item: &T) -> bool;
}

/// Conjunction of criteria.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter<C> {
    criteria: Vec<C>,
}

impl<C> Default for Filter<C> {
    fn default() -> Self {
        Self::all()
    }
}

impl<C> Filter<C> {
    /// The filter that matches everything.
    pub fn all() -> Self {
        Self {
            criteria: Vec::new(),
        }
    }

    /// Adds `criterion` if present; `None` leaves the filter unchanged.
    pub fn and(mut self, criterion: Option<C>) -> Self {
        if let Some(criterion) = criterion {
            self.criteria.push(criterion);
        }
        self
    }

    pub fn with(mut self, criterion: C) -> Self {
        self.criteria.push(criterion);
        self
    }

    /// Appends every criterion of `other`.
    pub fn and_filter(mut self, other: Filter<C>) -> Self {
        self.criteria.extend(other.criteria);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn criteria(&self) -> &[C] {
        &self.criteria
    }

    pub fn matches<T>(&self, item: &T) -> bool
    where
        C: Criterion<T>,
    {
        self.criteria.iter().all(|criterion| criterion.matches(item))
    }
}

/// Returns `Some(value)` unless the string is absent or blank.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
