//! Storage for scheduler entities.
//!
//! [`Repository`] is the storage seam. Two backends implement it:
//! [`memory::InMemoryRepository`] and the PostgreSQL repositories in
//! [`postgres`]. [`secured::SecuredRepository`] wraps either one and puts
//! every read and delete behind the authorization guard.

pub mod memory;
pub mod postgres;
pub mod secured;

use crate::access::{AccessSubject, Ownable};
use crate::errors::{NotFoundKind, SchedulerError};
use crate::filter::{Criterion, Filter, MeetingFilter};
use crate::models::Meeting;
use async_trait::async_trait;
use common::identity::Identity;
use common::types::{Page, PageRequest};
use std::fmt;

/// A stored resource with an integer id and an owner.
pub trait Entity: AccessSubject + Ownable + Clone + fmt::Debug + Send + Sync + 'static {
    type Criterion: Criterion<Self> + Clone + fmt::Debug + Send + Sync + 'static;

    /// Reported when a lookup by id finds nothing.
    const NOT_FOUND: NotFoundKind;

    fn id(&self) -> i64;

    fn set_id(&mut self, id: i64);

    /// Criterion selecting the entities `identity` may see in listings.
    fn access_criterion(identity: &Identity) -> Self::Criterion;

    /// Overwrites fields that mirror another user's linked account.
    /// `account_of` maps a user id to that user's current account, or
    /// `None` when the user is gone or unlinked. Backends that keep such
    /// fields denormalized call this on every read.
    fn refresh_accounts(&mut self, _account_of: &dyn Fn(i64) -> Option<String>) {}

    /// Rows a delete is allowed to remove. Defaults to any row.
    fn deletion_filter() -> Filter<Self::Criterion> {
        Filter::all()
    }

    /// Uniqueness rule between two distinct rows, checked by backends
    /// without database constraints.
    fn uniqueness_violation(&self, _other: &Self) -> Option<SchedulerError> {
        None
    }
}

#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    /// Inserts when `id <= 0`, assigning a fresh id. Otherwise overwrites
    /// the existing row with that id, or fails with `NotFound`.
    async fn save(&self, entity: T) -> Result<T, SchedulerError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<T>, SchedulerError>;

    /// Every row, ordered by id.
    async fn find_all(&self) -> Result<Vec<T>, SchedulerError>;

    /// One page of rows matching `filter`, ordered by id, with the total
    /// match count.
    async fn find_filtered(
        &self,
        filter: &Filter<T::Criterion>,
        page: PageRequest,
    ) -> Result<Page<T>, SchedulerError>;

    async fn find_page(&self, page: PageRequest) -> Result<Page<T>, SchedulerError> {
        self.find_filtered(&Filter::all(), page).await
    }

    /// Deletes row `id` only if it matches `filter`. Returns whether a row
    /// was removed.
    async fn delete_where(
        &self,
        id: i64,
        filter: &Filter<T::Criterion>,
    ) -> Result<bool, SchedulerError>;

    async fn delete_by_id(&self, id: i64) -> Result<bool, SchedulerError> {
        self.delete_where(id, &Filter::all()).await
    }

    async fn exists(&self, filter: &Filter<T::Criterion>) -> Result<bool, SchedulerError>;

    /// Connectivity check for health reporting.
    async fn ping(&self) -> Result<(), SchedulerError> {
        Ok(())
    }
}

/// Outcome of an atomic finalize attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeCommit {
    Committed(Meeting),
    NotFound,
    AlreadyFinalized,
    OverlapExists,
}

/// Builds the conflict filter for the meeting as it stands when the
/// commit holds its lock.
pub type ConflictFilterFn = fn(&Meeting) -> MeetingFilter;

#[async_trait]
pub trait MeetingRepository: Repository<Meeting> {
    /// Re-reads meeting `id`, and flips it to finalized only if it is still
    /// a draft and nothing matches `conflicts(meeting)`. Check and flip are
    /// atomic with respect to other commits.
    async fn commit_finalize(
        &self,
        id: i64,
        conflicts: ConflictFilterFn,
    ) -> Result<FinalizeCommit, SchedulerError>;

    /// Writes `meeting` only if the stored row is still a draft. Returns
    /// `None` when the row is missing or finalized.
    async fn update_draft(&self, meeting: Meeting) -> Result<Option<Meeting>, SchedulerError>;
}
