//! In-memory storage backend.
//!
//! Rows live in a `BTreeMap` behind a tokio `RwLock`, so iteration order is
//! id order. Ids are assigned from an atomic counter. Every mutation,
//! including the finalize commit, runs under the write lock.
//!
//! A store can be linked to a user store with [`InMemoryRepository::linked_to`].
//! Rows read from a linked store carry the participants' current accounts,
//! the way the PostgreSQL backend joins `users` at read time. Lock order is
//! always this store first, then the user store.

use super::{ConflictFilterFn, Entity, FinalizeCommit, MeetingRepository, Repository};
use crate::errors::SchedulerError;
use crate::filter::Filter;
use crate::models::{Meeting, User};
use async_trait::async_trait;
use common::types::{Page, PageRequest};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard};

type Accounts<'a> = Option<RwLockReadGuard<'a, BTreeMap<i64, User>>>;

pub struct InMemoryRepository<T> {
    rows: RwLock<BTreeMap<i64, T>>,
    next_id: AtomicI64,
    accounts: Option<Arc<InMemoryRepository<User>>>,
}

impl<T> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
            accounts: None,
        }
    }
}

impl<T: Entity> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty store whose rows resolve participant accounts from `users`
    /// on every read.
    pub fn linked_to(users: Arc<InMemoryRepository<User>>) -> Self {
        Self {
            accounts: Some(users),
            ..Self::default()
        }
    }

    async fn accounts(&self) -> Accounts<'_> {
        match &self.accounts {
            Some(users) => Some(users.rows.read().await),
            None => None,
        }
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

/// `row` as a reader sees it: with current accounts when the store is
/// linked, otherwise as stored.
fn resolved<T: Entity>(row: &T, accounts: &Accounts<'_>) -> T {
    let mut row = row.clone();
    if let Some(users) = accounts {
        row.refresh_accounts(&|id| users.get(&id).and_then(|user| user.username.clone()));
    }
    row
}

fn check_unique<T: Entity>(rows: &BTreeMap<i64, T>, entity: &T) -> Result<(), SchedulerError> {
    rows.values()
        .filter(|existing| existing.id() != entity.id())
        .find_map(|existing| entity.uniqueness_violation(existing))
        .map_or(Ok(()), Err)
}

#[async_trait]
impl<T: Entity> Repository<T> for InMemoryRepository<T> {
    async fn save(&self, mut entity: T) -> Result<T, SchedulerError> {
        let mut rows = self.rows.write().await;
        if entity.id() <= 0 {
            entity.set_id(self.next_id.fetch_add(1, Ordering::SeqCst));
        } else if !rows.contains_key(&entity.id()) {
            return Err(SchedulerError::NotFound(T::NOT_FOUND));
        }
        check_unique(&rows, &entity)?;
        rows.insert(entity.id(), entity.clone());
        let accounts = self.accounts().await;
        Ok(resolved(&entity, &accounts))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<T>, SchedulerError> {
        let rows = self.rows.read().await;
        let accounts = self.accounts().await;
        Ok(rows.get(&id).map(|row| resolved(row, &accounts)))
    }

    async fn find_all(&self) -> Result<Vec<T>, SchedulerError> {
        let rows = self.rows.read().await;
        let accounts = self.accounts().await;
        Ok(rows.values().map(|row| resolved(row, &accounts)).collect())
    }

    async fn find_filtered(
        &self,
        filter: &Filter<T::Criterion>,
        page: PageRequest,
    ) -> Result<Page<T>, SchedulerError> {
        let rows = self.rows.read().await;
        let accounts = self.accounts().await;
        let matching: Vec<T> = rows
            .values()
            .map(|row| resolved(row, &accounts))
            .filter(|row| filter.matches(row))
            .collect();
        let total = matching.len() as u64;
        let skip = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let content = matching
            .into_iter()
            .skip(skip)
            .take(page.size() as usize)
            .collect();
        Ok(Page::new(content, page, total))
    }

    async fn delete_where(
        &self,
        id: i64,
        filter: &Filter<T::Criterion>,
    ) -> Result<bool, SchedulerError> {
        let mut rows = self.rows.write().await;
        let accounts = self.accounts().await;
        let deletable = rows
            .get(&id)
            .is_some_and(|row| filter.matches(&resolved(row, &accounts)));
        if deletable {
            rows.remove(&id);
        }
        Ok(deletable)
    }

    async fn exists(&self, filter: &Filter<T::Criterion>) -> Result<bool, SchedulerError> {
        let rows = self.rows.read().await;
        let accounts = self.accounts().await;
        Ok(rows.values().any(|row| filter.matches(&resolved(row, &accounts))))
    }
}

#[async_trait]
impl MeetingRepository for InMemoryRepository<Meeting> {
    async fn commit_finalize(
        &self,
        id: i64,
        conflicts: ConflictFilterFn,
    ) -> Result<FinalizeCommit, SchedulerError> {
        let mut rows = self.rows.write().await;

        let Some(meeting) = rows.get(&id) else {
            return Ok(FinalizeCommit::NotFound);
        };
        if meeting.is_finalized {
            return Ok(FinalizeCommit::AlreadyFinalized);
        }

        let accounts = self.accounts().await;
        let filter = conflicts(&resolved(meeting, &accounts));
        if rows
            .values()
            .any(|row| filter.matches(&resolved(row, &accounts)))
        {
            return Ok(FinalizeCommit::OverlapExists);
        }

        match rows.get_mut(&id) {
            Some(meeting) => {
                meeting.is_finalized = true;
                Ok(FinalizeCommit::Committed(resolved(meeting, &accounts)))
            }
            None => Ok(FinalizeCommit::NotFound),
        }
    }

    async fn update_draft(&self, meeting: Meeting) -> Result<Option<Meeting>, SchedulerError> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&meeting.id) {
            Some(stored) if !stored.is_finalized => {
                *stored = Meeting {
                    is_finalized: false,
                    ..meeting
                };
                let accounts = self.accounts().await;
                Ok(Some(resolved(stored, &accounts)))
            }
            _ => Ok(None),
        }
    }
}
