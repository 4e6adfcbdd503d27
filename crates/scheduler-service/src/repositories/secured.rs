//! Secured resource facade.
//!
//! Wraps a [`Repository`] so that single reads and deletes run through the
//! ownership check of [`AccessGuard`]. Listings are scoped by the entity's
//! access criterion for the caller. For filtered, paginated reads that
//! criterion is pushed into the storage filter, so totals and page contents
//! only ever count rows the caller may see.

use super::{Entity, Repository};
use crate::access::{AccessGuard, AccessPolicy};
use crate::errors::SchedulerError;
use crate::filter::{Criterion, Filter};
use crate::identity::IdentityContext;
use common::types::{Page, PageRequest};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::instrument;

pub struct SecuredRepository<T, R: ?Sized> {
    inner: Arc<R>,
    _entity: PhantomData<fn() -> T>,
}

impl<T, R: ?Sized> Clone for SecuredRepository<T, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _entity: PhantomData,
        }
    }
}

impl<T, R> SecuredRepository<T, R>
where
    T: Entity,
    R: Repository<T> + ?Sized,
{
    pub fn new(inner: Arc<R>) -> Self {
        Self {
            inner,
            _entity: PhantomData,
        }
    }

    /// The wrapped repository, for operations that carry their own checks.
    pub fn repository(&self) -> &Arc<R> {
        &self.inner
    }

    /// Unchecked save.
    pub async fn save(&self, entity: T) -> Result<T, SchedulerError> {
        self.inner.save(entity).await
    }

    /// Loads `id` and checks ownership, with the admin bypass when
    /// `allow_admin` is set. `NotFound` precedes any access check.
    #[instrument(skip_all, name = "scheduler.secured.get_by_id", fields(id = id))]
    pub async fn get_by_id(
        &self,
        ctx: &IdentityContext,
        id: i64,
        allow_admin: bool,
    ) -> Result<T, SchedulerError> {
        ctx.current()?;
        let entity = self
            .inner
            .find_by_id(id)
            .await?
            .ok_or(SchedulerError::NotFound(T::NOT_FOUND))?;
        AccessGuard::check(AccessPolicy::ownership_with(allow_admin), ctx, &entity)?;
        Ok(entity)
    }

    /// Unfiltered page. Only for callers whose access is already scoped.
    pub async fn get_page(&self, page: PageRequest) -> Result<Page<T>, SchedulerError> {
        self.inner.find_page(page).await
    }

    /// Every entity the caller may see: all of them under the admin
    /// bypass, otherwise those matching the entity's access criterion.
    #[instrument(skip_all, name = "scheduler.secured.get_all")]
    pub async fn get_all(
        &self,
        ctx: &IdentityContext,
        allow_admin: bool,
    ) -> Result<Vec<T>, SchedulerError> {
        let identity = ctx.current()?;
        let all = self.inner.find_all().await?;
        if allow_admin && identity.is_admin() {
            return Ok(all);
        }

        let visible = T::access_criterion(identity);
        Ok(all
            .into_iter()
            .filter(|entity| visible.matches(entity))
            .collect())
    }

    /// A page of entities matching `filter` that the caller may see.
    #[instrument(skip_all, name = "scheduler.secured.get_filtered")]
    pub async fn get_filtered(
        &self,
        ctx: &IdentityContext,
        page: PageRequest,
        filter: Filter<T::Criterion>,
        allow_admin: bool,
    ) -> Result<Page<T>, SchedulerError> {
        let identity = ctx.current()?;
        let scoped = if allow_admin && identity.is_admin() {
            filter
        } else {
            filter.with(T::access_criterion(identity))
        };
        self.inner.find_filtered(&scoped, page).await
    }

    /// Checks ownership of `entity`, then deletes it if it still matches
    /// the entity's deletion filter. Returns whether a row was removed.
    #[instrument(skip_all, name = "scheduler.secured.delete")]
    pub async fn delete(
        &self,
        ctx: &IdentityContext,
        entity: &T,
        allow_admin: bool,
    ) -> Result<bool, SchedulerError> {
        let deletable = T::deletion_filter();
        AccessGuard::guarded(AccessPolicy::ownership_with(allow_admin), ctx, entity, || {
            self.inner.delete_where(entity.id(), &deletable)
        })
        .await
    }

    /// Existence check without access filtering.
    pub async fn exists_by(&self, filter: &Filter<T::Criterion>) -> Result<bool, SchedulerError> {
        self.inner.exists(filter).await
    }
}
