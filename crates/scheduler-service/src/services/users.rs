//! User operations.
//!
//! Users are guarded by ownership: the caller's login account must be the
//! one linked to the user. Admins bypass the check everywhere except
//! update, which only the owner may perform.

use crate::access::{AccessGuard, AccessPolicy};
use crate::errors::{ConflictKind, NotFoundKind, SchedulerError};
use crate::filter::{Filter, UserCriterion, UserFilterBuilder};
use crate::identity::IdentityContext;
use crate::models::{CreateUserRequest, UpdateUserRequest, User, UserSearchParams};
use crate::repositories::secured::SecuredRepository;
use crate::repositories::Repository;
use common::types::{Page, PageRequest};
use std::sync::Arc;
use tracing::instrument;

pub struct UserService {
    secured: SecuredRepository<User, dyn Repository<User>>,
}

impl UserService {
    pub fn new(users: Arc<dyn Repository<User>>) -> Self {
        Self {
            secured: SecuredRepository::new(users),
        }
    }

    /// Creates a user. The new user must be linked to the caller's own
    /// account unless the caller is an admin.
    #[instrument(skip_all, name = "scheduler.users.create")]
    pub async fn create(
        &self,
        ctx: &IdentityContext,
        request: CreateUserRequest,
    ) -> Result<User, SchedulerError> {
        ctx.current()?;
        if self.exists_by_email(&request.email).await? {
            return Err(SchedulerError::Conflict(ConflictKind::DuplicateEmail));
        }

        let user = request.into_user();
        let saved = AccessGuard::guarded(AccessPolicy::ownership_with(true), ctx, &user, || {
            self.secured.save(user.clone())
        })
        .await?;

        tracing::info!(target: "scheduler.users", user_id = saved.id, "User created");
        Ok(saved)
    }

    pub async fn get_by_id(&self, ctx: &IdentityContext, id: i64) -> Result<User, SchedulerError> {
        self.secured.get_by_id(ctx, id, true).await
    }

    pub async fn list(&self, ctx: &IdentityContext) -> Result<Vec<User>, SchedulerError> {
        self.secured.get_all(ctx, true).await
    }

    #[instrument(skip_all, name = "scheduler.users.search")]
    pub async fn search(
        &self,
        ctx: &IdentityContext,
        params: &UserSearchParams,
        page: PageRequest,
    ) -> Result<Page<User>, SchedulerError> {
        let filter = UserFilterBuilder::new()
            .with_id(params.id)
            .with_name(params.name.as_deref())
            .with_position(params.position)
            .with_date_of_birth(params.date_of_birth)
            .with_email(params.email.as_deref())
            .build();
        self.secured.get_filtered(ctx, page, filter, true).await
    }

    /// Owner-only update. A changed email must stay unique.
    #[instrument(skip_all, name = "scheduler.users.update", fields(user_id = id))]
    pub async fn update(
        &self,
        ctx: &IdentityContext,
        id: i64,
        patch: UpdateUserRequest,
    ) -> Result<User, SchedulerError> {
        let mut user = self.secured.get_by_id(ctx, id, false).await?;

        if let Some(email) = patch.email.as_deref().filter(|email| *email != user.email) {
            let taken = Filter::all()
                .with(UserCriterion::Email(email.to_string()))
                .with(UserCriterion::ExcludeId(id));
            if self.secured.exists_by(&taken).await? {
                return Err(SchedulerError::Conflict(ConflictKind::DuplicateEmail));
            }
        }

        user.apply_update(&patch);
        self.secured.save(user).await
    }

    #[instrument(skip_all, name = "scheduler.users.delete", fields(user_id = id))]
    pub async fn delete(&self, ctx: &IdentityContext, id: i64) -> Result<(), SchedulerError> {
        let user = self.secured.get_by_id(ctx, id, true).await?;
        if self.secured.delete(ctx, &user, true).await? {
            tracing::info!(target: "scheduler.users", user_id = id, "User deleted");
            Ok(())
        } else {
            Err(SchedulerError::NotFound(NotFoundKind::User))
        }
    }

    /// Unscoped existence check, used for uniqueness.
    pub async fn exists_by_email(&self, email: &str) -> Result<bool, SchedulerError> {
        let filter = Filter::all().with(UserCriterion::Email(email.to_string()));
        self.secured.exists_by(&filter).await
    }

    pub async fn ping(&self) -> Result<(), SchedulerError> {
        self.secured.repository().ping().await
    }
}
