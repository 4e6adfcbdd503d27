//! Meeting operations.
//!
//! Single-meeting operations (get, update, delete, finalize) are guarded by
//! participation with the admin bypass. Listing and search go through the
//! secured facade, which scopes rows to meetings the caller takes part in
//! by user id, so a meeting is listed exactly when it could be fetched.

use super::finalize::FinalizeEngine;
use crate::access::{AccessGuard, AccessPolicy};
use crate::errors::{ConflictKind, NotFoundKind, SchedulerError};
use crate::filter::MeetingFilterBuilder;
use crate::identity::IdentityContext;
use crate::models::{
    CreateMeetingRequest, Meeting, MeetingSearchParams, MeetingState, ParticipantRef,
    UpdateMeetingRequest, User,
};
use crate::repositories::secured::SecuredRepository;
use crate::repositories::{Entity, MeetingRepository, Repository};
use common::types::{Page, PageRequest};
use std::sync::Arc;
use tracing::instrument;

const MEETING_POLICY: AccessPolicy = AccessPolicy::participation().with_admin_bypass();

pub struct MeetingService {
    meetings: Arc<dyn MeetingRepository>,
    users: Arc<dyn Repository<User>>,
    secured: SecuredRepository<Meeting, dyn MeetingRepository>,
    finalizer: FinalizeEngine,
}

impl MeetingService {
    pub fn new(meetings: Arc<dyn MeetingRepository>, users: Arc<dyn Repository<User>>) -> Self {
        Self {
            secured: SecuredRepository::new(Arc::clone(&meetings)),
            finalizer: FinalizeEngine::new(Arc::clone(&meetings), Arc::clone(&users)),
            meetings,
            users,
        }
    }

    /// Creates a draft. The caller must be the manager or the employee,
    /// unless they are an admin.
    #[instrument(skip_all, name = "scheduler.meetings.create")]
    pub async fn create(
        &self,
        ctx: &IdentityContext,
        request: CreateMeetingRequest,
    ) -> Result<Meeting, SchedulerError> {
        ctx.current()?;

        let manager = self.participant(request.manager_id).await?;
        let employee = self.participant(request.employee_id).await?;
        let meeting = Meeting::draft(
            request.title,
            request.description,
            request.start_time,
            request.end_time,
            manager,
            employee,
        )?;

        let saved = AccessGuard::guarded(MEETING_POLICY, ctx, &meeting, || {
            self.meetings.save(meeting.clone())
        })
        .await?;

        tracing::info!(
            target: "scheduler.meetings",
            meeting_id = saved.id,
            manager_id = saved.manager.user_id,
            employee_id = saved.employee.user_id,
            "Meeting created"
        );
        Ok(saved)
    }

    #[instrument(skip_all, name = "scheduler.meetings.get", fields(meeting_id = id))]
    pub async fn get_by_id(
        &self,
        ctx: &IdentityContext,
        id: i64,
    ) -> Result<Meeting, SchedulerError> {
        ctx.current()?;
        let meeting = self.load(id).await?;
        AccessGuard::check(MEETING_POLICY, ctx, &meeting)?;
        Ok(meeting)
    }

    /// Every meeting the caller may see.
    #[instrument(skip_all, name = "scheduler.meetings.list")]
    pub async fn list(&self, ctx: &IdentityContext) -> Result<Vec<Meeting>, SchedulerError> {
        self.secured.get_all(ctx, true).await
    }

    /// Paginated search. Absent parameters do not constrain the result.
    #[instrument(skip_all, name = "scheduler.meetings.search")]
    pub async fn search(
        &self,
        ctx: &IdentityContext,
        params: &MeetingSearchParams,
        page: PageRequest,
    ) -> Result<Page<Meeting>, SchedulerError> {
        let filter = MeetingFilterBuilder::new()
            .with_participant(params.participant_id)
            .with_meeting_id(params.meeting_id)
            .with_title(params.title.as_deref())
            .with_start(params.start)
            .with_end(params.end)
            .with_finalized(params.finalized)
            .build();
        self.secured.get_filtered(ctx, page, filter, true).await
    }

    /// Applies `patch` to a draft.
    #[instrument(skip_all, name = "scheduler.meetings.update", fields(meeting_id = id))]
    pub async fn update(
        &self,
        ctx: &IdentityContext,
        id: i64,
        patch: UpdateMeetingRequest,
    ) -> Result<Meeting, SchedulerError> {
        let mut meeting = self.get_by_id(ctx, id).await?;
        ensure_draft(&meeting)?;
        meeting.apply_update(&patch)?;

        match self.meetings.update_draft(meeting).await? {
            Some(updated) => Ok(updated),
            // Finalized or deleted since it was loaded.
            None => Err(self.vanished_draft(id).await?),
        }
    }

    /// Deletes a draft.
    #[instrument(skip_all, name = "scheduler.meetings.delete", fields(meeting_id = id))]
    pub async fn delete(&self, ctx: &IdentityContext, id: i64) -> Result<(), SchedulerError> {
        let meeting = self.get_by_id(ctx, id).await?;
        ensure_draft(&meeting)?;

        if self
            .meetings
            .delete_where(id, &Meeting::deletion_filter())
            .await?
        {
            tracing::info!(target: "scheduler.meetings", meeting_id = id, "Meeting deleted");
            Ok(())
        } else {
            Err(self.vanished_draft(id).await?)
        }
    }

    pub async fn finalize(
        &self,
        ctx: &IdentityContext,
        id: i64,
    ) -> Result<Meeting, SchedulerError> {
        self.finalizer.finalize(ctx, id).await
    }

    /// Storage connectivity, for health reporting.
    pub async fn ping(&self) -> Result<(), SchedulerError> {
        self.meetings.ping().await
    }

    async fn load(&self, id: i64) -> Result<Meeting, SchedulerError> {
        self.meetings
            .find_by_id(id)
            .await?
            .ok_or(SchedulerError::NotFound(NotFoundKind::Meeting))
    }

    async fn participant(&self, user_id: i64) -> Result<ParticipantRef, SchedulerError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(SchedulerError::NotFound(NotFoundKind::User))?;
        Ok(ParticipantRef::new(user.id, user.username))
    }

    /// Error for a conditional write that matched nothing.
    async fn vanished_draft(&self, id: i64) -> Result<SchedulerError, SchedulerError> {
        Ok(match self.meetings.find_by_id(id).await? {
            Some(_) => SchedulerError::Conflict(ConflictKind::FinalizedImmutable),
            None => SchedulerError::NotFound(NotFoundKind::Meeting),
        })
    }
}

fn ensure_draft(meeting: &Meeting) -> Result<(), SchedulerError> {
    match meeting.state() {
        MeetingState::Draft => Ok(()),
        MeetingState::Finalized => Err(SchedulerError::Conflict(ConflictKind::FinalizedImmutable)),
    }
}
