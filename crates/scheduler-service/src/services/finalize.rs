//! Meeting finalize state machine.
//!
//! A meeting moves `Draft -> Finalized` once and never back. Finalizing
//! runs these steps, failing at the first that does not hold:
//!
//! 1. load the meeting (`NotFound`)
//! 2. participation guard with the admin bypass (`AccessDenied`)
//! 3. still a draft (`AlreadyFinalized`)
//! 4. manager and employee still exist (`ParticipantMissing`)
//! 5. no finalized meeting of either participant intersects it (`OverlapExists`)
//! 6. atomic commit, which re-checks 3 and 5 under the storage lock
//!
//! Step 5 is the fast path that turns away obvious conflicts. Step 6 is
//! what holds under concurrent finalizes.

use crate::access::{AccessGuard, AccessPolicy};
use crate::errors::{ConflictKind, NotFoundKind, SchedulerError};
use crate::filter::meeting::overlap_filter;
use crate::identity::IdentityContext;
use crate::models::{Meeting, MeetingState, User};
use crate::observability::metrics::record_finalize;
use crate::repositories::{FinalizeCommit, MeetingRepository, Repository};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Policy for finalizing: a participant, or an admin.
const FINALIZE_POLICY: AccessPolicy = AccessPolicy::participation().with_admin_bypass();

pub struct FinalizeEngine {
    meetings: Arc<dyn MeetingRepository>,
    users: Arc<dyn Repository<User>>,
}

impl FinalizeEngine {
    pub fn new(meetings: Arc<dyn MeetingRepository>, users: Arc<dyn Repository<User>>) -> Self {
        Self { meetings, users }
    }

    /// Finalizes meeting `id` on behalf of the caller in `ctx`.
    #[instrument(
        skip_all,
        name = "scheduler.finalize",
        fields(meeting_id = id, outcome = tracing::field::Empty)
    )]
    pub async fn finalize(
        &self,
        ctx: &IdentityContext,
        id: i64,
    ) -> Result<Meeting, SchedulerError> {
        let start = Instant::now();
        let result = self.run(ctx, id).await;

        let outcome = outcome_label(&result);
        tracing::Span::current().record("outcome", outcome);
        record_finalize(outcome, start.elapsed());
        result
    }

    async fn run(&self, ctx: &IdentityContext, id: i64) -> Result<Meeting, SchedulerError> {
        let identity = ctx.current()?;

        let meeting = self
            .meetings
            .find_by_id(id)
            .await?
            .ok_or(SchedulerError::NotFound(NotFoundKind::Meeting))?;

        AccessGuard::check(FINALIZE_POLICY, ctx, &meeting)?;

        if meeting.state() == MeetingState::Finalized {
            return Err(SchedulerError::Conflict(ConflictKind::AlreadyFinalized));
        }

        for user_id in meeting.participant_ids() {
            if self.users.find_by_id(user_id).await?.is_none() {
                tracing::warn!(
                    target: "scheduler.finalize",
                    meeting_id = id,
                    user_id,
                    "Meeting references a missing participant"
                );
                return Err(SchedulerError::NotFound(NotFoundKind::ParticipantMissing));
            }
        }

        if self.meetings.exists(&overlap_filter(&meeting)).await? {
            return Err(SchedulerError::Conflict(ConflictKind::OverlapExists));
        }

        match self.meetings.commit_finalize(id, overlap_filter).await? {
            FinalizeCommit::Committed(finalized) => {
                tracing::info!(
                    target: "scheduler.finalize",
                    meeting_id = id,
                    user_id = identity.user_id(),
                    "Meeting finalized"
                );
                Ok(finalized)
            }
            FinalizeCommit::NotFound => Err(SchedulerError::NotFound(NotFoundKind::Meeting)),
            FinalizeCommit::AlreadyFinalized => {
                Err(SchedulerError::Conflict(ConflictKind::AlreadyFinalized))
            }
            FinalizeCommit::OverlapExists => {
                tracing::debug!(
                    target: "scheduler.finalize",
                    meeting_id = id,
                    "Overlap appeared between check and commit"
                );
                Err(SchedulerError::Conflict(ConflictKind::OverlapExists))
            }
        }
    }
}

fn outcome_label(result: &Result<Meeting, SchedulerError>) -> &'static str {
    match result {
        Ok(_) => "finalized",
        Err(SchedulerError::Conflict(ConflictKind::AlreadyFinalized)) => "already_finalized",
        Err(SchedulerError::Conflict(ConflictKind::OverlapExists)) => "overlap",
        Err(SchedulerError::NotFound(NotFoundKind::ParticipantMissing)) => "participant_missing",
        Err(SchedulerError::NotFound(_)) => "not_found",
        Err(SchedulerError::Unauthenticated | SchedulerError::AccessDenied) => "denied",
        Err(_) => "error",
    }
}
