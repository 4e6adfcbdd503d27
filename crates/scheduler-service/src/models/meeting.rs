//! Meeting model and its request/response shapes.

use crate::access::{AccessSubject, Ownable, Participatable};
use crate::errors::{NotFoundKind, SchedulerError};
use crate::filter::{Filter, MeetingCriterion};
use crate::repositories::Entity;
use chrono::{DateTime, Utc};
use common::identity::Identity;
use serde::{Deserialize, Serialize};

/// Reference from a meeting to one of its participants.
///
/// `username` is the participant's linked login account, resolved when
/// the meeting is loaded; `None` when the user has no account or no
/// longer exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRef {
    pub user_id: i64,
    pub username: Option<String>,
}

impl ParticipantRef {
    pub fn new(user_id: i64, username: Option<String>) -> Self {
        Self { user_id, username }
    }
}

/// Lifecycle state. `Finalized` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeetingState {
    Draft,
    Finalized,
}

/// A meeting between a manager and an employee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meeting {
    /// Zero until the meeting is first saved.
    pub id: i64,
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub manager: ParticipantRef,
    pub employee: ParticipantRef,
    pub is_finalized: bool,
}

impl Meeting {
    /// New unsaved draft. Rejects `start_time >= end_time`.
    pub fn draft(
        title: impl Into<String>,
        description: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        manager: ParticipantRef,
        employee: ParticipantRef,
    ) -> Result<Self, SchedulerError> {
        validate_time_range(start_time, end_time)?;
        Ok(Self {
            id: 0,
            title: title.into(),
            description: description.into(),
            start_time,
            end_time,
            manager,
            employee,
            is_finalized: false,
        })
    }

    pub fn state(&self) -> MeetingState {
        if self.is_finalized {
            MeetingState::Finalized
        } else {
            MeetingState::Draft
        }
    }

    pub fn participant_ids(&self) -> [i64; 2] {
        [self.manager.user_id, self.employee.user_id]
    }

    /// Half-open interval intersection: meetings that merely touch do not
    /// overlap.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time < end && self.end_time > start
    }

    /// Applies the present fields of `patch`, keeping the time range valid.
    pub fn apply_update(&mut self, patch: &UpdateMeetingRequest) -> Result<(), SchedulerError> {
        let start_time = patch.start_time.unwrap_or(self.start_time);
        let end_time = patch.end_time.unwrap_or(self.end_time);
        validate_time_range(start_time, end_time)?;

        if let Some(title) = &patch.title {
            self.title.clone_from(title);
        }
        if let Some(description) = &patch.description {
            self.description.clone_from(description);
        }
        self.start_time = start_time;
        self.end_time = end_time;
        Ok(())
    }
}

fn validate_time_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), SchedulerError> {
    if start < end {
        Ok(())
    } else {
        Err(SchedulerError::invalid_time_range())
    }
}

impl Ownable for Meeting {
    fn has_access(&self, username: &str) -> bool {
        [&self.manager, &self.employee]
            .iter()
            .any(|p| p.username.as_deref() == Some(username))
    }
}

impl Participatable for Meeting {
    fn is_participant(&self, user_id: i64) -> bool {
        self.participant_ids().contains(&user_id)
    }
}

impl AccessSubject for Meeting {
    fn as_ownable(&self) -> Option<&dyn Ownable> {
        Some(self)
    }

    fn as_participatable(&self) -> Option<&dyn Participatable> {
        Some(self)
    }
}

impl Entity for Meeting {
    type Criterion = MeetingCriterion;

    const NOT_FOUND: NotFoundKind = NotFoundKind::Meeting;

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    /// Listings show the meetings the caller takes part in, matching the
    /// participation policy of single-meeting operations.
    fn access_criterion(identity: &Identity) -> MeetingCriterion {
        MeetingCriterion::Participant(identity.user_id())
    }

    fn refresh_accounts(&mut self, account_of: &dyn Fn(i64) -> Option<String>) {
        self.manager.username = account_of(self.manager.user_id);
        self.employee.username = account_of(self.employee.user_id);
    }

    /// Finalized meetings are never deleted.
    fn deletion_filter() -> Filter<MeetingCriterion> {
        Filter::all().with(MeetingCriterion::Finalized(false))
    }
}

/// Request body for `POST /api/v1/meetings`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateMeetingRequest {
    pub manager_id: i64,
    pub employee_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Request body for `PUT /api/v1/meetings/:id`. Absent fields are kept.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UpdateMeetingRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub manager_id: i64,
    pub employee_id: i64,
    pub is_finalized: bool,
}

impl From<Meeting> for MeetingResponse {
    fn from(meeting: Meeting) -> Self {
        Self {
            id: meeting.id,
            title: meeting.title,
            description: meeting.description,
            start_time: meeting.start_time,
            end_time: meeting.end_time,
            manager_id: meeting.manager.user_id,
            employee_id: meeting.employee.user_id,
            is_finalized: meeting.is_finalized,
        }
    }
}

/// Query parameters for `GET /api/v1/meetings`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeetingSearchParams {
    pub participant_id: Option<i64>,
    pub meeting_id: Option<i64>,
    pub title: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub finalized: Option<bool>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}
