//! Meeting search criteria.

use super::{non_blank, Criterion, Filter};
use crate::access::Ownable;
use crate::models::Meeting;
use chrono::{DateTime, Utc};

pub type MeetingFilter = Filter<MeetingCriterion>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeetingCriterion {
    /// User is the manager or the employee.
    Participant(i64),
    /// Exact meeting id.
    Id(i64),
    /// Case-insensitive substring of the title; stored lowercased.
    TitleContains(String),
    /// `start_time >= value`
    StartsAtOrAfter(DateTime<Utc>),
    /// `end_time <= value`
    EndsAtOrBefore(DateTime<Utc>),
    Finalized(bool),
    /// Caller's username owns the meeting through one of its participants.
    AccessibleBy(String),
    ExcludeId(i64),
    /// Manager or employee is one of the two given users, in either role.
    ParticipantIn(i64, i64),
    /// Half-open intersection with `[start, end)`.
    OverlapsInterval {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl MeetingCriterion {
    pub fn participant(user_id: Option<i64>) -> Option<Self> {
        user_id.map(MeetingCriterion::Participant)
    }

    pub fn id(meeting_id: Option<i64>) -> Option<Self> {
        meeting_id.map(MeetingCriterion::Id)
    }

    /// `None` for an absent or blank title.
    pub fn title_contains(title: Option<&str>) -> Option<Self> {
        non_blank(title).map(|t| MeetingCriterion::TitleContains(t.to_lowercase()))
    }

    pub fn starts_at_or_after(start: Option<DateTime<Utc>>) -> Option<Self> {
        start.map(MeetingCriterion::StartsAtOrAfter)
    }

    pub fn ends_at_or_before(end: Option<DateTime<Utc>>) -> Option<Self> {
        end.map(MeetingCriterion::EndsAtOrBefore)
    }

    pub fn finalized(finalized: Option<bool>) -> Option<Self> {
        finalized.map(MeetingCriterion::Finalized)
    }
}

impl Criterion<Meeting> for MeetingCriterion {
    fn matches(&self, meeting: &Meeting) -> bool {
        match self {
            MeetingCriterion::Participant(user_id) => {
                meeting.manager.user_id == *user_id || meeting.employee.user_id == *user_id
            }
            MeetingCriterion::Id(id) => meeting.id == *id,
            MeetingCriterion::TitleContains(needle) => {
                meeting.title.to_lowercase().contains(needle.as_str())
            }
            MeetingCriterion::StartsAtOrAfter(start) => meeting.start_time >= *start,
            MeetingCriterion::EndsAtOrBefore(end) => meeting.end_time <= *end,
            MeetingCriterion::Finalized(finalized) => meeting.is_finalized == *finalized,
            MeetingCriterion::AccessibleBy(username) => meeting.has_access(username),
            MeetingCriterion::ExcludeId(id) => meeting.id != *id,
            MeetingCriterion::ParticipantIn(a, b) => meeting
                .participant_ids()
                .iter()
                .any(|id| id == a || id == b),
            MeetingCriterion::OverlapsInterval { start, end } => meeting.overlaps(*start, *end),
        }
    }
}

/// Builds a search filter from optional inputs.
#[derive(Debug, Clone, Default)]
pub struct MeetingFilterBuilder {
    filter: MeetingFilter,
}

impl MeetingFilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_participant(mut self, user_id: Option<i64>) -> Self {
        self.filter = self.filter.and(MeetingCriterion::participant(user_id));
        self
    }

    pub fn with_meeting_id(mut self, meeting_id: Option<i64>) -> Self {
        self.filter = self.filter.and(MeetingCriterion::id(meeting_id));
        self
    }

    pub fn with_title(mut self, title: Option<&str>) -> Self {
        self.filter = self.filter.and(MeetingCriterion::title_contains(title));
        self
    }

    pub fn with_start(mut self, start: Option<DateTime<Utc>>) -> Self {
        self.filter = self
            .filter
            .and(MeetingCriterion::starts_at_or_after(start));
        self
    }

    pub fn with_end(mut self, end: Option<DateTime<Utc>>) -> Self {
        self.filter = self.filter.and(MeetingCriterion::ends_at_or_before(end));
        self
    }

    pub fn with_finalized(mut self, finalized: Option<bool>) -> Self {
        self.filter = self.filter.and(MeetingCriterion::finalized(finalized));
        self
    }

    pub fn build(self) -> MeetingFilter {
        self.filter
    }
}

/// Finalized meetings, other than `meeting` itself, that share a
/// participant with it in either role and intersect its time range.
pub fn overlap_filter(meeting: &Meeting) -> MeetingFilter {
    Filter::all()
        .with(MeetingCriterion::ExcludeId(meeting.id))
        .with(MeetingCriterion::Finalized(true))
        .with(MeetingCriterion::ParticipantIn(
            meeting.manager.user_id,
            meeting.employee.user_id,
        ))
        .with(MeetingCriterion::OverlapsInterval {
            start: meeting.start_time,
            end: meeting.end_time,
        })
}
