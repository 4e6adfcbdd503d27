//! PostgreSQL storage backend.
//!
//! Filters are rendered into parameterized SQL with `sqlx::QueryBuilder`;
//! user input is only ever bound, never interpolated.
//!
//! # Finalize commit
//!
//! `commit_finalize` runs in one transaction:
//!
//! 1. lock the meeting row (`FOR UPDATE`)
//! 2. take `pg_advisory_xact_lock` on each participant id, ascending, so
//!    two finalizes sharing a participant serialize
//! 3. re-run the overlap query against committed state
//! 4. `UPDATE ... WHERE is_finalized = FALSE`
//!
//! All locks are released at commit or rollback.

use super::{ConflictFilterFn, Entity, FinalizeCommit, MeetingRepository, Repository};
use crate::errors::{ConflictKind, SchedulerError};
use crate::filter::{Filter, MeetingCriterion, UserCriterion};
use crate::models::user::account_already_linked;
use crate::models::{Meeting, ParticipantRef, Position, User};
use crate::observability::metrics::record_db_query;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::types::{Page, PageRequest};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::time::Instant;
use tracing::instrument;

/// Renders a criterion as a parenthesized SQL predicate.
trait PushSql {
    fn push_sql(&self, qb: &mut QueryBuilder<'_, Postgres>);
}

fn push_where<C: PushSql>(qb: &mut QueryBuilder<'_, Postgres>, filter: &Filter<C>) {
    for (i, criterion) in filter.criteria().iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        criterion.push_sql(qb);
    }
}

/// `%needle%` with LIKE metacharacters escaped, for `LIKE ... ESCAPE '\'`.
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn limit_offset(page: PageRequest) -> (i64, i64) {
    (
        i64::from(page.size()),
        i64::try_from(page.offset()).unwrap_or(i64::MAX),
    )
}

/// Records query duration and outcome, passing the result through.
fn observed<T>(
    operation: &'static str,
    start: Instant,
    result: Result<T, sqlx::Error>,
) -> Result<T, sqlx::Error> {
    let status = if result.is_ok() { "success" } else { "error" };
    record_db_query(operation, status, start.elapsed());
    result
}

// ============================================================================
// Meetings
// ============================================================================

const MEETING_FROM: &str = " FROM meetings m \
     LEFT JOIN users mu ON mu.id = m.manager_id \
     LEFT JOIN users eu ON eu.id = m.employee_id";

const MEETING_COLUMNS: &str = "SELECT m.id, m.title, m.description, m.start_time, m.end_time, \
     m.manager_id, mu.username AS manager_username, \
     m.employee_id, eu.username AS employee_username, m.is_finalized";

impl PushSql for MeetingCriterion {
    fn push_sql(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            MeetingCriterion::Participant(user_id) => {
                qb.push("(m.manager_id = ")
                    .push_bind(*user_id)
                    .push(" OR m.employee_id = ")
                    .push_bind(*user_id)
                    .push(")");
            }
            MeetingCriterion::Id(id) => {
                qb.push("(m.id = ").push_bind(*id).push(")");
            }
            MeetingCriterion::TitleContains(needle) => {
                qb.push("(LOWER(m.title) LIKE ")
                    .push_bind(like_pattern(needle))
                    .push(" ESCAPE '\\')");
            }
            MeetingCriterion::StartsAtOrAfter(start) => {
                qb.push("(m.start_time >= ").push_bind(*start).push(")");
            }
            MeetingCriterion::EndsAtOrBefore(end) => {
                qb.push("(m.end_time <= ").push_bind(*end).push(")");
            }
            MeetingCriterion::Finalized(finalized) => {
                qb.push("(m.is_finalized = ").push_bind(*finalized).push(")");
            }
            MeetingCriterion::AccessibleBy(username) => {
                qb.push("(mu.username = ")
                    .push_bind(username.clone())
                    .push(" OR eu.username = ")
                    .push_bind(username.clone())
                    .push(")");
            }
            MeetingCriterion::ExcludeId(id) => {
                qb.push("(m.id <> ").push_bind(*id).push(")");
            }
            MeetingCriterion::ParticipantIn(a, b) => {
                qb.push("(m.manager_id IN (")
                    .push_bind(*a)
                    .push(", ")
                    .push_bind(*b)
                    .push(") OR m.employee_id IN (")
                    .push_bind(*a)
                    .push(", ")
                    .push_bind(*b)
                    .push("))");
            }
            MeetingCriterion::OverlapsInterval { start, end } => {
                qb.push("(m.start_time < ")
                    .push_bind(*end)
                    .push(" AND m.end_time > ")
                    .push_bind(*start)
                    .push(")");
            }
        }
    }
}

#[derive(sqlx::FromRow)]
struct MeetingRow {
    id: i64,
    title: String,
    description: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    manager_id: i64,
    manager_username: Option<String>,
    employee_id: i64,
    employee_username: Option<String>,
    is_finalized: bool,
}

impl From<MeetingRow> for Meeting {
    fn from(row: MeetingRow) -> Self {
        Meeting {
            id: row.id,
            title: row.title,
            description: row.description,
            start_time: row.start_time,
            end_time: row.end_time,
            manager: ParticipantRef::new(row.manager_id, row.manager_username),
            employee: ParticipantRef::new(row.employee_id, row.employee_username),
            is_finalized: row.is_finalized,
        }
    }
}

fn meeting_select(filter: &Filter<MeetingCriterion>) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(MEETING_COLUMNS);
    qb.push(MEETING_FROM);
    push_where(&mut qb, filter);
    qb
}

fn meeting_exists_query(filter: &Filter<MeetingCriterion>) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT EXISTS(SELECT 1");
    qb.push(MEETING_FROM);
    push_where(&mut qb, filter);
    qb.push(")");
    qb
}

/// Meeting repository backed by the `meetings` table.
#[derive(Clone)]
pub struct PgMeetingRepository {
    pool: PgPool,
}

impl PgMeetingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository<Meeting> for PgMeetingRepository {
    #[instrument(skip_all, name = "scheduler.repo.meetings.save")]
    async fn save(&self, mut meeting: Meeting) -> Result<Meeting, SchedulerError> {
        let start = Instant::now();
        if meeting.id <= 0 {
            let id: i64 = observed(
                "meetings.insert",
                start,
                sqlx::query_scalar(
                    r#"
                    INSERT INTO meetings
                        (title, description, start_time, end_time, manager_id, employee_id, is_finalized)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    RETURNING id
                    "#,
                )
                .bind(&meeting.title)
                .bind(&meeting.description)
                .bind(meeting.start_time)
                .bind(meeting.end_time)
                .bind(meeting.manager.user_id)
                .bind(meeting.employee.user_id)
                .bind(meeting.is_finalized)
                .fetch_one(&self.pool)
                .await,
            )?;
            meeting.id = id;
        } else {
            let updated: Option<i64> = observed(
                "meetings.update",
                start,
                sqlx::query_scalar(
                    r#"
                    UPDATE meetings
                    SET title = $2, description = $3, start_time = $4, end_time = $5,
                        manager_id = $6, employee_id = $7, is_finalized = $8,
                        updated_at = NOW()
                    WHERE id = $1
                    RETURNING id
                    "#,
                )
                .bind(meeting.id)
                .bind(&meeting.title)
                .bind(&meeting.description)
                .bind(meeting.start_time)
                .bind(meeting.end_time)
                .bind(meeting.manager.user_id)
                .bind(meeting.employee.user_id)
                .bind(meeting.is_finalized)
                .fetch_optional(&self.pool)
                .await,
            )?;
            if updated.is_none() {
                return Err(SchedulerError::NotFound(Meeting::NOT_FOUND));
            }
        }

        tracing::debug!(target: "scheduler.repo.meetings", meeting_id = meeting.id, "Meeting saved");
        Ok(meeting)
    }

    #[instrument(skip_all, name = "scheduler.repo.meetings.find_by_id", fields(meeting_id = id))]
    async fn find_by_id(&self, id: i64) -> Result<Option<Meeting>, SchedulerError> {
        let start = Instant::now();
        let filter = Filter::all().with(MeetingCriterion::Id(id));
        let row: Option<MeetingRow> = observed(
            "meetings.find_by_id",
            start,
            meeting_select(&filter)
                .build_query_as()
                .fetch_optional(&self.pool)
                .await,
        )?;
        Ok(row.map(Meeting::from))
    }

    #[instrument(skip_all, name = "scheduler.repo.meetings.find_all")]
    async fn find_all(&self) -> Result<Vec<Meeting>, SchedulerError> {
        let start = Instant::now();
        let mut qb = meeting_select(&Filter::all());
        qb.push(" ORDER BY m.id");
        let rows: Vec<MeetingRow> = observed(
            "meetings.find_all",
            start,
            qb.build_query_as().fetch_all(&self.pool).await,
        )?;
        Ok(rows.into_iter().map(Meeting::from).collect())
    }

    #[instrument(skip_all, name = "scheduler.repo.meetings.find_filtered")]
    async fn find_filtered(
        &self,
        filter: &Filter<MeetingCriterion>,
        page: PageRequest,
    ) -> Result<Page<Meeting>, SchedulerError> {
        let start = Instant::now();

        let mut count = QueryBuilder::new("SELECT COUNT(*)");
        count.push(MEETING_FROM);
        push_where(&mut count, filter);
        let total: i64 = observed(
            "meetings.count",
            start,
            count.build_query_scalar().fetch_one(&self.pool).await,
        )?;

        let (limit, offset) = limit_offset(page);
        let mut qb = meeting_select(filter);
        qb.push(" ORDER BY m.id LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows: Vec<MeetingRow> = observed(
            "meetings.find_filtered",
            start,
            qb.build_query_as().fetch_all(&self.pool).await,
        )?;

        Ok(Page::new(
            rows.into_iter().map(Meeting::from).collect(),
            page,
            u64::try_from(total).unwrap_or(0),
        ))
    }

    #[instrument(skip_all, name = "scheduler.repo.meetings.delete", fields(meeting_id = id))]
    async fn delete_where(
        &self,
        id: i64,
        filter: &Filter<MeetingCriterion>,
    ) -> Result<bool, SchedulerError> {
        let start = Instant::now();
        let scoped = Filter::all()
            .with(MeetingCriterion::Id(id))
            .and_filter(filter.clone());

        let mut qb = QueryBuilder::new("DELETE FROM meetings WHERE id IN (SELECT m.id");
        qb.push(MEETING_FROM);
        push_where(&mut qb, &scoped);
        qb.push(")");

        let result = observed(
            "meetings.delete",
            start,
            qb.build().execute(&self.pool).await,
        )?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip_all, name = "scheduler.repo.meetings.exists")]
    async fn exists(&self, filter: &Filter<MeetingCriterion>) -> Result<bool, SchedulerError> {
        let start = Instant::now();
        let exists: bool = observed(
            "meetings.exists",
            start,
            meeting_exists_query(filter)
                .build_query_scalar()
                .fetch_one(&self.pool)
                .await,
        )?;
        Ok(exists)
    }

    async fn ping(&self) -> Result<(), SchedulerError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl MeetingRepository for PgMeetingRepository {
    #[instrument(skip_all, name = "scheduler.repo.meetings.commit_finalize", fields(meeting_id = id))]
    async fn commit_finalize(
        &self,
        id: i64,
        conflicts: ConflictFilterFn,
    ) -> Result<FinalizeCommit, SchedulerError> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await?;

        let participants: Option<(i64, i64)> = sqlx::query_as(
            "SELECT manager_id, employee_id FROM meetings WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((manager_id, employee_id)) = participants else {
            tx.rollback().await?;
            return Ok(FinalizeCommit::NotFound);
        };

        let mut lock_keys = vec![manager_id, employee_id];
        lock_keys.sort_unstable();
        lock_keys.dedup();
        for key in lock_keys {
            sqlx::query("SELECT pg_advisory_xact_lock($1)")
                .bind(key)
                .execute(&mut *tx)
                .await?;
        }

        let row: Option<MeetingRow> = meeting_select(&Filter::all().with(MeetingCriterion::Id(id)))
            .build_query_as()
            .fetch_optional(&mut *tx)
            .await?;
        let Some(meeting) = row.map(Meeting::from) else {
            tx.rollback().await?;
            return Ok(FinalizeCommit::NotFound);
        };

        if meeting.is_finalized {
            tx.rollback().await?;
            return Ok(FinalizeCommit::AlreadyFinalized);
        }

        let overlap: bool = meeting_exists_query(&conflicts(&meeting))
            .build_query_scalar()
            .fetch_one(&mut *tx)
            .await?;
        if overlap {
            tx.rollback().await?;
            record_db_query("meetings.commit_finalize", "success", start.elapsed());
            return Ok(FinalizeCommit::OverlapExists);
        }

        let updated = sqlx::query(
            "UPDATE meetings SET is_finalized = TRUE, updated_at = NOW() \
             WHERE id = $1 AND is_finalized = FALSE",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(FinalizeCommit::AlreadyFinalized);
        }

        tx.commit().await?;
        record_db_query("meetings.commit_finalize", "success", start.elapsed());

        Ok(FinalizeCommit::Committed(Meeting {
            is_finalized: true,
            ..meeting
        }))
    }

    #[instrument(skip_all, name = "scheduler.repo.meetings.update_draft", fields(meeting_id = meeting.id))]
    async fn update_draft(&self, meeting: Meeting) -> Result<Option<Meeting>, SchedulerError> {
        let start = Instant::now();
        let result = observed(
            "meetings.update_draft",
            start,
            sqlx::query(
                r#"
                UPDATE meetings
                SET title = $2, description = $3, start_time = $4, end_time = $5,
                    updated_at = NOW()
                WHERE id = $1 AND is_finalized = FALSE
                "#,
            )
            .bind(meeting.id)
            .bind(&meeting.title)
            .bind(&meeting.description)
            .bind(meeting.start_time)
            .bind(meeting.end_time)
            .execute(&self.pool)
            .await,
        )?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(Meeting {
            is_finalized: false,
            ..meeting
        }))
    }
}

// ============================================================================
// Users
// ============================================================================

const USER_COLUMNS: &str =
    "SELECT u.id, u.name, u.position, u.date_of_birth, u.email, u.username FROM users u";

impl PushSql for UserCriterion {
    fn push_sql(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            UserCriterion::Id(id) => {
                qb.push("(u.id = ").push_bind(*id).push(")");
            }
            UserCriterion::NameContains(needle) => {
                qb.push("(LOWER(u.name) LIKE ")
                    .push_bind(like_pattern(needle))
                    .push(" ESCAPE '\\')");
            }
            UserCriterion::Position(position) => {
                qb.push("(u.position = ")
                    .push_bind(position.as_str())
                    .push(")");
            }
            UserCriterion::DateOfBirth(date) => {
                qb.push("(u.date_of_birth = ").push_bind(*date).push(")");
            }
            UserCriterion::Email(email) => {
                qb.push("(u.email = ").push_bind(email.clone()).push(")");
            }
            UserCriterion::ExcludeId(id) => {
                qb.push("(u.id <> ").push_bind(*id).push(")");
            }
            UserCriterion::AccessibleBy(username) => {
                qb.push("(u.username = ")
                    .push_bind(username.clone())
                    .push(")");
            }
        }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    name: String,
    position: String,
    date_of_birth: NaiveDate,
    email: String,
    username: Option<String>,
}

impl TryFrom<UserRow> for User {
    type Error = SchedulerError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let position: Position = row
            .position
            .parse()
            .map_err(SchedulerError::Database)?;
        Ok(User {
            id: row.id,
            name: row.name,
            position,
            date_of_birth: row.date_of_birth,
            email: row.email,
            username: row.username,
        })
    }
}

fn user_select(filter: &Filter<UserCriterion>) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(USER_COLUMNS);
    push_where(&mut qb, filter);
    qb
}

/// Maps unique-constraint violations on `users` to domain errors.
fn map_user_write_error(err: sqlx::Error) -> SchedulerError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return match db_err.constraint() {
                Some("users_username_key") => account_already_linked(),
                _ => SchedulerError::Conflict(ConflictKind::DuplicateEmail),
            };
        }
    }
    SchedulerError::from(err)
}

/// User repository backed by the `users` table.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository<User> for PgUserRepository {
    #[instrument(skip_all, name = "scheduler.repo.users.save")]
    async fn save(&self, mut user: User) -> Result<User, SchedulerError> {
        let start = Instant::now();
        if user.id <= 0 {
            let id: i64 = observed(
                "users.insert",
                start,
                sqlx::query_scalar(
                    r#"
                    INSERT INTO users (name, position, date_of_birth, email, username)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING id
                    "#,
                )
                .bind(&user.name)
                .bind(user.position.as_str())
                .bind(user.date_of_birth)
                .bind(&user.email)
                .bind(&user.username)
                .fetch_one(&self.pool)
                .await,
            )
            .map_err(map_user_write_error)?;
            user.id = id;
        } else {
            let updated: Option<i64> = observed(
                "users.update",
                start,
                sqlx::query_scalar(
                    r#"
                    UPDATE users
                    SET name = $2, position = $3, date_of_birth = $4, email = $5,
                        username = $6, updated_at = NOW()
                    WHERE id = $1
                    RETURNING id
                    "#,
                )
                .bind(user.id)
                .bind(&user.name)
                .bind(user.position.as_str())
                .bind(user.date_of_birth)
                .bind(&user.email)
                .bind(&user.username)
                .fetch_optional(&self.pool)
                .await,
            )
            .map_err(map_user_write_error)?;
            if updated.is_none() {
                return Err(SchedulerError::NotFound(User::NOT_FOUND));
            }
        }

        tracing::debug!(target: "scheduler.repo.users", user_id = user.id, "User saved");
        Ok(user)
    }

    #[instrument(skip_all, name = "scheduler.repo.users.find_by_id", fields(user_id = id))]
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, SchedulerError> {
        let start = Instant::now();
        let filter = Filter::all().with(UserCriterion::Id(id));
        let row: Option<UserRow> = observed(
            "users.find_by_id",
            start,
            user_select(&filter)
                .build_query_as()
                .fetch_optional(&self.pool)
                .await,
        )?;
        row.map(User::try_from).transpose()
    }

    #[instrument(skip_all, name = "scheduler.repo.users.find_all")]
    async fn find_all(&self) -> Result<Vec<User>, SchedulerError> {
        let start = Instant::now();
        let mut qb = user_select(&Filter::all());
        qb.push(" ORDER BY u.id");
        let rows: Vec<UserRow> = observed(
            "users.find_all",
            start,
            qb.build_query_as().fetch_all(&self.pool).await,
        )?;
        rows.into_iter().map(User::try_from).collect()
    }

    #[instrument(skip_all, name = "scheduler.repo.users.find_filtered")]
    async fn find_filtered(
        &self,
        filter: &Filter<UserCriterion>,
        page: PageRequest,
    ) -> Result<Page<User>, SchedulerError> {
        let start = Instant::now();

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM users u");
        push_where(&mut count, filter);
        let total: i64 = observed(
            "users.count",
            start,
            count.build_query_scalar().fetch_one(&self.pool).await,
        )?;

        let (limit, offset) = limit_offset(page);
        let mut qb = user_select(filter);
        qb.push(" ORDER BY u.id LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows: Vec<UserRow> = observed(
            "users.find_filtered",
            start,
            qb.build_query_as().fetch_all(&self.pool).await,
        )?;

        let content = rows
            .into_iter()
            .map(User::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(content, page, u64::try_from(total).unwrap_or(0)))
    }

    #[instrument(skip_all, name = "scheduler.repo.users.delete", fields(user_id = id))]
    async fn delete_where(
        &self,
        id: i64,
        filter: &Filter<UserCriterion>,
    ) -> Result<bool, SchedulerError> {
        let start = Instant::now();
        let scoped = Filter::all()
            .with(UserCriterion::Id(id))
            .and_filter(filter.clone());

        let mut qb = QueryBuilder::new("DELETE FROM users u");
        push_where(&mut qb, &scoped);

        let result = observed(
            "users.delete",
            start,
            qb.build().execute(&self.pool).await,
        )?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip_all, name = "scheduler.repo.users.exists")]
    async fn exists(&self, filter: &Filter<UserCriterion>) -> Result<bool, SchedulerError> {
        let start = Instant::now();
        let mut qb = QueryBuilder::new("SELECT EXISTS(SELECT 1 FROM users u");
        push_where(&mut qb, filter);
        qb.push(")");
        let exists: bool = observed(
            "users.exists",
            start,
            qb.build_query_scalar().fetch_one(&self.pool).await,
        )?;
        Ok(exists)
    }

    async fn ping(&self) -> Result<(), SchedulerError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
