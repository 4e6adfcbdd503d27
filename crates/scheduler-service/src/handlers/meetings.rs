//! Meeting handlers.
//!
//! - `POST /api/v1/meetings` - create a draft
//! - `GET /api/v1/meetings` - search, paginated
//! - `GET /api/v1/meetings/:id` - get
//! - `PUT /api/v1/meetings/:id` - update a draft
//! - `DELETE /api/v1/meetings/:id` - delete a draft
//! - `POST /api/v1/meetings/:id/finalize` - finalize
//!
//! Every handler reads the caller from the `IdentityContext` extension;
//! authorization happens in the service layer.

use super::{parse_body, parse_query};
use crate::errors::SchedulerError;
use crate::identity::IdentityContext;
use crate::models::{
    CreateMeetingRequest, MeetingResponse, MeetingSearchParams, UpdateMeetingRequest,
};
use crate::routes::AppState;
use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use common::types::{Page, PageRequest};
use std::sync::Arc;
use tracing::instrument;

#[instrument(
    skip_all,
    name = "scheduler.http.meeting.create",
    fields(method = "POST", endpoint = "/api/v1/meetings")
)]
pub async fn create_meeting(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<IdentityContext>,
    body: Bytes,
) -> Result<(StatusCode, Json<MeetingResponse>), SchedulerError> {
    let request: CreateMeetingRequest = parse_body(&body)?;
    let meeting = state.meetings.create(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(meeting.into())))
}

#[instrument(
    skip_all,
    name = "scheduler.http.meeting.search",
    fields(method = "GET", endpoint = "/api/v1/meetings")
)]
pub async fn search_meetings(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<IdentityContext>,
    query: Result<Query<MeetingSearchParams>, QueryRejection>,
) -> Result<Json<Page<MeetingResponse>>, SchedulerError> {
    let params = parse_query(query)?;
    let page = PageRequest::from_params(params.page, params.size, state.config.default_page_size);
    let found = state.meetings.search(&ctx, &params, page).await?;
    Ok(Json(found.map(MeetingResponse::from)))
}

#[instrument(
    skip_all,
    name = "scheduler.http.meeting.get",
    fields(method = "GET", endpoint = "/api/v1/meetings/{id}")
)]
pub async fn get_meeting(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<IdentityContext>,
    Path(id): Path<i64>,
) -> Result<Json<MeetingResponse>, SchedulerError> {
    let meeting = state.meetings.get_by_id(&ctx, id).await?;
    Ok(Json(meeting.into()))
}

#[instrument(
    skip_all,
    name = "scheduler.http.meeting.update",
    fields(method = "PUT", endpoint = "/api/v1/meetings/{id}")
)]
pub async fn update_meeting(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<IdentityContext>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<Json<MeetingResponse>, SchedulerError> {
    let patch: UpdateMeetingRequest = parse_body(&body)?;
    let meeting = state.meetings.update(&ctx, id, patch).await?;
    Ok(Json(meeting.into()))
}

#[instrument(
    skip_all,
    name = "scheduler.http.meeting.delete",
    fields(method = "DELETE", endpoint = "/api/v1/meetings/{id}")
)]
pub async fn delete_meeting(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<IdentityContext>,
    Path(id): Path<i64>,
) -> Result<StatusCode, SchedulerError> {
    state.meetings.delete(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Finalizing is a distinct transition, never part of update.
#[instrument(
    skip_all,
    name = "scheduler.http.meeting.finalize",
    fields(method = "POST", endpoint = "/api/v1/meetings/{id}/finalize")
)]
pub async fn finalize_meeting(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<IdentityContext>,
    Path(id): Path<i64>,
) -> Result<Json<MeetingResponse>, SchedulerError> {
    let meeting = state.meetings.finalize(&ctx, id).await?;
    Ok(Json(meeting.into()))
}
