//! User handlers.
//!
//! - `POST /api/v1/users` - create
//! - `GET /api/v1/users` - search, paginated
//! - `GET /api/v1/users/:id` - get
//! - `PUT /api/v1/users/:id` - update (owner only)
//! - `DELETE /api/v1/users/:id` - delete

use super::{parse_body, parse_query};
use crate::errors::SchedulerError;
use crate::identity::IdentityContext;
use crate::models::{CreateUserRequest, UpdateUserRequest, UserResponse, UserSearchParams};
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
    name = "scheduler.http.user.create",
    fields(method = "POST", endpoint = "/api/v1/users")
)]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<IdentityContext>,
    body: Bytes,
) -> Result<(StatusCode, Json<UserResponse>), SchedulerError> {
    let request: CreateUserRequest = parse_body(&body)?;
    let user = state.users.create(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(
    skip_all,
    name = "scheduler.http.user.search",
    fields(method = "GET", endpoint = "/api/v1/users")
)]
pub async fn search_users(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<IdentityContext>,
    query: Result<Query<UserSearchParams>, QueryRejection>,
) -> Result<Json<Page<UserResponse>>, SchedulerError> {
    let params = parse_query(query)?;
    let page = PageRequest::from_params(params.page, params.size, state.config.default_page_size);
    let found = state.users.search(&ctx, &params, page).await?;
    Ok(Json(found.map(UserResponse::from)))
}

#[instrument(
    skip_all,
    name = "scheduler.http.user.get",
    fields(method = "GET", endpoint = "/api/v1/users/{id}")
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<IdentityContext>,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, SchedulerError> {
    let user = state.users.get_by_id(&ctx, id).await?;
    Ok(Json(user.into()))
}

#[instrument(
    skip_all,
    name = "scheduler.http.user.update",
    fields(method = "PUT", endpoint = "/api/v1/users/{id}")
)]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<IdentityContext>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<Json<UserResponse>, SchedulerError> {
    let patch: UpdateUserRequest = parse_body(&body)?;
    let user = state.users.update(&ctx, id, patch).await?;
    Ok(Json(user.into()))
}

#[instrument(
    skip_all,
    name = "scheduler.http.user.delete",
    fields(method = "DELETE", endpoint = "/api/v1/users/{id}")
)]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<IdentityContext>,
    Path(id): Path<i64>,
) -> Result<StatusCode, SchedulerError> {
    state.users.delete(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
