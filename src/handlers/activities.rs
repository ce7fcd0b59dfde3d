use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};

use super::common::{created, deleted, ok, validate_input, Created, LimitParams};
use super::AppState;
use crate::errors::ServiceError;
use crate::models::Activity;
use crate::services::activities::NewActivity;
use crate::{ApiResponse, ApiResult};

pub fn activities_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_activities).post(create_activity))
        .route("/:id", get(get_activity).delete(delete_activity))
}

#[utoipa::path(
    get,
    path = "/api/v1/activities",
    summary = "Activity feed, newest first",
    params(LimitParams),
    responses((status = 200, description = "Activities", body = ApiResponse<Vec<Activity>>)),
    tag = "activities"
)]
pub async fn list_activities(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Vec<Activity>> {
    let activities = match params.limit {
        Some(limit) => state.services.activities.recent(limit).await?,
        None => state.services.activities.list().await?,
    };
    Ok(ok(activities))
}

#[utoipa::path(
    get,
    path = "/api/v1/activities/{id}",
    summary = "Get an activity",
    params(("id" = i64, Path, description = "Activity id")),
    responses(
        (status = 200, description = "Activity", body = ApiResponse<Activity>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "activities"
)]
pub async fn get_activity(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Activity> {
    Ok(ok(state.services.activities.get(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/activities",
    summary = "Log an activity",
    request_body = NewActivity,
    responses(
        (status = 201, description = "Logged", body = ApiResponse<Activity>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse)
    ),
    tag = "activities"
)]
pub async fn create_activity(
    State(state): State<AppState>,
    Json(payload): Json<NewActivity>,
) -> Result<Created<Activity>, ServiceError> {
    validate_input(&payload)?;
    Ok(created(state.services.activities.create(payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/activities/{id}",
    summary = "Delete an activity",
    params(("id" = i64, Path, description = "Activity id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "activities"
)]
pub async fn delete_activity(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.services.activities.delete(id).await?;
    Ok(deleted())
}
