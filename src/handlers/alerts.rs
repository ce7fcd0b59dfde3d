use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use utoipa::ToSchema;

use super::common::{created, deleted, ok, validate_input, ActorRequest, Created};
use super::AppState;
use crate::errors::ServiceError;
use crate::models::Alert;
use crate::services::alerts::{AlertUpdate, NewAlert};
use crate::{ApiResponse, ApiResult};

#[derive(Debug, Serialize, ToSchema)]
pub struct AlertCount {
    pub unacknowledged: usize,
}

pub fn alerts_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_alerts).post(create_alert))
        .route("/unacknowledged-count", get(unacknowledged_count))
        .route("/:id", get(get_alert).put(update_alert).delete(delete_alert))
        .route("/:id/acknowledge", post(acknowledge_alert))
}

#[utoipa::path(
    get,
    path = "/api/v1/alerts",
    summary = "List alerts",
    description = "Unacknowledged alerts come first, then by priority, newest first.",
    responses((status = 200, description = "Alerts", body = ApiResponse<Vec<Alert>>)),
    tag = "alerts"
)]
pub async fn list_alerts(State(state): State<AppState>) -> ApiResult<Vec<Alert>> {
    Ok(ok(state.services.alerts.list().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/alerts/unacknowledged-count",
    summary = "Count open alerts",
    responses((status = 200, description = "Open alert count", body = ApiResponse<AlertCount>)),
    tag = "alerts"
)]
pub async fn unacknowledged_count(State(state): State<AppState>) -> ApiResult<AlertCount> {
    let unacknowledged = state.services.alerts.unacknowledged_count().await?;
    Ok(ok(AlertCount { unacknowledged }))
}

#[utoipa::path(
    get,
    path = "/api/v1/alerts/{id}",
    summary = "Get an alert",
    params(("id" = i64, Path, description = "Alert id")),
    responses(
        (status = 200, description = "Alert", body = ApiResponse<Alert>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "alerts"
)]
pub async fn get_alert(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Alert> {
    Ok(ok(state.services.alerts.get(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/alerts",
    summary = "Raise an alert",
    request_body = NewAlert,
    responses(
        (status = 201, description = "Raised", body = ApiResponse<Alert>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse)
    ),
    tag = "alerts"
)]
pub async fn create_alert(
    State(state): State<AppState>,
    Json(payload): Json<NewAlert>,
) -> Result<Created<Alert>, ServiceError> {
    validate_input(&payload)?;
    Ok(created(state.services.alerts.create(payload).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/alerts/{id}",
    summary = "Update an alert",
    params(("id" = i64, Path, description = "Alert id")),
    request_body = AlertUpdate,
    responses(
        (status = 200, description = "Updated", body = ApiResponse<Alert>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "alerts"
)]
pub async fn update_alert(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<AlertUpdate>,
) -> ApiResult<Alert> {
    validate_input(&payload)?;
    Ok(ok(state.services.alerts.update(id, payload).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/alerts/{id}/acknowledge",
    summary = "Acknowledge an alert",
    description = "Idempotent: acknowledging twice keeps the first acknowledger.",
    params(("id" = i64, Path, description = "Alert id")),
    request_body = ActorRequest,
    responses(
        (status = 200, description = "Acknowledged", body = ApiResponse<Alert>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "alerts"
)]
pub async fn acknowledge_alert(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Option<Json<ActorRequest>>,
) -> ApiResult<Alert> {
    let actor = payload.map(|Json(actor)| actor).unwrap_or_default();
    validate_input(&actor)?;
    let alert = state
        .services
        .alerts
        .acknowledge(id, actor.user_or_default())
        .await?;
    Ok(ok(alert))
}

#[utoipa::path(
    delete,
    path = "/api/v1/alerts/{id}",
    summary = "Delete an alert",
    params(("id" = i64, Path, description = "Alert id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "alerts"
)]
pub async fn delete_alert(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.services.alerts.delete(id).await?;
    Ok(deleted())
}
