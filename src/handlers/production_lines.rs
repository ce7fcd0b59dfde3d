use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use super::common::{created, deleted, ok, validate_input, Created};
use super::AppState;
use crate::errors::ServiceError;
use crate::models::{LineStatus, ProductionLine};
use crate::services::production_lines::{NewProductionLine, ProductionLineUpdate};
use crate::{ApiResponse, ApiResult};

#[derive(Debug, Deserialize, ToSchema)]
pub struct RecordOutputRequest {
    pub actual_output: u32,
    /// Optional status change applied after the output is recorded
    #[schema(value_type = Option<String>, example = "Running")]
    pub status: Option<LineStatus>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AssignJobRequest {
    /// Work order job id; null clears the line
    #[validate(length(min = 1, max = 50))]
    pub job_id: Option<String>,
}

/// Create the production lines router
pub fn production_lines_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_lines).post(create_line))
        .route("/:id", get(get_line).put(update_line).delete(delete_line))
        .route("/:id/output", post(record_output))
        .route("/:id/job", put(assign_job))
}

#[utoipa::path(
    get,
    path = "/api/v1/production-lines",
    summary = "List production lines",
    responses((status = 200, description = "Production lines", body = ApiResponse<Vec<ProductionLine>>)),
    tag = "production"
)]
pub async fn list_lines(State(state): State<AppState>) -> ApiResult<Vec<ProductionLine>> {
    Ok(ok(state.services.production_lines.list().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/production-lines/{id}",
    summary = "Get a production line",
    params(("id" = i64, Path, description = "Production line id")),
    responses(
        (status = 200, description = "Production line", body = ApiResponse<ProductionLine>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "production"
)]
pub async fn get_line(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<ProductionLine> {
    Ok(ok(state.services.production_lines.get(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/production-lines",
    summary = "Create a production line",
    request_body = NewProductionLine,
    responses(
        (status = 201, description = "Created", body = ApiResponse<ProductionLine>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse)
    ),
    tag = "production"
)]
pub async fn create_line(
    State(state): State<AppState>,
    Json(payload): Json<NewProductionLine>,
) -> Result<Created<ProductionLine>, ServiceError> {
    validate_input(&payload)?;
    let line = state.services.production_lines.create(payload).await?;
    Ok(created(line))
}

#[utoipa::path(
    put,
    path = "/api/v1/production-lines/{id}",
    summary = "Update a production line",
    params(("id" = i64, Path, description = "Production line id")),
    request_body = ProductionLineUpdate,
    responses(
        (status = 200, description = "Updated", body = ApiResponse<ProductionLine>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "production"
)]
pub async fn update_line(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<ProductionLineUpdate>,
) -> ApiResult<ProductionLine> {
    validate_input(&payload)?;
    Ok(ok(state.services.production_lines.update(id, payload).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/production-lines/{id}/output",
    summary = "Record line output",
    description = "Stores the actual output and recomputes efficiency against the target.",
    params(("id" = i64, Path, description = "Production line id")),
    request_body = RecordOutputRequest,
    responses(
        (status = 200, description = "Output recorded", body = ApiResponse<ProductionLine>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "production"
)]
pub async fn record_output(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<RecordOutputRequest>,
) -> ApiResult<ProductionLine> {
    let lines = &state.services.production_lines;
    let mut line = lines.record_output(id, payload.actual_output).await?;
    if let Some(status) = payload.status {
        line = lines.set_status(id, status).await?;
    }
    Ok(ok(line))
}

#[utoipa::path(
    put,
    path = "/api/v1/production-lines/{id}/job",
    summary = "Assign or clear the current job",
    description = "Assigning a job to an idle line starts it running.",
    params(("id" = i64, Path, description = "Production line id")),
    request_body = AssignJobRequest,
    responses(
        (status = 200, description = "Job assigned", body = ApiResponse<ProductionLine>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "production"
)]
pub async fn assign_job(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<AssignJobRequest>,
) -> ApiResult<ProductionLine> {
    validate_input(&payload)?;
    Ok(ok(state.services.production_lines.assign_job(id, payload.job_id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/production-lines/{id}",
    summary = "Delete a production line",
    params(("id" = i64, Path, description = "Production line id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "production"
)]
pub async fn delete_line(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    state.services.production_lines.delete(id).await?;
    Ok(deleted())
}
