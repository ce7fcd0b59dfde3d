use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::common::{created, deleted, ok, validate_input, Created};
use super::AppState;
use crate::errors::ServiceError;
use crate::models::QualityMetric;
use crate::services::quality::{NewQualityMetric, QualityMetricUpdate};
use crate::{ApiResponse, ApiResult};

#[derive(Debug, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct QualityFilter {
    /// Restrict to one production line
    pub line_id: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DefectRate {
    pub line_id: Option<i64>,
    pub average_defect_rate: f64,
}

pub fn quality_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_metrics).post(create_metric))
        .route("/average", get(average_defect_rate))
        .route(
            "/:id",
            get(get_metric).put(update_metric).delete(delete_metric),
        )
}

#[utoipa::path(
    get,
    path = "/api/v1/quality-metrics",
    summary = "List quality metrics, newest first",
    params(QualityFilter),
    responses((status = 200, description = "Quality metrics", body = ApiResponse<Vec<QualityMetric>>)),
    tag = "quality"
)]
pub async fn list_metrics(
    State(state): State<AppState>,
    Query(filter): Query<QualityFilter>,
) -> ApiResult<Vec<QualityMetric>> {
    Ok(ok(state.services.quality.list(filter.line_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/quality-metrics/average",
    summary = "Average defect rate",
    params(QualityFilter),
    responses((status = 200, description = "Mean defect rate in percent", body = ApiResponse<DefectRate>)),
    tag = "quality"
)]
pub async fn average_defect_rate(
    State(state): State<AppState>,
    Query(filter): Query<QualityFilter>,
) -> ApiResult<DefectRate> {
    let average_defect_rate = state
        .services
        .quality
        .average_defect_rate(filter.line_id)
        .await?;
    Ok(ok(DefectRate {
        line_id: filter.line_id,
        average_defect_rate,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/quality-metrics/{id}",
    summary = "Get a quality metric",
    params(("id" = i64, Path, description = "Metric id")),
    responses(
        (status = 200, description = "Quality metric", body = ApiResponse<QualityMetric>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "quality"
)]
pub async fn get_metric(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<QualityMetric> {
    Ok(ok(state.services.quality.get(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/quality-metrics",
    summary = "Record an inspection",
    description = "A defect rate above the configured threshold also raises a High alert.",
    request_body = NewQualityMetric,
    responses(
        (status = 201, description = "Recorded", body = ApiResponse<QualityMetric>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown line", body = crate::errors::ErrorResponse)
    ),
    tag = "quality"
)]
pub async fn create_metric(
    State(state): State<AppState>,
    Json(payload): Json<NewQualityMetric>,
) -> Result<Created<QualityMetric>, ServiceError> {
    validate_input(&payload)?;
    Ok(created(state.services.quality.create(payload).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/quality-metrics/{id}",
    summary = "Correct a quality metric",
    params(("id" = i64, Path, description = "Metric id")),
    request_body = QualityMetricUpdate,
    responses(
        (status = 200, description = "Updated", body = ApiResponse<QualityMetric>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "quality"
)]
pub async fn update_metric(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<QualityMetricUpdate>,
) -> ApiResult<QualityMetric> {
    validate_input(&payload)?;
    Ok(ok(state.services.quality.update(id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/quality-metrics/{id}",
    summary = "Delete a quality metric",
    params(("id" = i64, Path, description = "Metric id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "quality"
)]
pub async fn delete_metric(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.services.quality.delete(id).await?;
    Ok(deleted())
}
