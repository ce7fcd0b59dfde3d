use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

use super::common::{created, deleted, ok, validate_input, Created};
use super::AppState;
use crate::errors::ServiceError;
use crate::models::{StageName, WorkOrder, WorkOrderStatus};
use crate::services::work_orders::{
    NewWorkOrder, StageUpdate, WorkOrderStatusUpdate, WorkOrderSummary, WorkOrderUpdate,
};
use crate::{ApiResponse, ApiResult};

#[derive(Debug, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WorkOrderFilters {
    /// Status label, e.g. "In Progress" or "overdue"
    pub status: Option<String>,
}

/// Create the work orders router
pub fn work_orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_work_orders).post(create_work_order))
        .route("/summary", get(work_order_summary))
        .route(
            "/:id",
            get(get_work_order)
                .put(update_work_order)
                .delete(delete_work_order),
        )
        .route("/:id/status", put(set_work_order_status))
        .route("/:id/stages/:stage", put(update_stage))
        .route("/:id/materials/refresh", post(refresh_materials))
}

#[utoipa::path(
    get,
    path = "/api/v1/work-orders",
    summary = "List work orders",
    params(WorkOrderFilters),
    responses(
        (status = 200, description = "Work orders", body = ApiResponse<Vec<WorkOrder>>),
        (status = 400, description = "Unknown status", body = crate::errors::ErrorResponse)
    ),
    tag = "work-orders"
)]
pub async fn list_work_orders(
    State(state): State<AppState>,
    Query(filters): Query<WorkOrderFilters>,
) -> ApiResult<Vec<WorkOrder>> {
    let work_orders = match filters.status.as_deref() {
        Some(raw) => {
            let status: WorkOrderStatus = raw.parse()?;
            state.services.work_orders.by_status(status).await?
        }
        None => state.services.work_orders.list().await?,
    };
    Ok(ok(work_orders))
}

#[utoipa::path(
    get,
    path = "/api/v1/work-orders/summary",
    summary = "Work order counts and progress",
    responses((status = 200, description = "Summary", body = ApiResponse<WorkOrderSummary>)),
    tag = "work-orders"
)]
pub async fn work_order_summary(State(state): State<AppState>) -> ApiResult<WorkOrderSummary> {
    Ok(ok(state.services.work_orders.summary().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/work-orders/{id}",
    summary = "Get a work order",
    params(("id" = i64, Path, description = "Work order id")),
    responses(
        (status = 200, description = "Work order", body = ApiResponse<WorkOrder>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "work-orders"
)]
pub async fn get_work_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<WorkOrder> {
    Ok(ok(state.services.work_orders.get(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/work-orders",
    summary = "Create a work order",
    description = "Builds the Setup, Production, Quality Check and Complete stages and reconciles materials against inventory.",
    request_body = NewWorkOrder,
    responses(
        (status = 201, description = "Created", body = ApiResponse<WorkOrder>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse)
    ),
    tag = "work-orders"
)]
pub async fn create_work_order(
    State(state): State<AppState>,
    Json(payload): Json<NewWorkOrder>,
) -> Result<Created<WorkOrder>, ServiceError> {
    validate_input(&payload)?;
    Ok(created(state.services.work_orders.create(payload).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/work-orders/{id}",
    summary = "Update a work order",
    params(("id" = i64, Path, description = "Work order id")),
    request_body = WorkOrderUpdate,
    responses(
        (status = 200, description = "Updated", body = ApiResponse<WorkOrder>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "work-orders"
)]
pub async fn update_work_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<WorkOrderUpdate>,
) -> ApiResult<WorkOrder> {
    validate_input(&payload)?;
    Ok(ok(state.services.work_orders.update(id, payload).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/work-orders/{id}/status",
    summary = "Hold, resume or cancel a work order",
    params(("id" = i64, Path, description = "Work order id")),
    request_body = WorkOrderStatusUpdate,
    responses(
        (status = 200, description = "Status changed", body = ApiResponse<WorkOrder>),
        (status = 400, description = "Transition not allowed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "work-orders"
)]
pub async fn set_work_order_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<WorkOrderStatusUpdate>,
) -> ApiResult<WorkOrder> {
    let work_order = state
        .services
        .work_orders
        .set_status(id, payload.status)
        .await?;
    Ok(ok(work_order))
}

#[utoipa::path(
    put,
    path = "/api/v1/work-orders/{id}/stages/{stage}",
    summary = "Advance a production stage",
    description = "Progress is clamped to 0-100; reaching 100 completes the stage and starts the next one.",
    params(
        ("id" = i64, Path, description = "Work order id"),
        ("stage" = String, Path, description = "Stage name, e.g. setup or quality-check")
    ),
    request_body = StageUpdate,
    responses(
        (status = 200, description = "Stage updated", body = ApiResponse<WorkOrder>),
        (status = 400, description = "Out of order or terminal", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "work-orders"
)]
pub async fn update_stage(
    State(state): State<AppState>,
    Path((id, stage)): Path<(i64, String)>,
    Json(payload): Json<StageUpdate>,
) -> ApiResult<WorkOrder> {
    let stage: StageName = stage.parse()?;
    let work_order = state
        .services
        .work_orders
        .update_stage(id, stage, payload)
        .await?;
    Ok(ok(work_order))
}

#[utoipa::path(
    post,
    path = "/api/v1/work-orders/{id}/materials/refresh",
    summary = "Re-check materials against inventory",
    params(("id" = i64, Path, description = "Work order id")),
    responses(
        (status = 200, description = "Materials refreshed", body = ApiResponse<WorkOrder>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "work-orders"
)]
pub async fn refresh_materials(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<WorkOrder> {
    Ok(ok(state.services.work_orders.refresh_materials(id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/work-orders/{id}",
    summary = "Delete a work order",
    params(("id" = i64, Path, description = "Work order id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "work-orders"
)]
pub async fn delete_work_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    state.services.work_orders.delete(id).await?;
    Ok(deleted())
}
