use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use utoipa::ToSchema;

use super::common::{created, deleted, ok, validate_input, Created};
use super::AppState;
use crate::errors::ServiceError;
use crate::models::Machine;
use crate::services::machines::{MachineUpdate, NewMachine};
use crate::{ApiResponse, ApiResult};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct MaintenanceRequest {
    /// Next scheduled maintenance; must not be in the past
    pub next_maintenance: Option<NaiveDate>,
}

/// Create the machines router
pub fn machines_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_machines).post(create_machine))
        .route("/maintenance-due", get(maintenance_due))
        .route(
            "/:id",
            get(get_machine).put(update_machine).delete(delete_machine),
        )
        .route("/:id/maintenance", post(record_maintenance))
}

#[utoipa::path(
    get,
    path = "/api/v1/machines",
    summary = "List machines",
    responses((status = 200, description = "Machines", body = ApiResponse<Vec<Machine>>)),
    tag = "machines"
)]
pub async fn list_machines(State(state): State<AppState>) -> ApiResult<Vec<Machine>> {
    Ok(ok(state.services.machines.list().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/machines/maintenance-due",
    summary = "Machines due for maintenance",
    responses((status = 200, description = "Machines due today or earlier", body = ApiResponse<Vec<Machine>>)),
    tag = "machines"
)]
pub async fn maintenance_due(State(state): State<AppState>) -> ApiResult<Vec<Machine>> {
    let today = Utc::now().date_naive();
    Ok(ok(state.services.machines.maintenance_due(today).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/machines/{id}",
    summary = "Get a machine",
    params(("id" = i64, Path, description = "Machine id")),
    responses(
        (status = 200, description = "Machine", body = ApiResponse<Machine>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "machines"
)]
pub async fn get_machine(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Machine> {
    Ok(ok(state.services.machines.get(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/machines",
    summary = "Create a machine",
    request_body = NewMachine,
    responses(
        (status = 201, description = "Created", body = ApiResponse<Machine>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse)
    ),
    tag = "machines"
)]
pub async fn create_machine(
    State(state): State<AppState>,
    Json(payload): Json<NewMachine>,
) -> Result<Created<Machine>, ServiceError> {
    validate_input(&payload)?;
    Ok(created(state.services.machines.create(payload).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/machines/{id}",
    summary = "Update a machine",
    params(("id" = i64, Path, description = "Machine id")),
    request_body = MachineUpdate,
    responses(
        (status = 200, description = "Updated", body = ApiResponse<Machine>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "machines"
)]
pub async fn update_machine(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<MachineUpdate>,
) -> ApiResult<Machine> {
    validate_input(&payload)?;
    Ok(ok(state.services.machines.update(id, payload).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/machines/{id}/maintenance",
    summary = "Record completed maintenance",
    params(("id" = i64, Path, description = "Machine id")),
    request_body = MaintenanceRequest,
    responses(
        (status = 200, description = "Maintenance recorded", body = ApiResponse<Machine>),
        (status = 400, description = "Next date in the past", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "machines"
)]
pub async fn record_maintenance(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<MaintenanceRequest>,
) -> ApiResult<Machine> {
    let machine = state
        .services
        .machines
        .record_maintenance(id, payload.next_maintenance)
        .await?;
    Ok(ok(machine))
}

#[utoipa::path(
    delete,
    path = "/api/v1/machines/{id}",
    summary = "Delete a machine",
    params(("id" = i64, Path, description = "Machine id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "machines"
)]
pub async fn delete_machine(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.services.machines.delete(id).await?;
    Ok(deleted())
}
