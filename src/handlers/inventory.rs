use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

use super::common::{created, deleted, ok, validate_input, Created};
use super::AppState;
use crate::errors::ServiceError;
use crate::models::{FinishedGood, Material, Reservation};
use crate::services::inventory::{
    FinishedGoodUpdate, InventoryValuation, LowStockReport, MaterialUpdate, NewBatch,
    NewFinishedGood, NewMaterial, NewReservation, StockAdjustment,
};
use crate::{ApiResponse, ApiResult};

const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

#[derive(Debug, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReservationFilters {
    pub order_id: Option<i64>,
}

#[derive(Debug, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MaterialFilters {
    /// Case-insensitive name match; returns the first matching material
    pub name: Option<String>,
}

fn csv_attachment(filename: &str, body: String) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, CSV_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
}

/// Create the inventory router
pub fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/materials", get(list_materials).post(create_material))
        .route("/materials/export", get(export_materials))
        .route(
            "/materials/:id",
            get(get_material)
                .put(update_material)
                .delete(delete_material),
        )
        .route("/materials/:id/adjust", post(adjust_material))
        .route("/materials/:id/batches", post(add_material_batch))
        .route(
            "/finished-goods",
            get(list_finished_goods).post(create_finished_good),
        )
        .route("/finished-goods/export", get(export_finished_goods))
        .route(
            "/finished-goods/:id",
            get(get_finished_good)
                .put(update_finished_good)
                .delete(delete_finished_good),
        )
        .route("/finished-goods/:id/adjust", post(adjust_finished_good))
        .route("/finished-goods/:id/batches", post(add_finished_good_batch))
        .route("/low-stock", get(low_stock))
        .route("/valuation", get(valuation))
        .route(
            "/reservations",
            get(list_reservations).post(create_reservation),
        )
        .route("/reservations/:id", delete(release_reservation))
        .route("/reservations/:id/fulfill", post(fulfill_reservation))
}

// Materials

#[utoipa::path(
    get,
    path = "/api/v1/inventory/materials",
    summary = "List raw materials",
    params(MaterialFilters),
    responses((status = 200, description = "Materials", body = ApiResponse<Vec<Material>>)),
    tag = "inventory"
)]
pub async fn list_materials(
    State(state): State<AppState>,
    Query(filters): Query<MaterialFilters>,
) -> ApiResult<Vec<Material>> {
    let inventory = &state.services.inventory;
    let materials = match filters.name.as_deref() {
        Some(name) => inventory.find_material(name).await?.into_iter().collect(),
        None => inventory.list_materials().await?,
    };
    Ok(ok(materials))
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory/materials/{id}",
    summary = "Get a raw material",
    params(("id" = i64, Path, description = "Material id")),
    responses(
        (status = 200, description = "Material", body = ApiResponse<Material>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn get_material(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Material> {
    Ok(ok(state.services.inventory.get_material(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/inventory/materials",
    summary = "Create a raw material",
    request_body = NewMaterial,
    responses(
        (status = 201, description = "Created", body = ApiResponse<Material>),
        (status = 409, description = "SKU already exists", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn create_material(
    State(state): State<AppState>,
    Json(payload): Json<NewMaterial>,
) -> Result<Created<Material>, ServiceError> {
    validate_input(&payload)?;
    Ok(created(state.services.inventory.create_material(payload).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/inventory/materials/{id}",
    summary = "Update a raw material",
    params(("id" = i64, Path, description = "Material id")),
    request_body = MaterialUpdate,
    responses(
        (status = 200, description = "Updated", body = ApiResponse<Material>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn update_material(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<MaterialUpdate>,
) -> ApiResult<Material> {
    validate_input(&payload)?;
    Ok(ok(state.services.inventory.update_material(id, payload).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/inventory/materials/{id}/adjust",
    summary = "Adjust material stock",
    description = "Positive deltas restock and stamp last_restocked; the result may not go negative.",
    params(("id" = i64, Path, description = "Material id")),
    request_body = StockAdjustment,
    responses(
        (status = 200, description = "Adjusted", body = ApiResponse<Material>),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn adjust_material(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<StockAdjustment>,
) -> ApiResult<Material> {
    validate_input(&payload)?;
    Ok(ok(state.services.inventory.adjust_material(id, payload).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/inventory/materials/{id}/batches",
    summary = "Receive a material batch",
    params(("id" = i64, Path, description = "Material id")),
    request_body = NewBatch,
    responses(
        (status = 200, description = "Batch received", body = ApiResponse<Material>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn add_material_batch(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<NewBatch>,
) -> ApiResult<Material> {
    validate_input(&payload)?;
    Ok(ok(state.services.inventory.add_material_batch(id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/inventory/materials/{id}",
    summary = "Delete a raw material",
    params(("id" = i64, Path, description = "Material id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn delete_material(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.services.inventory.delete_material(id).await?;
    Ok(deleted())
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory/materials/export",
    summary = "Export raw materials as CSV",
    responses((status = 200, description = "CSV with a header row", content_type = "text/csv", body = String)),
    tag = "inventory"
)]
pub async fn export_materials(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let body = state.services.inventory.export_materials_csv().await?;
    Ok(csv_attachment("materials.csv", body))
}

// Finished goods

#[utoipa::path(
    get,
    path = "/api/v1/inventory/finished-goods",
    summary = "List finished goods",
    responses((status = 200, description = "Finished goods", body = ApiResponse<Vec<FinishedGood>>)),
    tag = "inventory"
)]
pub async fn list_finished_goods(State(state): State<AppState>) -> ApiResult<Vec<FinishedGood>> {
    Ok(ok(state.services.inventory.list_finished_goods().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory/finished-goods/{id}",
    summary = "Get a finished good",
    params(("id" = i64, Path, description = "Finished good id")),
    responses(
        (status = 200, description = "Finished good", body = ApiResponse<FinishedGood>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn get_finished_good(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<FinishedGood> {
    Ok(ok(state.services.inventory.get_finished_good(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/inventory/finished-goods",
    summary = "Create a finished good",
    request_body = NewFinishedGood,
    responses(
        (status = 201, description = "Created", body = ApiResponse<FinishedGood>),
        (status = 409, description = "SKU already exists", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn create_finished_good(
    State(state): State<AppState>,
    Json(payload): Json<NewFinishedGood>,
) -> Result<Created<FinishedGood>, ServiceError> {
    validate_input(&payload)?;
    Ok(created(
        state.services.inventory.create_finished_good(payload).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/inventory/finished-goods/{id}",
    summary = "Update a finished good",
    params(("id" = i64, Path, description = "Finished good id")),
    request_body = FinishedGoodUpdate,
    responses(
        (status = 200, description = "Updated", body = ApiResponse<FinishedGood>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn update_finished_good(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<FinishedGoodUpdate>,
) -> ApiResult<FinishedGood> {
    validate_input(&payload)?;
    Ok(ok(state
        .services
        .inventory
        .update_finished_good(id, payload)
        .await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/inventory/finished-goods/{id}/adjust",
    summary = "Adjust finished good stock",
    params(("id" = i64, Path, description = "Finished good id")),
    request_body = StockAdjustment,
    responses(
        (status = 200, description = "Adjusted", body = ApiResponse<FinishedGood>),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn adjust_finished_good(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<StockAdjustment>,
) -> ApiResult<FinishedGood> {
    validate_input(&payload)?;
    Ok(ok(state
        .services
        .inventory
        .adjust_finished_good(id, payload)
        .await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/inventory/finished-goods/{id}/batches",
    summary = "Receive a finished goods batch",
    params(("id" = i64, Path, description = "Finished good id")),
    request_body = NewBatch,
    responses(
        (status = 200, description = "Batch received", body = ApiResponse<FinishedGood>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn add_finished_good_batch(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<NewBatch>,
) -> ApiResult<FinishedGood> {
    validate_input(&payload)?;
    Ok(ok(state
        .services
        .inventory
        .add_finished_good_batch(id, payload)
        .await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/inventory/finished-goods/{id}",
    summary = "Delete a finished good",
    params(("id" = i64, Path, description = "Finished good id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 400, description = "Open reservations exist", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn delete_finished_good(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    state.services.inventory.delete_finished_good(id).await?;
    Ok(deleted())
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory/finished-goods/export",
    summary = "Export finished goods as CSV",
    responses((status = 200, description = "CSV with a header row", content_type = "text/csv", body = String)),
    tag = "inventory"
)]
pub async fn export_finished_goods(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let body = state.services.inventory.export_finished_goods_csv().await?;
    Ok(csv_attachment("finished-goods.csv", body))
}

// Reporting

#[utoipa::path(
    get,
    path = "/api/v1/inventory/low-stock",
    summary = "Items at or below their reorder point",
    responses((status = 200, description = "Low and critical items", body = ApiResponse<LowStockReport>)),
    tag = "inventory"
)]
pub async fn low_stock(State(state): State<AppState>) -> ApiResult<LowStockReport> {
    Ok(ok(state.services.inventory.low_stock().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory/valuation",
    summary = "Inventory value at cost and price",
    responses((status = 200, description = "Valuation", body = ApiResponse<InventoryValuation>)),
    tag = "inventory"
)]
pub async fn valuation(State(state): State<AppState>) -> ApiResult<InventoryValuation> {
    Ok(ok(state.services.inventory.valuation().await?))
}

// Reservations

#[utoipa::path(
    get,
    path = "/api/v1/inventory/reservations",
    summary = "List reservations",
    params(ReservationFilters),
    responses((status = 200, description = "Reservations", body = ApiResponse<Vec<Reservation>>)),
    tag = "inventory"
)]
pub async fn list_reservations(
    State(state): State<AppState>,
    Query(filters): Query<ReservationFilters>,
) -> ApiResult<Vec<Reservation>> {
    Ok(ok(state
        .services
        .inventory
        .reservations(filters.order_id)
        .await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/inventory/reservations",
    summary = "Reserve finished goods for an order",
    request_body = NewReservation,
    responses(
        (status = 201, description = "Reserved", body = ApiResponse<Reservation>),
        (status = 400, description = "Unknown or closed order", body = crate::errors::ErrorResponse),
        (status = 422, description = "Not enough unreserved stock", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn create_reservation(
    State(state): State<AppState>,
    Json(payload): Json<NewReservation>,
) -> Result<Created<Reservation>, ServiceError> {
    validate_input(&payload)?;
    Ok(created(state.services.inventory.reserve(payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/inventory/reservations/{id}",
    summary = "Release a reservation",
    params(("id" = i64, Path, description = "Reservation id")),
    responses(
        (status = 200, description = "Released"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn release_reservation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    state.services.inventory.release(id).await?;
    Ok(deleted())
}

#[utoipa::path(
    post,
    path = "/api/v1/inventory/reservations/{id}/fulfill",
    summary = "Ship a reservation",
    description = "Removes the reservation and deducts its quantity from stock.",
    params(("id" = i64, Path, description = "Reservation id")),
    responses(
        (status = 200, description = "Fulfilled", body = ApiResponse<FinishedGood>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn fulfill_reservation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<FinishedGood> {
    Ok(ok(state.services.inventory.fulfill(id).await?))
}
