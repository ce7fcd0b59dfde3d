use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

use super::common::{created, deleted, ok, validate_input, Created};
use super::AppState;
use crate::errors::ServiceError;
use crate::models::{Order, OrderStatus};
use crate::services::orders::{NewOrder, OrderStatusChange, OrderSummary, OrderUpdate};
use crate::{ApiResponse, ApiResult};

#[derive(Debug, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderFilters {
    /// Status label, e.g. "Ready to Ship"
    pub status: Option<String>,
}

/// Create the orders router
pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/summary", get(order_summary))
        .route("/:id", get(get_order).put(update_order).delete(delete_order))
        .route("/:id/status", put(update_order_status))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List customer orders",
    params(OrderFilters),
    responses(
        (status = 200, description = "Orders", body = ApiResponse<Vec<Order>>),
        (status = 400, description = "Unknown status", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(filters): Query<OrderFilters>,
) -> ApiResult<Vec<Order>> {
    let orders = match filters.status.as_deref() {
        Some(raw) => {
            let status: OrderStatus = raw.parse()?;
            state.services.orders.by_status(status).await?
        }
        None => state.services.orders.list().await?,
    };
    Ok(ok(orders))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/summary",
    summary = "Order counts and revenue",
    responses((status = 200, description = "Summary", body = ApiResponse<OrderSummary>)),
    tag = "orders"
)]
pub async fn order_summary(State(state): State<AppState>) -> ApiResult<OrderSummary> {
    Ok(ok(state.services.orders.summary().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get an order",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with timeline", body = ApiResponse<Order>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn get_order(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Order> {
    Ok(ok(state.services.orders.get(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Create an order",
    request_body = NewOrder,
    responses(
        (status = 201, description = "Created", body = ApiResponse<Order>),
        (status = 400, description = "Invalid input or unknown customer", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(payload): Json<NewOrder>,
) -> Result<Created<Order>, ServiceError> {
    validate_input(&payload)?;
    Ok(created(state.services.orders.create(payload).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}",
    summary = "Update an order",
    params(("id" = i64, Path, description = "Order id")),
    request_body = OrderUpdate,
    responses(
        (status = 200, description = "Updated", body = ApiResponse<Order>),
        (status = 400, description = "Order is closed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<OrderUpdate>,
) -> ApiResult<Order> {
    validate_input(&payload)?;
    Ok(ok(state.services.orders.update(id, payload).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    summary = "Move an order to a new status",
    description = "Appends a timeline event. Entering In Production creates the work order.",
    params(("id" = i64, Path, description = "Order id")),
    request_body = OrderStatusChange,
    responses(
        (status = 200, description = "Status changed", body = ApiResponse<Order>),
        (status = 400, description = "Order is closed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<OrderStatusChange>,
) -> ApiResult<Order> {
    validate_input(&payload)?;
    Ok(ok(state.services.orders.update_status(id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}",
    summary = "Delete an order",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn delete_order(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.services.orders.delete(id).await?;
    Ok(deleted())
}
