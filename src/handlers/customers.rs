use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use super::common::{created, deleted, ok, validate_input, Created};
use super::AppState;
use crate::errors::ServiceError;
use crate::models::Customer;
use crate::services::customers::{CustomerUpdate, NewCustomer};
use crate::{ApiResponse, ApiResult};

pub fn customers_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_customers).post(create_customer))
        .route(
            "/:id",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
}

#[utoipa::path(
    get,
    path = "/api/v1/customers",
    summary = "List customers",
    responses((status = 200, description = "Customers by name", body = ApiResponse<Vec<Customer>>)),
    tag = "customers"
)]
pub async fn list_customers(State(state): State<AppState>) -> ApiResult<Vec<Customer>> {
    Ok(ok(state.services.customers.list().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/customers/{id}",
    summary = "Get a customer",
    params(("id" = i64, Path, description = "Customer id")),
    responses(
        (status = 200, description = "Customer", body = ApiResponse<Customer>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "customers"
)]
pub async fn get_customer(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Customer> {
    Ok(ok(state.services.customers.get(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/customers",
    summary = "Create a customer",
    request_body = NewCustomer,
    responses(
        (status = 201, description = "Created", body = ApiResponse<Customer>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::errors::ErrorResponse)
    ),
    tag = "customers"
)]
pub async fn create_customer(
    State(state): State<AppState>,
    Json(payload): Json<NewCustomer>,
) -> Result<Created<Customer>, ServiceError> {
    validate_input(&payload)?;
    Ok(created(state.services.customers.create(payload).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/customers/{id}",
    summary = "Update a customer",
    params(("id" = i64, Path, description = "Customer id")),
    request_body = CustomerUpdate,
    responses(
        (status = 200, description = "Updated", body = ApiResponse<Customer>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "customers"
)]
pub async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<CustomerUpdate>,
) -> ApiResult<Customer> {
    validate_input(&payload)?;
    Ok(ok(state.services.customers.update(id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/customers/{id}",
    summary = "Delete a customer",
    params(("id" = i64, Path, description = "Customer id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "customers"
)]
pub async fn delete_customer(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.services.customers.delete(id).await?;
    Ok(deleted())
}
