use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::errors::ServiceError;
use crate::ApiResponse;

/// Created response with the standard envelope
pub type Created<T> = (StatusCode, Json<ApiResponse<T>>);

pub fn created<T: Serialize>(data: T) -> Created<T> {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::success(data))
}

pub fn deleted() -> Json<ApiResponse<()>> {
    Json(ApiResponse::message("Deleted"))
}

/// Validate request input
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input.validate().map_err(ServiceError::from)
}

/// Optional result cap for list endpoints
#[derive(Debug, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

/// Identifies who performed an action
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct ActorRequest {
    #[validate(length(min = 1, max = 100))]
    pub user: Option<String>,
}

impl ActorRequest {
    pub fn user_or_default(&self) -> &str {
        self.user.as_deref().unwrap_or("system")
    }
}
