//! PlantOps API Library
//!
//! Backend for a manufacturing-operations dashboard: production lines,
//! machines, quality inspections, alerts, work orders, customer orders and
//! inventory, served as a JSON API.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod errors;
pub mod events;
pub mod fixtures;
pub mod handlers;
pub mod middleware_helpers;
pub mod models;
pub mod openapi;
pub mod records;
pub mod repositories;
pub mod services;
pub mod tracing;

use axum::{extract::State, http::HeaderValue, response::Json, routing::get, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer};
use utoipa::ToSchema;

use crate::records::RecordStore;
use crate::services::dashboard::SnapshotCache;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
    pub snapshots: SnapshotCache,
    pub record_store: Option<Arc<dyn RecordStore>>,
}

impl AppState {
    pub fn new(
        config: config::AppConfig,
        repos: db::Repositories,
        event_sender: events::EventSender,
    ) -> Self {
        let record_store = repos.record_store.clone();
        let services = handlers::AppServices::new(repos, event_sender.clone(), &config);
        Self {
            config,
            event_sender,
            services,
            snapshots: SnapshotCache::new(),
            record_store,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn error_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-err"), async {
                ApiResponse::<()>::error("oops".into())
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-err"));
        assert!(!meta.timestamp.is_empty());
    }

    #[tokio::test]
    async fn validation_errors_response_includes_metadata() {
        let response = crate::tracing::scope_request_id(
            crate::tracing::RequestId::new("meta-validation"),
            async { ApiResponse::<()>::validation_errors(vec!["missing".into()]) },
        )
        .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-validation"));
        assert_eq!(response.errors.map(|e| e.len()), Some(1));
    }

    #[test]
    fn message_response_has_no_data() {
        let response = ApiResponse::<()>::message("Deleted");
        assert!(response.success);
        assert!(response.data.is_none());
        assert_eq!(response.message.as_deref(), Some("Deleted"));
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Every `/api/v1` route
pub fn api_v1_routes() -> Router<AppState> {
    use handlers::*;

    Router::new()
        // Status
        .route("/status", get(api_status))
        .nest("/health", health::health_routes())
        // Plant floor
        .nest("/dashboard", dashboard::dashboard_routes())
        .nest("/production-lines", production_lines::production_lines_routes())
        .nest("/machines", machines::machines_routes())
        .nest("/quality-metrics", quality::quality_routes())
        .nest("/alerts", alerts::alerts_routes())
        .nest("/activities", activities::activities_routes())
        // Production planning
        .nest("/work-orders", work_orders::work_orders_routes())
        .nest("/orders", orders::orders_routes())
        .nest("/customers", customers::customers_routes())
        .nest("/inventory", inventory::inventory_routes())
        // Reporting
        .nest("/reports", reports::reports_routes())
}

/// Builds the complete HTTP application around `state`.
///
/// Layers, outermost first: request id, CORS, compression, HTTP tracing.
pub fn app_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::<AppState>::new()
        .route("/", get(|| async { "plantops-api up" }))
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::openapi_routes())
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

/// Explicit origins when configured; permissive in development; otherwise
/// same-origin only.
fn cors_layer(config: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins()
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
    } else if config.is_development() {
        ::tracing::info!("Using permissive CORS in development");
        CorsLayer::permissive()
    } else {
        ::tracing::warn!("No CORS origins configured; cross-origin requests will be refused");
        CorsLayer::new()
    }
}

async fn api_status(State(state): State<AppState>) -> ApiResult<Value> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "plantops-api",
        "timestamp": Utc::now().to_rfc3339(),
        "environment": state.config.environment,
        "data_source": state.config.data_source.to_ascii_lowercase(),
    });

    Ok(Json(ApiResponse::success(status_data)))
}
