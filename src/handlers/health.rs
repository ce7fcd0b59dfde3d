use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::time::Instant;
use utoipa::ToSchema;

use super::AppState;
use crate::models::Machine;
use crate::repositories::Record;

/// Component health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Up,
    Down,
    Degraded,
}

/// Individual component health details
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthDetails {
    /// Remote record store; absent when running on in-memory data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_store: Option<ComponentHealth>,
    pub dashboard: ComponentHealth,
}

/// Full health check response
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub version: String,
    pub timestamp: String,
    pub uptime_secs: u64,
    pub data_source: String,
    pub details: HealthDetails,
}

/// Tracks application start time for uptime calculation
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize the start time (call this on application startup)
pub fn init_start_time() {
    let _ = START_TIME.get_or_init(Instant::now);
}

fn get_uptime_secs() -> u64 {
    START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0)
}

/// Endpoints:
/// - GET /health        - component status
/// - GET /health/live   - liveness probe
/// - GET /health/ready  - readiness probe
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(readiness_check))
        .route("/live", get(liveness_check))
        .route("/ready", get(readiness_check))
}

#[utoipa::path(
    get,
    path = "/api/v1/health/live",
    summary = "Liveness probe",
    responses((status = 200, description = "Process is running")),
    tag = "health"
)]
pub async fn liveness_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "up",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn check_record_store(state: &AppState) -> Option<ComponentHealth> {
    let store = state.record_store.as_ref()?;
    let started = Instant::now();
    let result = store.fetch(Machine::TABLE, &["name"]).await;
    let latency_ms = Some(started.elapsed().as_millis() as u64);
    Some(match result {
        Ok(rows) => ComponentHealth {
            status: ComponentStatus::Up,
            message: format!("{} machine records reachable", rows.len()),
            latency_ms,
        },
        Err(e) => ComponentHealth {
            status: ComponentStatus::Down,
            message: format!("Record store unreachable: {}", e),
            latency_ms,
        },
    })
}

async fn check_dashboard(state: &AppState) -> ComponentHealth {
    match state.snapshots.get().await {
        Some(snapshot) => {
            let age = chrono::Utc::now() - snapshot.generated_at;
            let stale_after = state.config.dashboard_refresh_secs.saturating_mul(3) as i64;
            let status = if age.num_seconds() > stale_after {
                ComponentStatus::Degraded
            } else {
                ComponentStatus::Up
            };
            ComponentHealth {
                status,
                message: format!("Snapshot is {}s old", age.num_seconds()),
                latency_ms: None,
            }
        }
        None => ComponentHealth {
            status: ComponentStatus::Degraded,
            message: "No snapshot computed yet".to_string(),
            latency_ms: None,
        },
    }
}

/// A down record store degrades rather than fails the service: reads fall
/// back to fixture data and only writes are affected.
fn overall_status(details: &HealthDetails) -> ComponentStatus {
    let store_up = details
        .record_store
        .as_ref()
        .map_or(true, |c| c.status == ComponentStatus::Up);
    if store_up && details.dashboard.status == ComponentStatus::Up {
        ComponentStatus::Up
    } else {
        ComponentStatus::Degraded
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/health/ready",
    summary = "Readiness probe with component status",
    responses((status = 200, description = "Component status", body = HealthResponse)),
    tag = "health"
)]
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let details = HealthDetails {
        record_store: check_record_store(&state).await,
        dashboard: check_dashboard(&state).await,
    };
    let status = overall_status(&details);
    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime_secs: get_uptime_secs(),
        data_source: state.config.data_source.to_ascii_lowercase(),
        details,
    };
    Json(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(status: ComponentStatus) -> ComponentHealth {
        ComponentHealth {
            status,
            message: String::new(),
            latency_ms: None,
        }
    }

    #[test]
    fn store_outage_degrades_instead_of_failing() {
        let details = HealthDetails {
            record_store: Some(component(ComponentStatus::Down)),
            dashboard: component(ComponentStatus::Up),
        };
        assert_eq!(overall_status(&details), ComponentStatus::Degraded);
    }

    #[test]
    fn in_memory_with_fresh_snapshot_is_up() {
        let details = HealthDetails {
            record_store: None,
            dashboard: component(ComponentStatus::Up),
        };
        assert_eq!(overall_status(&details), ComponentStatus::Up);
    }

    #[test]
    fn missing_snapshot_is_degraded() {
        let details = HealthDetails {
            record_store: None,
            dashboard: component(ComponentStatus::Degraded),
        };
        assert_eq!(overall_status(&details), ComponentStatus::Degraded);
    }
}
