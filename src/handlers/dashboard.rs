use axum::{
    extract::State,
    routing::{get, post},
    Router,
};

use super::common::ok;
use super::AppState;
use crate::services::dashboard::DashboardSnapshot;
use crate::{ApiResponse, ApiResult};

pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_dashboard))
        .route("/refresh", post(refresh_dashboard))
}

#[utoipa::path(
    get,
    path = "/api/v1/dashboard",
    summary = "Dashboard snapshot",
    description = "Serves the most recent background snapshot, computing one when none exists yet.",
    responses((status = 200, description = "Snapshot with KPIs", body = ApiResponse<DashboardSnapshot>)),
    tag = "dashboard"
)]
pub async fn get_dashboard(State(state): State<AppState>) -> ApiResult<DashboardSnapshot> {
    let snapshot = state
        .snapshots
        .get_or_refresh(&state.services.dashboard)
        .await?;
    Ok(ok(DashboardSnapshot::clone(&snapshot)))
}

#[utoipa::path(
    post,
    path = "/api/v1/dashboard/refresh",
    summary = "Recompute the dashboard now",
    description = "Waits for any refresh already running, then recomputes and caches the snapshot.",
    responses((status = 200, description = "Fresh snapshot", body = ApiResponse<DashboardSnapshot>)),
    tag = "dashboard"
)]
pub async fn refresh_dashboard(State(state): State<AppState>) -> ApiResult<DashboardSnapshot> {
    let snapshot = state
        .snapshots
        .refresh(&state.services.dashboard)
        .await?;
    Ok(ok(DashboardSnapshot::clone(&snapshot)))
}
