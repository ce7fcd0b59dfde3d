use axum::{extract::State, routing::get, Router};

use super::common::ok;
use super::AppState;
use crate::services::reports::ReportSummary;
use crate::{ApiResponse, ApiResult};

pub fn reports_routes() -> Router<AppState> {
    Router::new().route("/summary", get(report_summary))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/summary",
    summary = "Plant-wide report",
    description = "Production, quality, work order, inventory and order figures in one document.",
    responses((status = 200, description = "Report", body = ApiResponse<ReportSummary>)),
    tag = "reports"
)]
pub async fn report_summary(State(state): State<AppState>) -> ApiResult<ReportSummary> {
    Ok(ok(state.services.reports.summary().await?))
}
