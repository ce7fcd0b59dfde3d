use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "PlantOps API",
        version = "1.0.0",
        description = r#"
# PlantOps Manufacturing Operations API

Backend for a plant-floor dashboard.

## Features

- **Production**: line status, output and efficiency
- **Machines**: utilization and maintenance scheduling
- **Quality**: defect-rate inspections with automatic alerts
- **Work Orders**: four-stage production pipeline with material reconciliation
- **Orders**: customer orders with a status timeline that spawns work orders
- **Inventory**: raw materials, finished goods, batches, reservations and CSV export
- **Dashboard & Reports**: periodically refreshed KPI snapshot and summary reports

## Responses

Every JSON body is wrapped in `{success, data, message, errors, meta}`. Errors
use `{error, message, details, request_id, timestamp}`. Send `x-request-id`
to correlate logs; it is echoed on every response.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "production", description = "Production line endpoints"),
        (name = "machines", description = "Machine and maintenance endpoints"),
        (name = "quality", description = "Quality inspection endpoints"),
        (name = "alerts", description = "Alert endpoints"),
        (name = "activities", description = "Activity feed endpoints"),
        (name = "work-orders", description = "Work order endpoints"),
        (name = "orders", description = "Customer order endpoints"),
        (name = "inventory", description = "Inventory endpoints"),
        (name = "customers", description = "Customer endpoints"),
        (name = "dashboard", description = "Dashboard snapshot"),
        (name = "reports", description = "Summary reports"),
        (name = "health", description = "Health check endpoints")
    ),
    paths(
        // Production
        crate::handlers::production_lines::list_lines,
        crate::handlers::production_lines::get_line,
        crate::handlers::production_lines::create_line,
        crate::handlers::production_lines::update_line,
        crate::handlers::production_lines::record_output,
        crate::handlers::production_lines::assign_job,
        crate::handlers::production_lines::delete_line,

        // Machines
        crate::handlers::machines::list_machines,
        crate::handlers::machines::maintenance_due,
        crate::handlers::machines::get_machine,
        crate::handlers::machines::create_machine,
        crate::handlers::machines::update_machine,
        crate::handlers::machines::record_maintenance,
        crate::handlers::machines::delete_machine,

        // Quality
        crate::handlers::quality::list_metrics,
        crate::handlers::quality::average_defect_rate,
        crate::handlers::quality::get_metric,
        crate::handlers::quality::create_metric,
        crate::handlers::quality::update_metric,
        crate::handlers::quality::delete_metric,

        // Alerts
        crate::handlers::alerts::list_alerts,
        crate::handlers::alerts::unacknowledged_count,
        crate::handlers::alerts::get_alert,
        crate::handlers::alerts::create_alert,
        crate::handlers::alerts::update_alert,
        crate::handlers::alerts::acknowledge_alert,
        crate::handlers::alerts::delete_alert,

        // Activities
        crate::handlers::activities::list_activities,
        crate::handlers::activities::get_activity,
        crate::handlers::activities::create_activity,
        crate::handlers::activities::delete_activity,

        // Work orders
        crate::handlers::work_orders::list_work_orders,
        crate::handlers::work_orders::work_order_summary,
        crate::handlers::work_orders::get_work_order,
        crate::handlers::work_orders::create_work_order,
        crate::handlers::work_orders::update_work_order,
        crate::handlers::work_orders::set_work_order_status,
        crate::handlers::work_orders::update_stage,
        crate::handlers::work_orders::refresh_materials,
        crate::handlers::work_orders::delete_work_order,

        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::order_summary,
        crate::handlers::orders::get_order,
        crate::handlers::orders::create_order,
        crate::handlers::orders::update_order,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::delete_order,

        // Inventory
        crate::handlers::inventory::list_materials,
        crate::handlers::inventory::get_material,
        crate::handlers::inventory::create_material,
        crate::handlers::inventory::update_material,
        crate::handlers::inventory::adjust_material,
        crate::handlers::inventory::add_material_batch,
        crate::handlers::inventory::delete_material,
        crate::handlers::inventory::export_materials,
        crate::handlers::inventory::list_finished_goods,
        crate::handlers::inventory::get_finished_good,
        crate::handlers::inventory::create_finished_good,
        crate::handlers::inventory::update_finished_good,
        crate::handlers::inventory::adjust_finished_good,
        crate::handlers::inventory::add_finished_good_batch,
        crate::handlers::inventory::delete_finished_good,
        crate::handlers::inventory::export_finished_goods,
        crate::handlers::inventory::low_stock,
        crate::handlers::inventory::valuation,
        crate::handlers::inventory::list_reservations,
        crate::handlers::inventory::create_reservation,
        crate::handlers::inventory::release_reservation,
        crate::handlers::inventory::fulfill_reservation,

        // Customers
        crate::handlers::customers::list_customers,
        crate::handlers::customers::get_customer,
        crate::handlers::customers::create_customer,
        crate::handlers::customers::update_customer,
        crate::handlers::customers::delete_customer,

        // Dashboard & reports
        crate::handlers::dashboard::get_dashboard,
        crate::handlers::dashboard::refresh_dashboard,
        crate::handlers::reports::report_summary,

        // Health
        crate::handlers::health::liveness_check,
        crate::handlers::health::readiness_check,
    ),
    components(
        schemas(
            crate::ResponseMeta,
            crate::errors::ErrorResponse,
            crate::handlers::common::ActorRequest,
            crate::handlers::health::HealthResponse,
        )
    )
)]
pub struct ApiDocV1;

/// Serves the generated document at `/api-docs/openapi.json`
pub fn openapi_routes() -> Router<crate::AppState> {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDocV1::openapi()) }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_core_paths() {
        let json = serde_json::to_string(&ApiDocV1::openapi()).unwrap();
        assert!(json.contains("PlantOps API"));
        assert!(json.contains("/api/v1/work-orders/{id}/stages/{stage}"));
        assert!(json.contains("/api/v1/inventory/reservations"));
        assert!(json.contains("ErrorResponse"));
    }
}
