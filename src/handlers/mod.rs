pub mod activities;
pub mod alerts;
pub mod common;
pub mod customers;
pub mod dashboard;
pub mod health;
pub mod inventory;
pub mod machines;
pub mod orders;
pub mod production_lines;
pub mod quality;
pub mod reports;
pub mod work_orders;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::Repositories;
use crate::events::EventSender;
use crate::services::{
    activities::ActivityService, alerts::AlertService, customers::CustomerService,
    dashboard::DashboardService, inventory::InventoryService, machines::MachineService,
    orders::OrderService, production_lines::ProductionLineService, quality::QualityService,
    reports::ReportService, work_orders::WorkOrderService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub production_lines: Arc<ProductionLineService>,
    pub machines: Arc<MachineService>,
    pub quality: Arc<QualityService>,
    pub alerts: Arc<AlertService>,
    pub activities: Arc<ActivityService>,
    pub work_orders: Arc<WorkOrderService>,
    pub orders: Arc<OrderService>,
    pub inventory: Arc<InventoryService>,
    pub customers: Arc<CustomerService>,
    pub dashboard: Arc<DashboardService>,
    pub reports: Arc<ReportService>,
}

impl AppServices {
    /// Wires every service over the given repositories.
    pub fn new(repos: Repositories, events: EventSender, config: &AppConfig) -> Self {
        let production_lines = Arc::new(ProductionLineService::new(
            repos.production_lines,
            events.clone(),
        ));
        let machines = Arc::new(MachineService::new(repos.machines, events.clone()));
        let alerts = Arc::new(AlertService::new(repos.alerts, events.clone()));
        let quality = Arc::new(QualityService::new(
            repos.quality_metrics,
            alerts.clone(),
            events.clone(),
            config.defect_alert_threshold,
        ));
        let activities = Arc::new(ActivityService::new(repos.activities));
        let inventory = Arc::new(InventoryService::new(
            repos.materials,
            repos.finished_goods,
            repos.reservations,
            repos.orders.clone(),
            events.clone(),
        ));
        let work_orders = Arc::new(WorkOrderService::new(
            repos.work_orders,
            inventory.clone(),
            events.clone(),
            config.auto_materials,
        ));
        let customers = Arc::new(CustomerService::new(repos.customers));
        let orders = Arc::new(OrderService::new(
            repos.orders,
            customers.clone(),
            work_orders.clone(),
            events,
        ));
        let dashboard = Arc::new(DashboardService::new(
            production_lines.clone(),
            machines.clone(),
            quality.clone(),
            alerts.clone(),
            activities.clone(),
            work_orders.clone(),
        ));
        let reports = Arc::new(ReportService::new(
            production_lines.clone(),
            quality.clone(),
            work_orders.clone(),
            inventory.clone(),
            orders.clone(),
        ));

        Self {
            production_lines,
            machines,
            quality,
            alerts,
            activities,
            work_orders,
            orders,
            inventory,
            customers,
            dashboard,
            reports,
        }
    }
}
