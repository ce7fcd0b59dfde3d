use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::models::{round1, StockLevel, WorkOrderStatus};
use crate::services::inventory::{InventoryService, InventoryValuation};
use crate::services::orders::{OrderService, OrderSummary};
use crate::services::production_lines::ProductionLineService;
use crate::services::quality::QualityService;
use crate::services::work_orders::{WorkOrderService, WorkOrderSummary};

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProductionReport {
    pub lines: usize,
    pub total_output: u64,
    pub target_output: u64,
    pub average_efficiency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct QualityReport {
    pub inspections: usize,
    pub average_defect_rate: f64,
    /// Mean defect rate keyed by line id
    pub defect_rate_by_line: BTreeMap<i64, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct WorkOrderReport {
    #[serde(flatten)]
    pub summary: WorkOrderSummary,
    /// Completed share of work orders, percent
    pub completion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct InventoryReport {
    pub valuation: InventoryValuation,
    pub materials_low: usize,
    pub materials_critical: usize,
    pub finished_goods_low: usize,
    pub finished_goods_critical: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ReportSummary {
    pub generated_at: DateTime<Utc>,
    pub production: ProductionReport,
    pub quality: QualityReport,
    pub work_orders: WorkOrderReport,
    pub inventory: InventoryReport,
    pub orders: OrderSummary,
}

pub struct ReportService {
    lines: Arc<ProductionLineService>,
    quality: Arc<QualityService>,
    work_orders: Arc<WorkOrderService>,
    inventory: Arc<InventoryService>,
    orders: Arc<OrderService>,
}

impl ReportService {
    pub fn new(
        lines: Arc<ProductionLineService>,
        quality: Arc<QualityService>,
        work_orders: Arc<WorkOrderService>,
        inventory: Arc<InventoryService>,
        orders: Arc<OrderService>,
    ) -> Self {
        Self {
            lines,
            quality,
            work_orders,
            inventory,
            orders,
        }
    }

    #[instrument(skip(self))]
    pub async fn summary(&self) -> Result<ReportSummary, ServiceError> {
        let (lines, metrics, work_orders, low_stock, valuation, orders) = tokio::try_join!(
            self.lines.list(),
            self.quality.list(None),
            self.work_orders.summary(),
            self.inventory.low_stock(),
            self.inventory.valuation(),
            self.orders.summary(),
        )?;

        let completed = work_orders
            .by_status
            .get(WorkOrderStatus::Complete.as_str())
            .copied()
            .unwrap_or(0);
        let completion_rate = if work_orders.total == 0 {
            0.0
        } else {
            round1(completed as f64 / work_orders.total as f64 * 100.0)
        };

        let count = |items: &[crate::services::inventory::StockItem], level: StockLevel| {
            items.iter().filter(|i| i.level == level).count()
        };

        Ok(ReportSummary {
            generated_at: Utc::now(),
            production: ProductionReport {
                lines: lines.len(),
                total_output: lines.iter().map(|l| u64::from(l.actual_output)).sum(),
                target_output: lines.iter().map(|l| u64::from(l.target_output)).sum(),
                average_efficiency: ProductionLineService::overall_efficiency(&lines),
            },
            quality: QualityReport {
                inspections: metrics.len(),
                average_defect_rate: QualityService::mean_defect_rate(&metrics),
                defect_rate_by_line: QualityService::defect_rate_by_line(&metrics),
            },
            work_orders: WorkOrderReport {
                summary: work_orders,
                completion_rate,
            },
            inventory: InventoryReport {
                valuation,
                materials_low: count(&low_stock.materials, StockLevel::Low),
                materials_critical: count(&low_stock.materials, StockLevel::Critical),
                finished_goods_low: count(&low_stock.finished_goods, StockLevel::Low),
                finished_goods_critical: count(&low_stock.finished_goods, StockLevel::Critical),
            },
            orders,
        })
    }
}
