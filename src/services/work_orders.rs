use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{
    round1, MaterialRequirement, MaterialStatus, Order, Priority, StageName, StageStatus,
    WorkOrder, WorkOrderStatus,
};
use crate::repositories::{require, Repository};
use crate::services::inventory::InventoryService;

/// Per-unit requirements synthesized for work orders created without a
/// material list, as (name, numerator, denominator).
const AUTO_MATERIALS: [(&str, u32, u32); 3] =
    [("Raw Steel", 5, 2), ("Fasteners", 8, 1), ("Packaging", 1, 1)];

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct MaterialInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(range(min = 1))]
    pub required: u32,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewWorkOrder {
    #[validate(length(min = 1, max = 200))]
    pub product: String,
    #[validate(range(min = 1, max = 1_000_000))]
    pub quantity: u32,
    #[schema(value_type = Option<String>, example = "High")]
    pub priority: Option<Priority>,
    #[validate(length(min = 1, max = 200))]
    pub customer: String,
    pub due_date: NaiveDate,
    pub assigned_line: Option<i64>,
    pub order_id: Option<i64>,
    #[serde(default)]
    #[validate]
    pub materials: Vec<MaterialInput>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct WorkOrderUpdate {
    #[validate(length(min = 1, max = 200))]
    pub product: Option<String>,
    #[validate(range(min = 1, max = 1_000_000))]
    pub quantity: Option<u32>,
    #[schema(value_type = Option<String>, example = "Urgent")]
    pub priority: Option<Priority>,
    #[validate(length(min = 1, max = 200))]
    pub customer: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub assigned_line: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct StageUpdate {
    /// Clamped to 0-100
    pub progress: Option<f64>,
    #[schema(value_type = Option<String>, example = "Complete")]
    pub status: Option<StageStatus>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct WorkOrderStatusUpdate {
    #[schema(value_type = String, example = "On Hold")]
    pub status: WorkOrderStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct WorkOrderSummary {
    pub total: usize,
    pub active: usize,
    pub overdue: usize,
    pub by_status: BTreeMap<String, usize>,
    pub average_progress: f64,
    pub material_cost: Decimal,
}

/// Materials synthesized from the order quantity, rounded up.
pub fn auto_material_inputs(quantity: u32) -> Vec<MaterialInput> {
    AUTO_MATERIALS
        .iter()
        .map(|(name, num, den)| MaterialInput {
            name: (*name).to_string(),
            required: quantity.saturating_mul(*num).div_ceil(*den),
        })
        .collect()
}

pub struct WorkOrderService {
    repo: Arc<dyn Repository<WorkOrder>>,
    inventory: Arc<InventoryService>,
    events: EventSender,
    auto_materials: bool,
    // held across read-modify-write of a work order
    write_lock: Mutex<()>,
}

impl WorkOrderService {
    pub fn new(
        repo: Arc<dyn Repository<WorkOrder>>,
        inventory: Arc<InventoryService>,
        events: EventSender,
        auto_materials: bool,
    ) -> Self {
        Self {
            repo,
            inventory,
            events,
            auto_materials,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn list(&self) -> Result<Vec<WorkOrder>, ServiceError> {
        self.repo.list().await
    }

    pub async fn by_status(&self, status: WorkOrderStatus) -> Result<Vec<WorkOrder>, ServiceError> {
        Ok(self
            .repo
            .list()
            .await?
            .into_iter()
            .filter(|wo| wo.status == status)
            .collect())
    }

    pub async fn get(&self, id: i64) -> Result<WorkOrder, ServiceError> {
        require(self.repo.as_ref(), "Work order", id).await
    }

    /// Creates a work order with a fresh four-stage pipeline and its
    /// material requirements reconciled against inventory.
    #[instrument(skip(self), fields(product = %input.product, quantity = input.quantity))]
    pub async fn create(&self, input: NewWorkOrder) -> Result<WorkOrder, ServiceError> {
        input.validate()?;
        let inputs = if input.materials.is_empty() && self.auto_materials {
            auto_material_inputs(input.quantity)
        } else {
            input.materials
        };
        let materials = self.reconcile(&inputs).await?;

        let now = Utc::now();
        let mut work_order = WorkOrder {
            id: 0,
            job_id: String::new(),
            product: input.product,
            quantity: input.quantity,
            priority: input.priority.unwrap_or_default(),
            customer: input.customer,
            due_date: input.due_date,
            assigned_line: input.assigned_line,
            order_id: input.order_id,
            stages: WorkOrder::initial_stages(),
            materials,
            status: WorkOrderStatus::Scheduled,
            current_stage: StageName::Setup,
            progress: 0.0,
            created_at: now,
            updated_at: now,
        };
        work_order.refresh_status(now.date_naive());

        let mut work_order = self.repo.insert(work_order).await?;
        work_order.job_id = WorkOrder::job_id_for(work_order.id, now.year());
        let work_order = self.repo.update(work_order).await?;

        info!(work_order_id = work_order.id, job_id = %work_order.job_id, "Work order created");
        self.events.emit(Event::WorkOrderCreated {
            id: work_order.id,
            job_id: work_order.job_id.clone(),
            product: work_order.product.clone(),
            quantity: work_order.quantity,
        });
        Ok(work_order)
    }

    /// Opens the work order that produces a customer order.
    pub async fn create_for_order(&self, order: &Order) -> Result<WorkOrder, ServiceError> {
        self.create(NewWorkOrder {
            product: order.product.clone(),
            quantity: order.quantity,
            priority: Some(order.priority),
            customer: order.customer.clone(),
            due_date: order.due_date,
            assigned_line: None,
            order_id: Some(order.id),
            materials: Vec::new(),
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn update(&self, id: i64, input: WorkOrderUpdate) -> Result<WorkOrder, ServiceError> {
        input.validate()?;
        let _guard = self.write_lock.lock().await;
        let mut work_order = self.get(id).await?;
        if let Some(product) = input.product {
            work_order.product = product;
        }
        if let Some(quantity) = input.quantity {
            work_order.quantity = quantity;
        }
        if let Some(priority) = input.priority {
            work_order.priority = priority;
        }
        if let Some(customer) = input.customer {
            work_order.customer = customer;
        }
        if let Some(due_date) = input.due_date {
            work_order.due_date = due_date;
        }
        if input.assigned_line.is_some() {
            work_order.assigned_line = input.assigned_line;
        }
        let now = Utc::now();
        let previous = work_order.status;
        work_order.refresh_status(now.date_naive());
        work_order.updated_at = now;
        let work_order = self.repo.update(work_order).await?;
        self.announce_status(&work_order, previous);
        Ok(work_order)
    }

    /// Moves one stage of the pipeline; see [`WorkOrder::apply_stage_update`].
    #[instrument(skip(self))]
    pub async fn update_stage(
        &self,
        id: i64,
        stage: StageName,
        update: StageUpdate,
    ) -> Result<WorkOrder, ServiceError> {
        if update.progress.is_none() && update.status.is_none() {
            return Err(ServiceError::ValidationError(
                "stage update needs a progress or a status".into(),
            ));
        }
        if update.progress.map_or(false, f64::is_nan) {
            return Err(ServiceError::ValidationError("progress must be a number".into()));
        }

        let _guard = self.write_lock.lock().await;
        let mut work_order = self.get(id).await?;
        let previous = work_order.status;
        let now = Utc::now();
        work_order.apply_stage_update(stage, update.progress, update.status, now)?;
        work_order.refresh_status(now.date_naive());
        let work_order = self.repo.update(work_order).await?;

        let stage_progress = work_order
            .stages
            .iter()
            .find(|s| s.name == stage)
            .map(|s| s.progress)
            .unwrap_or_default();
        info!(
            work_order_id = id,
            stage = %stage,
            stage_progress,
            progress = work_order.progress,
            "Work order stage updated"
        );
        self.events.emit(Event::WorkOrderStageUpdated {
            id,
            job_id: work_order.job_id.clone(),
            stage,
            progress: stage_progress,
        });
        self.announce_status(&work_order, previous);
        Ok(work_order)
    }

    /// Puts a work order on hold, resumes it, or cancels it. Overdue and
    /// Complete are derived and cannot be set directly.
    #[instrument(skip(self))]
    pub async fn set_status(
        &self,
        id: i64,
        status: WorkOrderStatus,
    ) -> Result<WorkOrder, ServiceError> {
        let _guard = self.write_lock.lock().await;
        let mut work_order = self.get(id).await?;
        let previous = work_order.status;
        if previous.is_terminal() {
            return Err(ServiceError::InvalidOperation(format!(
                "work order {} is already {}",
                work_order.job_id, previous
            )));
        }

        let now = Utc::now();
        match status {
            WorkOrderStatus::OnHold | WorkOrderStatus::Cancelled => work_order.status = status,
            WorkOrderStatus::Scheduled | WorkOrderStatus::InProgress => {
                if previous != WorkOrderStatus::OnHold {
                    return Err(ServiceError::InvalidOperation(format!(
                        "work order {} is not on hold",
                        work_order.job_id
                    )));
                }
                work_order.status = work_order.resumed_status();
                work_order.refresh_status(now.date_naive());
            }
            WorkOrderStatus::Overdue | WorkOrderStatus::Complete => {
                return Err(ServiceError::InvalidOperation(format!(
                    "status {} is set by the pipeline, not directly",
                    status
                )));
            }
        }
        work_order.updated_at = now;
        let work_order = self.repo.update(work_order).await?;
        self.announce_status(&work_order, previous);
        Ok(work_order)
    }

    /// Re-checks material availability against current inventory.
    #[instrument(skip(self))]
    pub async fn refresh_materials(&self, id: i64) -> Result<WorkOrder, ServiceError> {
        let _guard = self.write_lock.lock().await;
        let mut work_order = self.get(id).await?;
        let inputs: Vec<MaterialInput> = work_order
            .materials
            .iter()
            .map(|m| MaterialInput {
                name: m.name.clone(),
                required: m.required,
            })
            .collect();
        work_order.materials = self.reconcile(&inputs).await?;
        work_order.updated_at = Utc::now();
        self.repo.update(work_order).await
    }

    /// Flags every open work order due before `today` as Overdue. Returns how
    /// many changed.
    #[instrument(skip(self))]
    pub async fn refresh_overdue(&self, today: NaiveDate) -> Result<usize, ServiceError> {
        let _guard = self.write_lock.lock().await;
        let mut changed = 0;
        for mut work_order in self.repo.list().await? {
            let previous = work_order.status;
            if work_order.refresh_status(today) {
                let work_order = self.repo.update(work_order).await?;
                self.announce_status(&work_order, previous);
                changed += 1;
            }
        }
        if changed > 0 {
            info!(changed, "Work order statuses refreshed");
        }
        Ok(changed)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        let _guard = self.write_lock.lock().await;
        if self.repo.delete(id).await? {
            info!(work_order_id = id, "Work order deleted");
            Ok(())
        } else {
            Err(ServiceError::not_found("Work order", id))
        }
    }

    pub async fn summary(&self) -> Result<WorkOrderSummary, ServiceError> {
        Ok(Self::summarize(&self.repo.list().await?, Utc::now().date_naive()))
    }

    pub fn summarize(work_orders: &[WorkOrder], today: NaiveDate) -> WorkOrderSummary {
        let mut by_status = BTreeMap::new();
        for wo in work_orders {
            *by_status.entry(wo.status.to_string()).or_insert(0) += 1;
        }
        let average_progress = if work_orders.is_empty() {
            0.0
        } else {
            round1(work_orders.iter().map(|wo| wo.progress).sum::<f64>() / work_orders.len() as f64)
        };
        WorkOrderSummary {
            total: work_orders.len(),
            active: work_orders.iter().filter(|wo| !wo.status.is_terminal()).count(),
            overdue: work_orders.iter().filter(|wo| wo.is_overdue(today)).count(),
            by_status,
            average_progress,
            material_cost: work_orders.iter().map(WorkOrder::total_material_cost).sum(),
        }
    }

    async fn reconcile(
        &self,
        inputs: &[MaterialInput],
    ) -> Result<Vec<MaterialRequirement>, ServiceError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let stock = self.inventory.list_materials().await?;
        Ok(inputs
            .iter()
            .map(|input| match stock.iter().find(|m| m.matches_name(&input.name)) {
                Some(material) => MaterialRequirement::new(
                    input.name.clone(),
                    input.required,
                    material.current_stock,
                    material.unit_cost,
                ),
                None => MaterialRequirement {
                    status: MaterialStatus::Critical,
                    ..MaterialRequirement::new(input.name.clone(), input.required, 0, Decimal::ZERO)
                },
            })
            .collect())
    }

    fn announce_status(&self, work_order: &WorkOrder, previous: WorkOrderStatus) {
        if work_order.status != previous {
            info!(
                work_order_id = work_order.id,
                from = %previous,
                to = %work_order.status,
                "Work order status changed"
            );
            self.events.emit(Event::WorkOrderStatusChanged {
                id: work_order.id,
                job_id: work_order.job_id.clone(),
                status: work_order.status,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Material;
    use crate::repositories::MemoryRepository;
    use assert_matches::assert_matches;
    use chrono::Duration;

    fn steel(stock: u32) -> Material {
        Material {
            id: 1,
            name: "Raw Steel Sheet".into(),
            sku: "RM-001".into(),
            category: None,
            current_stock: stock,
            reorder_point: 100,
            unit: "kg".into(),
            unit_cost: Decimal::new(425, 2),
            supplier: None,
            location: None,
            last_restocked: None,
            batches: Vec::new(),
        }
    }

    fn service(materials: Vec<Material>, auto_materials: bool) -> WorkOrderService {
        let inventory = Arc::new(InventoryService::new(
            Arc::new(MemoryRepository::with_records(materials)),
            Arc::new(MemoryRepository::new()),
            Arc::new(MemoryRepository::new()),
            Arc::new(MemoryRepository::new()),
            EventSender::detached(),
        ));
        WorkOrderService::new(
            Arc::new(MemoryRepository::new()),
            inventory,
            EventSender::detached(),
            auto_materials,
        )
    }

    fn new_work_order(quantity: u32) -> NewWorkOrder {
        NewWorkOrder {
            product: "Gear Housing".into(),
            quantity,
            priority: None,
            customer: "Acme".into(),
            due_date: Utc::now().date_naive() + Duration::days(14),
            assigned_line: None,
            order_id: None,
            materials: Vec::new(),
        }
    }

    #[test]
    fn auto_materials_round_up() {
        let inputs = auto_material_inputs(3);
        let pairs: Vec<(&str, u32)> = inputs.iter().map(|m| (m.name.as_str(), m.required)).collect();
        assert_eq!(pairs, vec![("Raw Steel", 8), ("Fasteners", 24), ("Packaging", 3)]);
    }

    #[tokio::test]
    async fn create_assigns_increasing_ids_and_fresh_pipeline() {
        let service = service(vec![], true);
        let first = service.create(new_work_order(10)).await.unwrap();
        let second = service.create(new_work_order(10)).await.unwrap();

        assert!(second.id > first.id);
        assert_eq!(first.job_id, WorkOrder::job_id_for(first.id, Utc::now().year()));
        assert_eq!(first.status, WorkOrderStatus::Scheduled);
        assert_eq!(first.current_stage, StageName::Setup);
        assert_eq!(first.stages.len(), 4);
        assert_eq!(first.priority, Priority::Medium);
    }

    #[tokio::test]
    async fn materials_reconcile_against_inventory() {
        let service = service(vec![steel(30)], true);
        let wo = service.create(new_work_order(10)).await.unwrap();

        let raw = &wo.materials[0];
        assert_eq!(raw.name, "Raw Steel");
        assert_eq!(raw.required, 25);
        assert_eq!(raw.available, 30);
        assert_eq!(raw.status, MaterialStatus::Available);
        assert_eq!(raw.total_cost, Decimal::new(10625, 2));

        let fasteners = &wo.materials[1];
        assert_eq!(fasteners.status, MaterialStatus::Critical);
        assert_eq!(fasteners.available, 0);
    }

    #[tokio::test]
    async fn auto_materials_can_be_disabled() {
        let service = service(vec![steel(30)], false);
        let wo = service.create(new_work_order(10)).await.unwrap();
        assert!(wo.materials.is_empty());
    }

    #[tokio::test]
    async fn past_due_date_is_overdue_on_creation() {
        let service = service(vec![], false);
        let mut input = new_work_order(1);
        input.due_date = Utc::now().date_naive() - Duration::days(1);
        let wo = service.create(input).await.unwrap();
        assert_eq!(wo.status, WorkOrderStatus::Overdue);
    }

    #[tokio::test]
    async fn stage_update_requires_a_change() {
        let service = service(vec![], false);
        let wo = service.create(new_work_order(1)).await.unwrap();
        assert_matches!(
            service.update_stage(wo.id, StageName::Setup, StageUpdate::default()).await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn hold_and_resume() {
        let service = service(vec![], false);
        let wo = service.create(new_work_order(1)).await.unwrap();
        service
            .update_stage(wo.id, StageName::Setup, StageUpdate { progress: Some(40.0), status: None })
            .await
            .unwrap();

        let held = service.set_status(wo.id, WorkOrderStatus::OnHold).await.unwrap();
        assert_eq!(held.status, WorkOrderStatus::OnHold);

        let resumed = service.set_status(wo.id, WorkOrderStatus::InProgress).await.unwrap();
        assert_eq!(resumed.status, WorkOrderStatus::InProgress);

        assert_matches!(
            service.set_status(wo.id, WorkOrderStatus::Complete).await,
            Err(ServiceError::InvalidOperation(_))
        );
    }

    #[tokio::test]
    async fn held_order_rejects_stage_updates_until_resumed() {
        let service = service(vec![], false);
        let wo = service.create(new_work_order(1)).await.unwrap();
        service.set_status(wo.id, WorkOrderStatus::OnHold).await.unwrap();

        let setup = StageUpdate { progress: Some(30.0), status: None };
        assert_matches!(
            service.update_stage(wo.id, StageName::Setup, setup.clone()).await,
            Err(ServiceError::InvalidOperation(_))
        );
        let held = service.get(wo.id).await.unwrap();
        assert_eq!(held.status, WorkOrderStatus::OnHold);
        assert_eq!(held.progress, 0.0);

        service.set_status(wo.id, WorkOrderStatus::Scheduled).await.unwrap();
        let wo = service.update_stage(wo.id, StageName::Setup, setup).await.unwrap();
        assert_eq!(wo.status, WorkOrderStatus::InProgress);
    }

    #[tokio::test]
    async fn refresh_overdue_counts_changes() {
        let service = service(vec![], false);
        let wo = service.create(new_work_order(1)).await.unwrap();
        let later = wo.due_date + Duration::days(1);

        assert_eq!(service.refresh_overdue(later).await.unwrap(), 1);
        assert_eq!(service.refresh_overdue(later).await.unwrap(), 0);
        assert_eq!(service.get(wo.id).await.unwrap().status, WorkOrderStatus::Overdue);
    }

    #[tokio::test]
    async fn refresh_materials_picks_up_restock() {
        let service = service(vec![steel(0)], true);
        let wo = service.create(new_work_order(10)).await.unwrap();
        assert_eq!(wo.materials[0].status, MaterialStatus::Critical);

        service
            .inventory
            .adjust_material(
                1,
                crate::services::inventory::StockAdjustment { delta: 20, reason: None },
            )
            .await
            .unwrap();
        let wo = service.refresh_materials(wo.id).await.unwrap();
        assert_eq!(wo.materials[0].status, MaterialStatus::Low);
    }
}
