use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, IntoStaticStr};
use utoipa::ToSchema;

use super::round1;
use crate::errors::ServiceError;
use crate::repositories::Record;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, IntoStaticStr, EnumIter,
)]
#[serde(try_from = "String", into = "String")]
pub enum StageName {
    Setup,
    Production,
    #[strum(serialize = "Quality Check")]
    QualityCheck,
    Complete,
}

impl_labeled!(StageName);

impl StageName {
    /// The fixed pipeline every work order moves through, in order.
    pub const PIPELINE: [StageName; 4] = [
        StageName::Setup,
        StageName::Production,
        StageName::QualityCheck,
        StageName::Complete,
    ];
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, IntoStaticStr, EnumIter,
)]
#[serde(try_from = "String", into = "String")]
pub enum StageStatus {
    Pending,
    #[strum(serialize = "In Progress")]
    InProgress,
    Complete,
}

impl_labeled!(StageStatus);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, IntoStaticStr, EnumIter,
)]
#[serde(try_from = "String", into = "String")]
pub enum WorkOrderStatus {
    Scheduled,
    #[strum(serialize = "In Progress")]
    InProgress,
    #[strum(serialize = "On Hold")]
    OnHold,
    Overdue,
    Complete,
    Cancelled,
}

impl_labeled!(WorkOrderStatus);

impl WorkOrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkOrderStatus::Complete | WorkOrderStatus::Cancelled)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, IntoStaticStr, EnumIter,
)]
#[serde(try_from = "String", into = "String")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl_labeled!(Priority);

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, IntoStaticStr, EnumIter,
)]
#[serde(try_from = "String", into = "String")]
pub enum MaterialStatus {
    Available,
    Low,
    Critical,
}

impl_labeled!(MaterialStatus);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Stage {
    #[schema(value_type = String, example = "Setup")]
    pub name: StageName,
    #[schema(value_type = String, example = "Pending")]
    pub status: StageStatus,
    /// 0-100
    pub progress: f64,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

impl Stage {
    fn pending(name: StageName) -> Self {
        Self {
            name,
            status: StageStatus::Pending,
            progress: 0.0,
            start_time: None,
            end_time: None,
        }
    }

    fn start(&mut self, now: DateTime<Utc>) {
        self.status = StageStatus::InProgress;
        self.start_time.get_or_insert(now);
    }

    fn complete(&mut self, now: DateTime<Utc>) {
        self.status = StageStatus::Complete;
        self.progress = 100.0;
        self.start_time.get_or_insert(now);
        self.end_time = Some(now);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MaterialRequirement {
    pub name: String,
    pub required: u32,
    #[serde(default)]
    pub available: u32,
    #[schema(value_type = String, example = "Available")]
    pub status: MaterialStatus,
    #[serde(default)]
    pub unit_cost: Decimal,
    #[serde(default)]
    pub total_cost: Decimal,
}

impl MaterialRequirement {
    /// Builds a requirement and derives its status and cost.
    pub fn new(name: impl Into<String>, required: u32, available: u32, unit_cost: Decimal) -> Self {
        Self {
            name: name.into(),
            required,
            available,
            status: Self::classify(available, required),
            unit_cost,
            total_cost: unit_cost * Decimal::from(required),
        }
    }

    /// available/required: at least 1 is Available, at least 0.5 is Low.
    pub fn classify(available: u32, required: u32) -> MaterialStatus {
        if required == 0 {
            return MaterialStatus::Available;
        }
        let ratio = f64::from(available) / f64::from(required);
        if ratio >= 1.0 {
            MaterialStatus::Available
        } else if ratio >= 0.5 {
            MaterialStatus::Low
        } else {
            MaterialStatus::Critical
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WorkOrder {
    pub id: i64,
    pub job_id: String,
    pub product: String,
    pub quantity: u32,
    #[schema(value_type = String, example = "High")]
    pub priority: Priority,
    pub customer: String,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub assigned_line: Option<i64>,
    #[serde(default)]
    pub order_id: Option<i64>,
    pub stages: Vec<Stage>,
    #[serde(default)]
    pub materials: Vec<MaterialRequirement>,
    #[schema(value_type = String, example = "Scheduled")]
    pub status: WorkOrderStatus,
    #[schema(value_type = String, example = "Setup")]
    pub current_stage: StageName,
    /// Mean of stage progress, one decimal
    #[serde(default)]
    pub progress: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkOrder {
    pub fn initial_stages() -> Vec<Stage> {
        StageName::PIPELINE.iter().copied().map(Stage::pending).collect()
    }

    pub fn job_id_for(id: i64, year: i32) -> String {
        format!("WO-{}-{:04}", year, id)
    }

    /// Arithmetic mean of stage progress; zero for an order without stages.
    pub fn aggregate_progress(&self) -> f64 {
        if self.stages.is_empty() {
            return 0.0;
        }
        let total: f64 = self.stages.iter().map(|s| s.progress).sum();
        round1(total / self.stages.len() as f64)
    }

    pub fn total_material_cost(&self) -> Decimal {
        self.materials.iter().map(|m| m.total_cost).sum()
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.due_date < today && !self.status.is_terminal()
    }

    /// Applies a progress/status update to one stage and advances the pipeline.
    ///
    /// Completing a stage starts the next one; completing Quality Check also
    /// completes the terminal stage and the work order itself. Stages before
    /// the target must already be complete, and held orders take no updates.
    pub fn apply_stage_update(
        &mut self,
        stage: StageName,
        progress: Option<f64>,
        status: Option<StageStatus>,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        if self.status.is_terminal() {
            return Err(ServiceError::InvalidOperation(format!(
                "work order {} is {}",
                self.job_id, self.status
            )));
        }
        if self.status == WorkOrderStatus::OnHold {
            return Err(ServiceError::InvalidOperation(format!(
                "work order {} is on hold; resume it before updating stages",
                self.job_id
            )));
        }

        let index = self
            .stages
            .iter()
            .position(|s| s.name == stage)
            .ok_or_else(|| ServiceError::not_found("Stage", stage))?;

        if let Some(blocking) = self.stages[..index]
            .iter()
            .find(|s| s.status != StageStatus::Complete)
        {
            return Err(ServiceError::InvalidOperation(format!(
                "stage {} must be completed before {}",
                blocking.name, stage
            )));
        }

        if self.stages[index].status == StageStatus::Complete {
            return Err(ServiceError::InvalidOperation(format!(
                "stage {} is already complete",
                stage
            )));
        }

        let target = match status {
            Some(StageStatus::Complete) => 100.0,
            _ => progress
                .map(|p| p.clamp(0.0, 100.0))
                .unwrap_or(self.stages[index].progress),
        };

        if target >= 100.0 {
            self.stages[index].complete(now);
            self.start_following_stage(index, now);
        } else if target > 0.0 || status == Some(StageStatus::InProgress) {
            let current = &mut self.stages[index];
            current.start(now);
            current.progress = target;
        } else {
            self.stages[index].progress = 0.0;
        }

        if !self.status.is_terminal() {
            self.status = WorkOrderStatus::InProgress;
        }
        self.sync_derived(now);
        Ok(())
    }

    fn start_following_stage(&mut self, completed: usize, now: DateTime<Utc>) {
        let Some(next) = self.stages.get_mut(completed + 1) else {
            self.status = WorkOrderStatus::Complete;
            return;
        };

        if next.name == StageName::Complete {
            next.complete(now);
            self.status = WorkOrderStatus::Complete;
        } else {
            next.start(now);
        }
    }

    /// Recomputes progress and current stage from the stage list.
    pub fn sync_derived(&mut self, now: DateTime<Utc>) {
        self.progress = self.aggregate_progress();
        self.current_stage = self
            .stages
            .iter()
            .find(|s| s.status != StageStatus::Complete)
            .map(|s| s.name)
            .unwrap_or(StageName::Complete);
        self.updated_at = now;
    }

    /// Marks the order Overdue once its due date has passed, and lifts the
    /// flag when the due date moves out again. Returns whether it changed.
    pub fn refresh_status(&mut self, today: NaiveDate) -> bool {
        let before = self.status;
        if self.is_overdue(today) {
            if self.status != WorkOrderStatus::OnHold {
                self.status = WorkOrderStatus::Overdue;
            }
        } else if self.status == WorkOrderStatus::Overdue {
            self.status = self.resumed_status();
        }
        before != self.status
    }

    /// Status to return to after a hold or an overdue flag is lifted.
    pub fn resumed_status(&self) -> WorkOrderStatus {
        if self.stages.iter().any(|s| s.status != StageStatus::Pending) {
            WorkOrderStatus::InProgress
        } else {
            WorkOrderStatus::Scheduled
        }
    }
}

impl Record for WorkOrder {
    const TABLE: &'static str = "work_orders";
    const FIELDS: &'static [&'static str] = &[
        "job_id",
        "product",
        "quantity",
        "priority",
        "customer",
        "due_date",
        "assigned_line",
        "order_id",
        "stages",
        "materials",
        "status",
        "current_stage",
        "progress",
        "created_at",
        "updated_at",
    ];
    const JSON_FIELDS: &'static [&'static str] = &["stages", "materials"];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}
