use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{round1, LineStatus, ProductionLine};
use crate::repositories::{require, Repository};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewProductionLine {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[schema(value_type = Option<String>, example = "Idle")]
    pub status: Option<LineStatus>,
    pub current_job: Option<String>,
    #[serde(default)]
    pub actual_output: u32,
    pub target_output: u32,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct ProductionLineUpdate {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[schema(value_type = Option<String>, example = "Running")]
    pub status: Option<LineStatus>,
    pub current_job: Option<String>,
    pub actual_output: Option<u32>,
    pub target_output: Option<u32>,
}

pub struct ProductionLineService {
    repo: Arc<dyn Repository<ProductionLine>>,
    events: EventSender,
    // held across read-modify-write of a line
    write_lock: Mutex<()>,
}

impl ProductionLineService {
    pub fn new(repo: Arc<dyn Repository<ProductionLine>>, events: EventSender) -> Self {
        Self {
            repo,
            events,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn list(&self) -> Result<Vec<ProductionLine>, ServiceError> {
        self.repo.list().await
    }

    pub async fn get(&self, id: i64) -> Result<ProductionLine, ServiceError> {
        require(self.repo.as_ref(), "Production line", id).await
    }

    #[instrument(skip(self))]
    pub async fn create(&self, input: NewProductionLine) -> Result<ProductionLine, ServiceError> {
        input.validate()?;
        let mut line = ProductionLine {
            id: 0,
            name: input.name,
            status: input.status.unwrap_or(LineStatus::Idle),
            current_job: input.current_job,
            actual_output: input.actual_output,
            target_output: input.target_output,
            efficiency: 0.0,
        };
        line.refresh_efficiency();
        let line = self.repo.insert(line).await?;
        info!(line_id = line.id, name = %line.name, "Production line created");
        Ok(line)
    }

    #[instrument(skip(self))]
    pub async fn update(
        &self,
        id: i64,
        input: ProductionLineUpdate,
    ) -> Result<ProductionLine, ServiceError> {
        input.validate()?;
        let _guard = self.write_lock.lock().await;
        let mut line = self.get(id).await?;
        let previous_status = line.status;
        if let Some(name) = input.name {
            line.name = name;
        }
        if let Some(status) = input.status {
            line.status = status;
        }
        if input.current_job.is_some() {
            line.current_job = input.current_job;
        }
        if let Some(actual) = input.actual_output {
            line.actual_output = actual;
        }
        if let Some(target) = input.target_output {
            line.target_output = target;
        }
        line.refresh_efficiency();
        let line = self.repo.update(line).await?;
        self.announce_status(&line, previous_status);
        Ok(line)
    }

    /// Records the line's output so far and recomputes its efficiency.
    #[instrument(skip(self))]
    pub async fn record_output(&self, id: i64, actual: u32) -> Result<ProductionLine, ServiceError> {
        let _guard = self.write_lock.lock().await;
        let mut line = self.get(id).await?;
        line.actual_output = actual;
        line.refresh_efficiency();
        let line = self.repo.update(line).await?;
        info!(line_id = id, actual, efficiency = line.efficiency, "Line output recorded");
        Ok(line)
    }

    #[instrument(skip(self))]
    pub async fn set_status(&self, id: i64, status: LineStatus) -> Result<ProductionLine, ServiceError> {
        let _guard = self.write_lock.lock().await;
        let mut line = self.get(id).await?;
        let previous = line.status;
        line.status = status;
        let line = self.repo.update(line).await?;
        self.announce_status(&line, previous);
        Ok(line)
    }

    /// Puts a job on the line, or clears it with `None`.
    #[instrument(skip(self))]
    pub async fn assign_job(
        &self,
        id: i64,
        job_id: Option<String>,
    ) -> Result<ProductionLine, ServiceError> {
        let _guard = self.write_lock.lock().await;
        let mut line = self.get(id).await?;
        let previous = line.status;
        line.current_job = job_id;
        if line.current_job.is_some() && line.status == LineStatus::Idle {
            line.status = LineStatus::Running;
        }
        let line = self.repo.update(line).await?;
        self.announce_status(&line, previous);
        Ok(line)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        let _guard = self.write_lock.lock().await;
        if self.repo.delete(id).await? {
            info!(line_id = id, "Production line deleted");
            Ok(())
        } else {
            Err(ServiceError::not_found("Production line", id))
        }
    }

    /// Mean efficiency across all lines, one decimal.
    pub fn overall_efficiency(lines: &[ProductionLine]) -> f64 {
        if lines.is_empty() {
            return 0.0;
        }
        round1(lines.iter().map(|l| l.efficiency).sum::<f64>() / lines.len() as f64)
    }

    fn announce_status(&self, line: &ProductionLine, previous: LineStatus) {
        if line.status != previous {
            info!(line_id = line.id, from = %previous, to = %line.status, "Line status changed");
            self.events.emit(Event::LineStatusChanged {
                line_id: line.id,
                name: line.name.clone(),
                status: line.status,
            });
        }
    }
}
