use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{round1, Machine, MachineStatus};
use crate::repositories::{require, Repository};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewMachine {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub line_id: Option<i64>,
    #[schema(value_type = Option<String>, example = "Operational")]
    pub status: Option<MachineStatus>,
    #[validate(range(min = 0.0, max = 100.0))]
    #[serde(default)]
    pub utilization: f64,
    pub next_maintenance: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct MachineUpdate {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub line_id: Option<i64>,
    #[schema(value_type = Option<String>, example = "Idle")]
    pub status: Option<MachineStatus>,
    #[validate(range(min = 0.0, max = 100.0))]
    pub utilization: Option<f64>,
    pub next_maintenance: Option<NaiveDate>,
}

pub struct MachineService {
    repo: Arc<dyn Repository<Machine>>,
    events: EventSender,
    write_lock: Mutex<()>,
}

impl MachineService {
    pub fn new(repo: Arc<dyn Repository<Machine>>, events: EventSender) -> Self {
        Self {
            repo,
            events,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn list(&self) -> Result<Vec<Machine>, ServiceError> {
        self.repo.list().await
    }

    pub async fn get(&self, id: i64) -> Result<Machine, ServiceError> {
        require(self.repo.as_ref(), "Machine", id).await
    }

    #[instrument(skip(self))]
    pub async fn create(&self, input: NewMachine) -> Result<Machine, ServiceError> {
        input.validate()?;
        let machine = self
            .repo
            .insert(Machine {
                id: 0,
                name: input.name,
                line_id: input.line_id,
                status: input.status.unwrap_or(MachineStatus::Idle),
                utilization: input.utilization,
                last_maintenance: Utc::now(),
                next_maintenance: input.next_maintenance,
            })
            .await?;
        info!(machine_id = machine.id, name = %machine.name, "Machine registered");
        Ok(machine)
    }

    #[instrument(skip(self))]
    pub async fn update(&self, id: i64, input: MachineUpdate) -> Result<Machine, ServiceError> {
        input.validate()?;
        let _guard = self.write_lock.lock().await;
        let mut machine = self.get(id).await?;
        if let Some(name) = input.name {
            machine.name = name;
        }
        if input.line_id.is_some() {
            machine.line_id = input.line_id;
        }
        if let Some(status) = input.status {
            machine.status = status;
        }
        if let Some(utilization) = input.utilization {
            machine.utilization = utilization;
        }
        if input.next_maintenance.is_some() {
            machine.next_maintenance = input.next_maintenance;
        }
        self.repo.update(machine).await
    }

    /// Stamps a completed service now and schedules the next one.
    #[instrument(skip(self))]
    pub async fn record_maintenance(
        &self,
        id: i64,
        next: Option<NaiveDate>,
    ) -> Result<Machine, ServiceError> {
        let _guard = self.write_lock.lock().await;
        let mut machine = self.get(id).await?;
        let now = Utc::now();
        if let Some(next) = next {
            if next < now.date_naive() {
                return Err(ServiceError::ValidationError(format!(
                    "next maintenance {} is in the past",
                    next
                )));
            }
        }
        machine.last_maintenance = now;
        machine.next_maintenance = next;
        if machine.status == MachineStatus::Maintenance {
            machine.status = MachineStatus::Operational;
        }
        let machine = self.repo.update(machine).await?;
        info!(machine_id = id, next = ?machine.next_maintenance, "Maintenance recorded");
        self.events.emit(Event::MaintenanceRecorded {
            machine_id: machine.id,
            machine: machine.name.clone(),
        });
        Ok(machine)
    }

    pub async fn maintenance_due(&self, today: NaiveDate) -> Result<Vec<Machine>, ServiceError> {
        Ok(self
            .repo
            .list()
            .await?
            .into_iter()
            .filter(|m| m.is_maintenance_due(today))
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        if self.repo.delete(id).await? {
            info!(machine_id = id, "Machine removed");
            Ok(())
        } else {
            Err(ServiceError::not_found("Machine", id))
        }
    }

    /// Mean utilization, one decimal; zero with no machines.
    pub fn average_utilization(machines: &[Machine]) -> f64 {
        if machines.is_empty() {
            return 0.0;
        }
        round1(machines.iter().map(|m| m.utilization).sum::<f64>() / machines.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::MemoryRepository;
    use chrono::{Duration, TimeZone};

    fn machine(id: i64, utilization: f64, days_since_service: i64) -> Machine {
        Machine {
            id,
            name: format!("Press {}", id),
            line_id: Some(1),
            status: MachineStatus::Operational,
            utilization,
            last_maintenance: Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
                - Duration::days(days_since_service),
            next_maintenance: None,
        }
    }

    #[tokio::test]
    async fn maintenance_due_uses_service_interval() {
        let repo = MemoryRepository::with_records(vec![machine(1, 70.0, 10), machine(2, 50.0, 120)]);
        let service = MachineService::new(Arc::new(repo), EventSender::detached());
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        let due: Vec<i64> = service
            .maintenance_due(today)
            .await
            .unwrap()
            .iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(due, vec![2]);
    }

    #[tokio::test]
    async fn recording_maintenance_clears_due_state() {
        let repo = MemoryRepository::with_records(vec![machine(1, 70.0, 200)]);
        let service = MachineService::new(Arc::new(repo), EventSender::detached());
        let next = Utc::now().date_naive() + Duration::days(30);

        let machine = service.record_maintenance(1, Some(next)).await.unwrap();
        assert_eq!(machine.next_maintenance, Some(next));
        assert!(!machine.is_maintenance_due(Utc::now().date_naive()));
    }

    #[test]
    fn average_utilization_rounds() {
        let machines = vec![machine(1, 70.0, 0), machine(2, 55.5, 0), machine(3, 80.0, 0)];
        assert_eq!(MachineService::average_utilization(&machines), 68.5);
    }
}
