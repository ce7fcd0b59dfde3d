use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{Alert, AlertPriority};
use crate::repositories::{require, Repository};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewAlert {
    #[schema(value_type = String, example = "High")]
    pub priority: AlertPriority,
    #[validate(length(min = 1, max = 100))]
    pub source: String,
    #[validate(length(min = 1, max = 500))]
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct AlertUpdate {
    #[schema(value_type = Option<String>, example = "Medium")]
    pub priority: Option<AlertPriority>,
    #[validate(length(min = 1, max = 100))]
    pub source: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub message: Option<String>,
}

pub struct AlertService {
    repo: Arc<dyn Repository<Alert>>,
    events: EventSender,
    // held across read-modify-write of an alert
    write_lock: Mutex<()>,
}

impl AlertService {
    pub fn new(repo: Arc<dyn Repository<Alert>>, events: EventSender) -> Self {
        Self {
            repo,
            events,
            write_lock: Mutex::new(()),
        }
    }

    /// Alerts in dashboard order: open first, then by priority, newest first.
    pub async fn list(&self) -> Result<Vec<Alert>, ServiceError> {
        let mut alerts = self.repo.list().await?;
        alerts.sort_by(Alert::display_order);
        Ok(alerts)
    }

    pub async fn get(&self, id: i64) -> Result<Alert, ServiceError> {
        require(self.repo.as_ref(), "Alert", id).await
    }

    #[instrument(skip(self))]
    pub async fn create(&self, input: NewAlert) -> Result<Alert, ServiceError> {
        input.validate()?;
        let alert = self
            .repo
            .insert(Alert {
                id: 0,
                priority: input.priority,
                source: input.source,
                message: input.message,
                acknowledged: false,
                acknowledged_by: None,
                timestamp: Utc::now(),
            })
            .await?;
        info!(alert_id = alert.id, priority = %alert.priority, source = %alert.source, "Alert raised");
        self.events.emit(Event::AlertRaised {
            id: alert.id,
            priority: alert.priority,
            source: alert.source.clone(),
            message: alert.message.clone(),
        });
        Ok(alert)
    }

    #[instrument(skip(self))]
    pub async fn update(&self, id: i64, input: AlertUpdate) -> Result<Alert, ServiceError> {
        input.validate()?;
        let _guard = self.write_lock.lock().await;
        let mut alert = self.get(id).await?;
        if let Some(priority) = input.priority {
            alert.priority = priority;
        }
        if let Some(source) = input.source {
            alert.source = source;
        }
        if let Some(message) = input.message {
            alert.message = message;
        }
        self.repo.update(alert).await
    }

    /// Marks an alert acknowledged. Acknowledging twice is a no-op that keeps
    /// the first acknowledger.
    #[instrument(skip(self))]
    pub async fn acknowledge(&self, id: i64, user: &str) -> Result<Alert, ServiceError> {
        let _guard = self.write_lock.lock().await;
        let mut alert = self.get(id).await?;
        if alert.acknowledged {
            return Ok(alert);
        }
        alert.acknowledged = true;
        alert.acknowledged_by = Some(user.to_string());
        let alert = self.repo.update(alert).await?;
        info!(alert_id = id, user, "Alert acknowledged");
        self.events.emit(Event::AlertAcknowledged {
            id,
            user: user.to_string(),
        });
        Ok(alert)
    }

    pub async fn unacknowledged_count(&self) -> Result<usize, ServiceError> {
        Ok(self
            .repo
            .list()
            .await?
            .iter()
            .filter(|a| !a.acknowledged)
            .count())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        if self.repo.delete(id).await? {
            Ok(())
        } else {
            Err(ServiceError::not_found("Alert", id))
        }
    }
}
