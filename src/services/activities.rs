use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::ServiceError;
use crate::events::ActivityEntry;
use crate::models::{Activity, ActivityKind};
use crate::repositories::{require, Repository};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewActivity {
    #[serde(rename = "type")]
    #[schema(value_type = String, example = "Maintenance")]
    pub kind: ActivityKind,
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    #[validate(length(min = 1, max = 100))]
    pub user: String,
}

/// The activity feed.
pub struct ActivityService {
    repo: Arc<dyn Repository<Activity>>,
}

impl ActivityService {
    pub fn new(repo: Arc<dyn Repository<Activity>>) -> Self {
        Self { repo }
    }

    /// All activities, newest first.
    pub async fn list(&self) -> Result<Vec<Activity>, ServiceError> {
        let mut activities = self.repo.list().await?;
        activities.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(activities)
    }

    pub async fn recent(&self, limit: usize) -> Result<Vec<Activity>, ServiceError> {
        let mut activities = self.list().await?;
        activities.truncate(limit);
        Ok(activities)
    }

    pub async fn get(&self, id: i64) -> Result<Activity, ServiceError> {
        require(self.repo.as_ref(), "Activity", id).await
    }

    #[instrument(skip(self))]
    pub async fn create(&self, input: NewActivity) -> Result<Activity, ServiceError> {
        self.repo
            .insert(Activity {
                id: 0,
                kind: input.kind,
                description: input.description,
                user: input.user,
                timestamp: Utc::now(),
            })
            .await
    }

    /// Stores an entry produced by the event processor.
    pub async fn record(&self, entry: ActivityEntry) -> Result<Activity, ServiceError> {
        let activity = self
            .repo
            .insert(Activity {
                id: 0,
                kind: entry.kind,
                description: entry.description,
                user: entry.user,
                timestamp: entry.timestamp,
            })
            .await?;
        debug!(activity_id = activity.id, kind = %activity.kind, "activity recorded");
        Ok(activity)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        if self.repo.delete(id).await? {
            Ok(())
        } else {
            Err(ServiceError::not_found("Activity", id))
        }
    }
}
