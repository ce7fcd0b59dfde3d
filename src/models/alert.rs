use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use strum::{AsRefStr, EnumIter, IntoStaticStr};
use utoipa::ToSchema;

use crate::repositories::Record;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, IntoStaticStr, EnumIter,
)]
#[serde(try_from = "String", into = "String")]
pub enum AlertPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl_labeled!(AlertPriority);

impl AlertPriority {
    /// Lower rank sorts first.
    pub fn rank(self) -> u8 {
        match self {
            AlertPriority::Critical => 0,
            AlertPriority::High => 1,
            AlertPriority::Medium => 2,
            AlertPriority::Low => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Alert {
    pub id: i64,
    #[schema(value_type = String, example = "High")]
    pub priority: AlertPriority,
    pub source: String,
    pub message: String,
    #[serde(default)]
    pub acknowledged: bool,
    #[serde(default)]
    pub acknowledged_by: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    /// Dashboard ordering: open alerts first, then by priority, newest first.
    pub fn display_order(a: &Alert, b: &Alert) -> Ordering {
        a.acknowledged
            .cmp(&b.acknowledged)
            .then_with(|| a.priority.rank().cmp(&b.priority.rank()))
            .then_with(|| b.timestamp.cmp(&a.timestamp))
    }
}

impl Record for Alert {
    const TABLE: &'static str = "alerts";
    const FIELDS: &'static [&'static str] = &[
        "priority",
        "source",
        "message",
        "acknowledged",
        "acknowledged_by",
        "timestamp",
    ];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}
