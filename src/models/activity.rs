use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, IntoStaticStr};
use utoipa::ToSchema;

use crate::repositories::Record;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, IntoStaticStr, EnumIter,
)]
#[serde(try_from = "String", into = "String")]
pub enum ActivityKind {
    #[strum(serialize = "Work Order")]
    WorkOrder,
    Order,
    Quality,
    Maintenance,
    Alert,
    Inventory,
    System,
}

impl_labeled!(ActivityKind);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Activity {
    pub id: i64,
    #[serde(rename = "type")]
    #[schema(value_type = String, example = "Work Order")]
    pub kind: ActivityKind,
    pub description: String,
    pub user: String,
    pub timestamp: DateTime<Utc>,
}

impl Record for Activity {
    const TABLE: &'static str = "activities";
    const FIELDS: &'static [&'static str] = &["type", "description", "user", "timestamp"];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}
