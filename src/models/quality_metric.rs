use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::repositories::Record;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QualityMetric {
    pub id: i64,
    pub line_id: i64,
    /// Defective share of inspected units, in percent
    pub defect_rate: f64,
    #[serde(default)]
    pub inspected_units: u32,
    pub timestamp: DateTime<Utc>,
}

impl Record for QualityMetric {
    const TABLE: &'static str = "quality_metrics";
    const FIELDS: &'static [&'static str] =
        &["line_id", "defect_rate", "inspected_units", "timestamp"];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}
