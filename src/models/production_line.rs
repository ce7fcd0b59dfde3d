use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, IntoStaticStr};
use utoipa::ToSchema;

use super::round1;
use crate::repositories::Record;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, IntoStaticStr, EnumIter,
)]
#[serde(try_from = "String", into = "String")]
pub enum LineStatus {
    Running,
    Idle,
    Maintenance,
    Down,
}

impl_labeled!(LineStatus);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProductionLine {
    pub id: i64,
    pub name: String,
    #[schema(value_type = String, example = "Running")]
    pub status: LineStatus,
    #[serde(default)]
    pub current_job: Option<String>,
    #[serde(default)]
    pub actual_output: u32,
    #[serde(default)]
    pub target_output: u32,
    /// Percentage of target reached, one decimal
    #[serde(default)]
    pub efficiency: f64,
}

impl ProductionLine {
    /// Output over target as a percentage; zero when no target is set.
    pub fn compute_efficiency(actual: u32, target: u32) -> f64 {
        if target == 0 {
            0.0
        } else {
            round1(f64::from(actual) / f64::from(target) * 100.0)
        }
    }

    pub fn refresh_efficiency(&mut self) {
        self.efficiency = Self::compute_efficiency(self.actual_output, self.target_output);
    }
}

impl Record for ProductionLine {
    const TABLE: &'static str = "production_lines";
    const FIELDS: &'static [&'static str] = &[
        "name",
        "status",
        "current_job",
        "actual_output",
        "target_output",
        "efficiency",
    ];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}
