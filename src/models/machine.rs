use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, IntoStaticStr};
use utoipa::ToSchema;

use crate::repositories::Record;

/// Machines with no scheduled date are due once this many days have passed
/// since their last service.
pub const MAINTENANCE_INTERVAL_DAYS: i64 = 90;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, IntoStaticStr, EnumIter,
)]
#[serde(try_from = "String", into = "String")]
pub enum MachineStatus {
    Operational,
    Idle,
    Maintenance,
    Offline,
}

impl_labeled!(MachineStatus);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Machine {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub line_id: Option<i64>,
    #[schema(value_type = String, example = "Operational")]
    pub status: MachineStatus,
    /// Utilization percentage, 0-100
    #[serde(default)]
    pub utilization: f64,
    pub last_maintenance: DateTime<Utc>,
    #[serde(default)]
    pub next_maintenance: Option<NaiveDate>,
}

impl Machine {
    pub fn is_maintenance_due(&self, today: NaiveDate) -> bool {
        match self.next_maintenance {
            Some(next) => next <= today,
            None => {
                (today - self.last_maintenance.date_naive()).num_days()
                    > MAINTENANCE_INTERVAL_DAYS
            }
        }
    }
}

impl Record for Machine {
    const TABLE: &'static str = "machines";
    const FIELDS: &'static [&'static str] = &[
        "name",
        "line_id",
        "status",
        "utilization",
        "last_maintenance",
        "next_maintenance",
    ];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn machine(last: DateTime<Utc>, next: Option<NaiveDate>) -> Machine {
        Machine {
            id: 1,
            name: "CNC-01".into(),
            line_id: Some(1),
            status: MachineStatus::Operational,
            utilization: 80.0,
            last_maintenance: last,
            next_maintenance: next,
        }
    }

    #[test]
    fn scheduled_date_decides_when_present() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let last = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        assert!(!machine(last, Some(today + Duration::days(1))).is_maintenance_due(today));
        assert!(machine(last, Some(today)).is_maintenance_due(today));
    }

    #[test]
    fn falls_back_to_service_interval() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let recent = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let stale = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        assert!(!machine(recent, None).is_maintenance_due(today));
        assert!(machine(stale, None).is_maintenance_due(today));
    }
}
