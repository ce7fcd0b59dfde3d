//! Domain records shared by repositories, services and handlers.
//!
//! Status and priority fields are typed enums. Their wire form is the human
//! label ("In Progress", "Quality Check"); parsing accepts any casing and
//! treats spaces, hyphens and underscores alike, and rejects unknown labels.

/// Lowercases and collapses word separators so "In-Progress", "in progress"
/// and "IN_PROGRESS" compare equal.
pub(crate) fn normalize_label(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Implements label parsing and string (de)serialization for an enum that
/// derives `strum::EnumIter`, `strum::AsRefStr` and `strum::IntoStaticStr`.
macro_rules! impl_labeled {
    ($name:ident) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                self.into()
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::errors::ServiceError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                use strum::IntoEnumIterator;
                let wanted = crate::models::normalize_label(raw);
                $name::iter()
                    .find(|variant| crate::models::normalize_label(variant.as_ref()) == wanted)
                    .ok_or_else(|| {
                        crate::errors::ServiceError::ValidationError(format!(
                            "unknown {} '{}'",
                            stringify!($name),
                            raw
                        ))
                    })
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl TryFrom<String> for $name {
            type Error = crate::errors::ServiceError;

            fn try_from(raw: String) -> Result<Self, Self::Error> {
                raw.parse()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_ref().to_string()
            }
        }
    };
}

pub mod activity;
pub mod alert;
pub mod customer;
pub mod inventory;
pub mod machine;
pub mod order;
pub mod production_line;
pub mod quality_metric;
pub mod work_order;

pub use activity::{Activity, ActivityKind};
pub use alert::{Alert, AlertPriority};
pub use customer::Customer;
pub use inventory::{Batch, FinishedGood, Material, Reservation, StockLevel};
pub use machine::{Machine, MachineStatus};
pub use order::{Order, OrderStatus, QualityInfo, ShippingInfo, TimelineEvent};
pub use production_line::{LineStatus, ProductionLine};
pub use quality_metric::QualityMetric;
pub use work_order::{
    MaterialRequirement, MaterialStatus, Priority, Stage, StageName, StageStatus, WorkOrder,
    WorkOrderStatus,
};

/// Rounds to one decimal place, the precision used for percentages.
pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
