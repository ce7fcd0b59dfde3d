use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, IntoStaticStr};
use utoipa::ToSchema;

use super::Priority;
use crate::repositories::Record;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, IntoStaticStr, EnumIter,
)]
#[serde(try_from = "String", into = "String")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    #[strum(serialize = "In Production")]
    InProduction,
    #[strum(serialize = "Quality Check")]
    QualityCheck,
    #[strum(serialize = "Ready to Ship")]
    ReadyToShip,
    Shipped,
    Delivered,
    Cancelled,
}

impl_labeled!(OrderStatus);

impl OrderStatus {
    /// No transitions leave a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TimelineEvent {
    pub timestamp: DateTime<Utc>,
    #[schema(value_type = String, example = "Confirmed")]
    pub status: OrderStatus,
    pub note: String,
    pub user: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ShippingInfo {
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub shipped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QualityInfo {
    #[serde(default)]
    pub inspector: Option<String>,
    #[serde(default)]
    pub passed: Option<bool>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub inspected_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: i64,
    pub order_number: String,
    pub customer: String,
    #[serde(default)]
    pub customer_id: Option<i64>,
    pub product: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    #[schema(value_type = String, example = "Pending")]
    pub status: OrderStatus,
    #[serde(default)]
    #[schema(value_type = String, example = "Medium")]
    pub priority: Priority,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub work_order_id: Option<i64>,
    #[serde(default)]
    pub timeline: Vec<TimelineEvent>,
    #[serde(default)]
    pub shipping: Option<ShippingInfo>,
    #[serde(default)]
    pub quality: Option<QualityInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn order_number_for(id: i64, year: i32) -> String {
        format!("ORD-{}-{:04}", year, id)
    }

    pub fn line_total(unit_price: Decimal, quantity: u32) -> Decimal {
        unit_price * Decimal::from(quantity)
    }
}

impl Record for Order {
    const TABLE: &'static str = "orders";
    const FIELDS: &'static [&'static str] = &[
        "order_number",
        "customer",
        "customer_id",
        "product",
        "quantity",
        "unit_price",
        "total_price",
        "status",
        "priority",
        "due_date",
        "work_order_id",
        "timeline",
        "shipping",
        "quality",
        "created_at",
        "updated_at",
    ];
    const JSON_FIELDS: &'static [&'static str] = &["timeline", "shipping", "quality"];

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
    use rstest::rstest;

    #[test]
    fn order_number_is_zero_padded() {
        assert_eq!(Order::order_number_for(42, 2024), "ORD-2024-0042");
    }

    #[rstest]
    #[case(OrderStatus::Delivered, true)]
    #[case(OrderStatus::Cancelled, true)]
    #[case(OrderStatus::Shipped, false)]
    #[case(OrderStatus::Pending, false)]
    fn terminal_statuses(#[case] status: OrderStatus, #[case] terminal: bool) {
        assert_eq!(status.is_terminal(), terminal);
    }

    #[test]
    fn ready_to_ship_label_round_trips() {
        assert_eq!(OrderStatus::ReadyToShip.as_str(), "Ready to Ship");
        assert_eq!(
            "ready-to-ship".parse::<OrderStatus>().unwrap(),
            OrderStatus::ReadyToShip
        );
    }
}
