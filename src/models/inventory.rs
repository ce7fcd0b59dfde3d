use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, IntoStaticStr};
use utoipa::ToSchema;

use crate::repositories::Record;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, IntoStaticStr, EnumIter,
)]
#[serde(try_from = "String", into = "String")]
pub enum StockLevel {
    Adequate,
    Low,
    Critical,
}

impl_labeled!(StockLevel);

impl StockLevel {
    /// Critical at or below half the reorder point, Low at or below it.
    pub fn classify(current: u32, reorder_point: u32) -> Self {
        let current = u64::from(current);
        let reorder_point = u64::from(reorder_point);
        if current * 2 <= reorder_point {
            StockLevel::Critical
        } else if current <= reorder_point {
            StockLevel::Low
        } else {
            StockLevel::Adequate
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Batch {
    pub batch_number: String,
    pub quantity: u32,
    pub received: NaiveDate,
    #[serde(default)]
    pub expiry: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Material {
    pub id: i64,
    pub name: String,
    pub sku: String,
    #[serde(default)]
    pub category: Option<String>,
    pub current_stock: u32,
    pub reorder_point: u32,
    pub unit: String,
    pub unit_cost: Decimal,
    #[serde(default)]
    pub supplier: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub last_restocked: Option<DateTime<Utc>>,
    #[serde(default)]
    pub batches: Vec<Batch>,
}

impl Material {
    pub fn stock_level(&self) -> StockLevel {
        StockLevel::classify(self.current_stock, self.reorder_point)
    }

    pub fn value(&self) -> Decimal {
        self.unit_cost * Decimal::from(self.current_stock)
    }

    /// Case-insensitive substring match in either direction, so "Steel"
    /// finds "Raw Steel Sheet" and "Raw Steel Sheet 2mm" finds "Raw Steel Sheet".
    pub fn matches_name(&self, wanted: &str) -> bool {
        let have = self.name.to_lowercase();
        let wanted = wanted.trim().to_lowercase();
        !wanted.is_empty() && (have.contains(&wanted) || wanted.contains(&have))
    }
}

impl Record for Material {
    const TABLE: &'static str = "materials";
    const FIELDS: &'static [&'static str] = &[
        "name",
        "sku",
        "category",
        "current_stock",
        "reorder_point",
        "unit",
        "unit_cost",
        "supplier",
        "location",
        "last_restocked",
        "batches",
    ];
    const JSON_FIELDS: &'static [&'static str] = &["batches"];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FinishedGood {
    pub id: i64,
    pub name: String,
    pub sku: String,
    pub current_stock: u32,
    pub reorder_point: u32,
    pub unit_price: Decimal,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub batches: Vec<Batch>,
}

impl FinishedGood {
    pub fn stock_level(&self) -> StockLevel {
        StockLevel::classify(self.current_stock, self.reorder_point)
    }

    pub fn value(&self) -> Decimal {
        self.unit_price * Decimal::from(self.current_stock)
    }
}

impl Record for FinishedGood {
    const TABLE: &'static str = "finished_goods";
    const FIELDS: &'static [&'static str] = &[
        "name",
        "sku",
        "current_stock",
        "reorder_point",
        "unit_price",
        "location",
        "batches",
    ];
    const JSON_FIELDS: &'static [&'static str] = &["batches"];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

/// Finished-goods quantity held for a customer order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Reservation {
    pub id: i64,
    pub order_id: i64,
    pub finished_good_id: i64,
    pub quantity: u32,
    pub created_at: DateTime<Utc>,
}

impl Record for Reservation {
    const TABLE: &'static str = "reservations";
    const FIELDS: &'static [&'static str] =
        &["order_id", "finished_good_id", "quantity", "created_at"];

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
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 100, StockLevel::Critical)]
    #[case(50, 100, StockLevel::Critical)]
    #[case(51, 100, StockLevel::Low)]
    #[case(100, 100, StockLevel::Low)]
    #[case(101, 100, StockLevel::Adequate)]
    #[case(0, 0, StockLevel::Critical)]
    #[case(5, 0, StockLevel::Adequate)]
    fn stock_level_thresholds(
        #[case] current: u32,
        #[case] reorder: u32,
        #[case] expected: StockLevel,
    ) {
        assert_eq!(StockLevel::classify(current, reorder), expected);
    }

    fn material(name: &str) -> Material {
        Material {
            id: 1,
            name: name.into(),
            sku: "RM-1".into(),
            category: None,
            current_stock: 10,
            reorder_point: 5,
            unit: "kg".into(),
            unit_cost: Decimal::new(250, 2),
            supplier: None,
            location: None,
            last_restocked: None,
            batches: Vec::new(),
        }
    }

    #[test]
    fn name_matching_works_both_ways() {
        let steel = material("Raw Steel Sheet");
        assert!(steel.matches_name("raw steel"));
        assert!(steel.matches_name("RAW STEEL SHEET 2mm"));
        assert!(!steel.matches_name("Fasteners"));
        assert!(!steel.matches_name("  "));
    }

    #[test]
    fn value_is_stock_times_cost() {
        assert_eq!(material("Bolts").value(), Decimal::new(2500, 2));
    }

    proptest! {
        #[test]
        fn classification_is_monotonic_in_stock(current in 0u32..10_000, reorder in 0u32..10_000) {
            let lower = StockLevel::classify(current, reorder);
            let higher = StockLevel::classify(current.saturating_add(1), reorder);
            let rank = |level: StockLevel| match level {
                StockLevel::Critical => 0,
                StockLevel::Low => 1,
                StockLevel::Adequate => 2,
            };
            prop_assert!(rank(higher) >= rank(lower));
        }
    }
}
