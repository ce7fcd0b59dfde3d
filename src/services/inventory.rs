use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{Batch, FinishedGood, Material, Order, Reservation, StockLevel};
use crate::repositories::{require, Repository};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewMaterial {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 64))]
    pub sku: String,
    pub category: Option<String>,
    #[serde(default)]
    pub current_stock: u32,
    pub reorder_point: u32,
    #[validate(length(min = 1, max = 20))]
    pub unit: String,
    pub unit_cost: Decimal,
    pub supplier: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct MaterialUpdate {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub category: Option<String>,
    pub reorder_point: Option<u32>,
    #[validate(length(min = 1, max = 20))]
    pub unit: Option<String>,
    pub unit_cost: Option<Decimal>,
    pub supplier: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewFinishedGood {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 64))]
    pub sku: String,
    #[serde(default)]
    pub current_stock: u32,
    pub reorder_point: u32,
    pub unit_price: Decimal,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct FinishedGoodUpdate {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub reorder_point: Option<u32>,
    pub unit_price: Option<Decimal>,
    pub location: Option<String>,
}

/// Signed change to an item's stock.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct StockAdjustment {
    pub delta: i64,
    #[validate(length(max = 200))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewBatch {
    #[validate(length(min = 1, max = 64))]
    pub batch_number: String,
    #[validate(range(min = 1))]
    pub quantity: u32,
    /// Defaults to today
    pub received: Option<NaiveDate>,
    pub expiry: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewReservation {
    pub order_id: i64,
    pub finished_good_id: i64,
    #[validate(range(min = 1))]
    pub quantity: u32,
}

/// One inventory item with its derived stock level.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StockItem {
    pub id: i64,
    pub name: String,
    pub sku: String,
    pub current_stock: u32,
    pub reorder_point: u32,
    #[schema(value_type = String, example = "Low")]
    pub level: StockLevel,
}

impl From<&Material> for StockItem {
    fn from(m: &Material) -> Self {
        Self {
            id: m.id,
            name: m.name.clone(),
            sku: m.sku.clone(),
            current_stock: m.current_stock,
            reorder_point: m.reorder_point,
            level: m.stock_level(),
        }
    }
}

impl From<&FinishedGood> for StockItem {
    fn from(g: &FinishedGood) -> Self {
        Self {
            id: g.id,
            name: g.name.clone(),
            sku: g.sku.clone(),
            current_stock: g.current_stock,
            reorder_point: g.reorder_point,
            level: g.stock_level(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LowStockReport {
    pub materials: Vec<StockItem>,
    pub finished_goods: Vec<StockItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct InventoryValuation {
    pub materials: Decimal,
    pub finished_goods: Decimal,
    pub total: Decimal,
}

fn apply_delta(current: u32, delta: i64, sku: &str) -> Result<u32, ServiceError> {
    let next = i64::from(current)
        .checked_add(delta)
        .ok_or_else(|| ServiceError::ValidationError(format!("stock for {} would overflow", sku)))?;
    if next < 0 {
        return Err(ServiceError::InsufficientStock(format!(
            "cannot remove {} from {}: only {} in stock",
            delta.unsigned_abs(),
            sku,
            current
        )));
    }
    u32::try_from(next)
        .map_err(|_| ServiceError::ValidationError(format!("stock for {} would overflow", sku)))
}

/// Raw materials, finished goods and the finished-goods reservation ledger.
pub struct InventoryService {
    materials: Arc<dyn Repository<Material>>,
    finished_goods: Arc<dyn Repository<FinishedGood>>,
    reservations: Arc<dyn Repository<Reservation>>,
    orders: Arc<dyn Repository<Order>>,
    events: EventSender,
    // held across every check-then-write on finished-goods stock
    ledger_lock: Mutex<()>,
    // held across every read-modify-write of a material
    material_lock: Mutex<()>,
}

impl InventoryService {
    pub fn new(
        materials: Arc<dyn Repository<Material>>,
        finished_goods: Arc<dyn Repository<FinishedGood>>,
        reservations: Arc<dyn Repository<Reservation>>,
        orders: Arc<dyn Repository<Order>>,
        events: EventSender,
    ) -> Self {
        Self {
            materials,
            finished_goods,
            reservations,
            orders,
            events,
            ledger_lock: Mutex::new(()),
            material_lock: Mutex::new(()),
        }
    }

    // ---- materials ----

    pub async fn list_materials(&self) -> Result<Vec<Material>, ServiceError> {
        self.materials.list().await
    }

    pub async fn get_material(&self, id: i64) -> Result<Material, ServiceError> {
        require(self.materials.as_ref(), "Material", id).await
    }

    #[instrument(skip(self))]
    pub async fn create_material(&self, input: NewMaterial) -> Result<Material, ServiceError> {
        input.validate()?;
        let _guard = self.material_lock.lock().await;
        if self
            .materials
            .list()
            .await?
            .iter()
            .any(|m| m.sku.eq_ignore_ascii_case(&input.sku))
        {
            return Err(ServiceError::Conflict(format!(
                "material SKU {} already exists",
                input.sku
            )));
        }
        let material = self
            .materials
            .insert(Material {
                id: 0,
                name: input.name,
                sku: input.sku,
                category: input.category,
                current_stock: input.current_stock,
                reorder_point: input.reorder_point,
                unit: input.unit,
                unit_cost: input.unit_cost,
                supplier: input.supplier,
                location: input.location,
                last_restocked: None,
                batches: Vec::new(),
            })
            .await?;
        info!(material_id = material.id, sku = %material.sku, "Material created");
        Ok(material)
    }

    #[instrument(skip(self))]
    pub async fn update_material(
        &self,
        id: i64,
        input: MaterialUpdate,
    ) -> Result<Material, ServiceError> {
        input.validate()?;
        let _guard = self.material_lock.lock().await;
        let mut material = self.get_material(id).await?;
        if let Some(name) = input.name {
            material.name = name;
        }
        if input.category.is_some() {
            material.category = input.category;
        }
        if let Some(reorder) = input.reorder_point {
            material.reorder_point = reorder;
        }
        if let Some(unit) = input.unit {
            material.unit = unit;
        }
        if let Some(cost) = input.unit_cost {
            material.unit_cost = cost;
        }
        if input.supplier.is_some() {
            material.supplier = input.supplier;
        }
        if input.location.is_some() {
            material.location = input.location;
        }
        self.materials.update(material).await
    }

    #[instrument(skip(self))]
    pub async fn delete_material(&self, id: i64) -> Result<(), ServiceError> {
        let _guard = self.material_lock.lock().await;
        if self.materials.delete(id).await? {
            info!(material_id = id, "Material deleted");
            Ok(())
        } else {
            Err(ServiceError::not_found("Material", id))
        }
    }

    /// Applies a signed stock change; restocks stamp `last_restocked`.
    #[instrument(skip(self))]
    pub async fn adjust_material(
        &self,
        id: i64,
        adjustment: StockAdjustment,
    ) -> Result<Material, ServiceError> {
        adjustment.validate()?;
        let _guard = self.material_lock.lock().await;
        let mut material = self.get_material(id).await?;
        let previous = material.current_stock;
        material.current_stock = apply_delta(previous, adjustment.delta, &material.sku)?;
        if adjustment.delta > 0 {
            material.last_restocked = Some(Utc::now());
        }
        let material = self.materials.update(material).await?;
        info!(
            material_id = id,
            previous,
            current = material.current_stock,
            reason = adjustment.reason.as_deref().unwrap_or(""),
            "Material stock adjusted"
        );
        self.emit_adjusted(&material.sku, &material.name, previous, material.current_stock);
        Ok(material)
    }

    #[instrument(skip(self))]
    pub async fn add_material_batch(&self, id: i64, input: NewBatch) -> Result<Material, ServiceError> {
        input.validate()?;
        let _guard = self.material_lock.lock().await;
        let mut material = self.get_material(id).await?;
        let previous = material.current_stock;
        material.current_stock = apply_delta(previous, i64::from(input.quantity), &material.sku)?;
        material.last_restocked = Some(Utc::now());
        material.batches.push(Self::batch(input));
        let material = self.materials.update(material).await?;
        self.emit_adjusted(&material.sku, &material.name, previous, material.current_stock);
        Ok(material)
    }

    /// First material whose name matches, case-insensitively, in either direction.
    pub async fn find_material(&self, name: &str) -> Result<Option<Material>, ServiceError> {
        Ok(self
            .materials
            .list()
            .await?
            .into_iter()
            .find(|m| m.matches_name(name)))
    }

    // ---- finished goods ----

    pub async fn list_finished_goods(&self) -> Result<Vec<FinishedGood>, ServiceError> {
        self.finished_goods.list().await
    }

    pub async fn get_finished_good(&self, id: i64) -> Result<FinishedGood, ServiceError> {
        require(self.finished_goods.as_ref(), "Finished good", id).await
    }

    #[instrument(skip(self))]
    pub async fn create_finished_good(
        &self,
        input: NewFinishedGood,
    ) -> Result<FinishedGood, ServiceError> {
        input.validate()?;
        let _ledger = self.ledger_lock.lock().await;
        if self
            .finished_goods
            .list()
            .await?
            .iter()
            .any(|g| g.sku.eq_ignore_ascii_case(&input.sku))
        {
            return Err(ServiceError::Conflict(format!(
                "finished good SKU {} already exists",
                input.sku
            )));
        }
        let good = self
            .finished_goods
            .insert(FinishedGood {
                id: 0,
                name: input.name,
                sku: input.sku,
                current_stock: input.current_stock,
                reorder_point: input.reorder_point,
                unit_price: input.unit_price,
                location: input.location,
                batches: Vec::new(),
            })
            .await?;
        info!(finished_good_id = good.id, sku = %good.sku, "Finished good created");
        Ok(good)
    }

    #[instrument(skip(self))]
    pub async fn update_finished_good(
        &self,
        id: i64,
        input: FinishedGoodUpdate,
    ) -> Result<FinishedGood, ServiceError> {
        input.validate()?;
        let _ledger = self.ledger_lock.lock().await;
        let mut good = self.get_finished_good(id).await?;
        if let Some(name) = input.name {
            good.name = name;
        }
        if let Some(reorder) = input.reorder_point {
            good.reorder_point = reorder;
        }
        if let Some(price) = input.unit_price {
            good.unit_price = price;
        }
        if input.location.is_some() {
            good.location = input.location;
        }
        self.finished_goods.update(good).await
    }

    #[instrument(skip(self))]
    pub async fn delete_finished_good(&self, id: i64) -> Result<(), ServiceError> {
        let _ledger = self.ledger_lock.lock().await;
        if self.reserved_quantity(id).await? > 0 {
            return Err(ServiceError::Conflict(format!(
                "finished good {} has open reservations",
                id
            )));
        }
        if self.finished_goods.delete(id).await? {
            info!(finished_good_id = id, "Finished good deleted");
            Ok(())
        } else {
            Err(ServiceError::not_found("Finished good", id))
        }
    }

    /// Applies a signed stock change; stock may not fall below what is reserved.
    #[instrument(skip(self))]
    pub async fn adjust_finished_good(
        &self,
        id: i64,
        adjustment: StockAdjustment,
    ) -> Result<FinishedGood, ServiceError> {
        adjustment.validate()?;
        let _ledger = self.ledger_lock.lock().await;
        let mut good = self.get_finished_good(id).await?;
        let previous = good.current_stock;
        let next = apply_delta(previous, adjustment.delta, &good.sku)?;
        let reserved = self.reserved_quantity(id).await?;
        if next < reserved {
            return Err(ServiceError::InsufficientStock(format!(
                "cannot reduce {} to {}: {} reserved",
                good.sku, next, reserved
            )));
        }
        good.current_stock = next;
        let good = self.finished_goods.update(good).await?;
        info!(
            finished_good_id = id,
            previous,
            current = good.current_stock,
            reason = adjustment.reason.as_deref().unwrap_or(""),
            "Finished good stock adjusted"
        );
        self.emit_adjusted(&good.sku, &good.name, previous, good.current_stock);
        Ok(good)
    }

    #[instrument(skip(self))]
    pub async fn add_finished_good_batch(
        &self,
        id: i64,
        input: NewBatch,
    ) -> Result<FinishedGood, ServiceError> {
        input.validate()?;
        let _ledger = self.ledger_lock.lock().await;
        let mut good = self.get_finished_good(id).await?;
        let previous = good.current_stock;
        good.current_stock = apply_delta(previous, i64::from(input.quantity), &good.sku)?;
        good.batches.push(Self::batch(input));
        let good = self.finished_goods.update(good).await?;
        self.emit_adjusted(&good.sku, &good.name, previous, good.current_stock);
        Ok(good)
    }

    // ---- reporting ----

    /// Items at Low or Critical level.
    pub async fn low_stock(&self) -> Result<LowStockReport, ServiceError> {
        let (materials, goods) =
            tokio::try_join!(self.materials.list(), self.finished_goods.list())?;
        Ok(LowStockReport {
            materials: materials
                .iter()
                .map(StockItem::from)
                .filter(|i| i.level != StockLevel::Adequate)
                .collect(),
            finished_goods: goods
                .iter()
                .map(StockItem::from)
                .filter(|i| i.level != StockLevel::Adequate)
                .collect(),
        })
    }

    pub async fn valuation(&self) -> Result<InventoryValuation, ServiceError> {
        let (materials, goods) =
            tokio::try_join!(self.materials.list(), self.finished_goods.list())?;
        let materials: Decimal = materials.iter().map(Material::value).sum();
        let finished_goods: Decimal = goods.iter().map(FinishedGood::value).sum();
        Ok(InventoryValuation {
            materials,
            finished_goods,
            total: materials + finished_goods,
        })
    }

    pub async fn export_materials_csv(&self) -> Result<String, ServiceError> {
        let materials = self.materials.list().await?;
        let mut writer = csv::Writer::from_writer(vec![]);
        writer.write_record([
            "id",
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
            "stock_level",
        ])?;
        for m in &materials {
            writer.write_record([
                m.id.to_string(),
                m.name.clone(),
                m.sku.clone(),
                m.category.clone().unwrap_or_default(),
                m.current_stock.to_string(),
                m.reorder_point.to_string(),
                m.unit.clone(),
                m.unit_cost.to_string(),
                m.supplier.clone().unwrap_or_default(),
                m.location.clone().unwrap_or_default(),
                m.last_restocked.map(|t| t.to_rfc3339()).unwrap_or_default(),
                m.stock_level().to_string(),
            ])?;
        }
        Self::finish_csv(writer)
    }

    pub async fn export_finished_goods_csv(&self) -> Result<String, ServiceError> {
        let goods = self.finished_goods.list().await?;
        let mut writer = csv::Writer::from_writer(vec![]);
        writer.write_record([
            "id",
            "name",
            "sku",
            "current_stock",
            "reorder_point",
            "unit_price",
            "location",
            "stock_level",
        ])?;
        for g in &goods {
            writer.write_record([
                g.id.to_string(),
                g.name.clone(),
                g.sku.clone(),
                g.current_stock.to_string(),
                g.reorder_point.to_string(),
                g.unit_price.to_string(),
                g.location.clone().unwrap_or_default(),
                g.stock_level().to_string(),
            ])?;
        }
        Self::finish_csv(writer)
    }

    fn finish_csv(writer: csv::Writer<Vec<u8>>) -> Result<String, ServiceError> {
        let bytes = writer
            .into_inner()
            .map_err(|e| ServiceError::InternalError(format!("CSV flush failed: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| ServiceError::InternalError(format!("CSV is not UTF-8: {}", e)))
    }

    // ---- reservations ----

    pub async fn reservations(&self, order_id: Option<i64>) -> Result<Vec<Reservation>, ServiceError> {
        Ok(self
            .reservations
            .list()
            .await?
            .into_iter()
            .filter(|r| order_id.map_or(true, |order| r.order_id == order))
            .collect())
    }

    async fn reserved_quantity(&self, finished_good_id: i64) -> Result<u32, ServiceError> {
        Ok(self
            .reservations
            .list()
            .await?
            .iter()
            .filter(|r| r.finished_good_id == finished_good_id)
            .map(|r| r.quantity)
            .sum())
    }

    /// Holds finished-goods stock for an open order. Fails with
    /// InsufficientStock when the quantity exceeds stock not already reserved.
    #[instrument(skip(self))]
    pub async fn reserve(&self, input: NewReservation) -> Result<Reservation, ServiceError> {
        input.validate()?;
        let order = self.orders.get(input.order_id).await?.ok_or_else(|| {
            ServiceError::ValidationError(format!("order {} does not exist", input.order_id))
        })?;
        if order.status.is_terminal() {
            return Err(ServiceError::InvalidOperation(format!(
                "order {} is {}; stock can no longer be reserved for it",
                order.order_number, order.status
            )));
        }
        let _ledger = self.ledger_lock.lock().await;
        let good = self.get_finished_good(input.finished_good_id).await?;
        let reserved = self.reserved_quantity(good.id).await?;
        let available = good.current_stock.saturating_sub(reserved);
        if input.quantity > available {
            warn!(
                finished_good_id = good.id,
                requested = input.quantity,
                available,
                "Reservation rejected"
            );
            return Err(ServiceError::InsufficientStock(format!(
                "requested {} x {} but only {} available",
                input.quantity, good.sku, available
            )));
        }

        let reservation = self
            .reservations
            .insert(Reservation {
                id: 0,
                order_id: input.order_id,
                finished_good_id: good.id,
                quantity: input.quantity,
                created_at: Utc::now(),
            })
            .await?;
        info!(reservation_id = reservation.id, order_id = input.order_id, sku = %good.sku, quantity = input.quantity, "Stock reserved");
        self.events.emit(Event::StockReserved {
            order_id: input.order_id,
            sku: good.sku,
            quantity: input.quantity,
        });
        Ok(reservation)
    }

    #[instrument(skip(self))]
    pub async fn release(&self, reservation_id: i64) -> Result<(), ServiceError> {
        let _ledger = self.ledger_lock.lock().await;
        if self.reservations.delete(reservation_id).await? {
            info!(reservation_id, "Reservation released");
            Ok(())
        } else {
            Err(ServiceError::not_found("Reservation", reservation_id))
        }
    }

    /// Ships a reservation: removes it and deducts its quantity from stock.
    #[instrument(skip(self))]
    pub async fn fulfill(&self, reservation_id: i64) -> Result<FinishedGood, ServiceError> {
        let _ledger = self.ledger_lock.lock().await;
        let reservation = require(self.reservations.as_ref(), "Reservation", reservation_id).await?;
        let mut good = self.get_finished_good(reservation.finished_good_id).await?;
        let previous = good.current_stock;
        good.current_stock =
            apply_delta(previous, -i64::from(reservation.quantity), &good.sku)?;
        let good = self.finished_goods.update(good).await?;
        if let Err(e) = self.reservations.delete(reservation_id).await {
            // the hold still stands; undo the deduction
            let mut restored = good;
            restored.current_stock = previous;
            if let Err(restore) = self.finished_goods.update(restored).await {
                error!(reservation_id, error = %restore, "Failed to restore stock after fulfilment error");
            }
            return Err(e);
        }
        info!(reservation_id, order_id = reservation.order_id, "Reservation fulfilled");
        self.emit_adjusted(&good.sku, &good.name, previous, good.current_stock);
        Ok(good)
    }

    fn batch(input: NewBatch) -> Batch {
        Batch {
            batch_number: input.batch_number,
            quantity: input.quantity,
            received: input.received.unwrap_or_else(|| Utc::now().date_naive()),
            expiry: input.expiry,
        }
    }

    fn emit_adjusted(&self, sku: &str, name: &str, previous: u32, current: u32) {
        self.events.emit(Event::StockAdjusted {
            sku: sku.to_string(),
            name: name.to_string(),
            previous,
            current,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::Fixtures;
    use crate::models::OrderStatus;
    use crate::repositories::MemoryRepository;
    use assert_matches::assert_matches;
    use async_trait::async_trait;

    fn material(id: i64, name: &str, stock: u32, reorder: u32) -> Material {
        Material {
            id,
            name: name.into(),
            sku: format!("RM-{:03}", id),
            category: Some("Metals".into()),
            current_stock: stock,
            reorder_point: reorder,
            unit: "kg".into(),
            unit_cost: Decimal::new(400, 2),
            supplier: Some("Harbor Steel".into()),
            location: Some("A-1".into()),
            last_restocked: None,
            batches: Vec::new(),
        }
    }

    fn good(id: i64, stock: u32) -> FinishedGood {
        FinishedGood {
            id,
            name: "Gear Housing".into(),
            sku: format!("FG-{:03}", id),
            current_stock: stock,
            reorder_point: 10,
            unit_price: Decimal::new(4500, 2),
            location: None,
            batches: Vec::new(),
        }
    }

    fn service(materials: Vec<Material>, goods: Vec<FinishedGood>) -> InventoryService {
        with_ledger(materials, goods, Arc::new(MemoryRepository::new()))
    }

    /// Orders 1 and 2 are open, order 3 is cancelled.
    fn with_ledger(
        materials: Vec<Material>,
        goods: Vec<FinishedGood>,
        reservations: Arc<dyn Repository<Reservation>>,
    ) -> InventoryService {
        let mut orders = Fixtures::new(Utc::now()).orders();
        orders[2].status = OrderStatus::Cancelled;
        InventoryService::new(
            Arc::new(MemoryRepository::with_records(materials)),
            Arc::new(MemoryRepository::with_records(goods)),
            reservations,
            Arc::new(MemoryRepository::with_records(orders)),
            EventSender::detached(),
        )
    }

    /// Reservation ledger whose deletes fail.
    struct StuckLedger(MemoryRepository<Reservation>);

    #[async_trait]
    impl Repository<Reservation> for StuckLedger {
        async fn list(&self) -> Result<Vec<Reservation>, ServiceError> {
            self.0.list().await
        }

        async fn get(&self, id: i64) -> Result<Option<Reservation>, ServiceError> {
            self.0.get(id).await
        }

        async fn insert(&self, record: Reservation) -> Result<Reservation, ServiceError> {
            self.0.insert(record).await
        }

        async fn update(&self, record: Reservation) -> Result<Reservation, ServiceError> {
            self.0.update(record).await
        }

        async fn delete(&self, _id: i64) -> Result<bool, ServiceError> {
            Err(ServiceError::ExternalServiceError("write timed out".into()))
        }
    }

    fn reservation(quantity: u32) -> NewReservation {
        NewReservation {
            order_id: 1,
            finished_good_id: 1,
            quantity,
        }
    }

    #[tokio::test]
    async fn adjustment_below_zero_is_rejected() {
        let service = service(vec![material(1, "Raw Steel", 5, 10)], vec![]);
        let err = service
            .adjust_material(1, StockAdjustment { delta: -6, reason: None })
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::InsufficientStock(_));
        assert_eq!(service.get_material(1).await.unwrap().current_stock, 5);
    }

    #[tokio::test]
    async fn restock_stamps_last_restocked() {
        let service = service(vec![material(1, "Raw Steel", 5, 10)], vec![]);
        let m = service
            .adjust_material(1, StockAdjustment { delta: 20, reason: Some("PO-88".into()) })
            .await
            .unwrap();
        assert_eq!(m.current_stock, 25);
        assert!(m.last_restocked.is_some());
    }

    #[tokio::test]
    async fn reservations_never_exceed_unreserved_stock() {
        let service = service(vec![], vec![good(1, 10)]);
        service.reserve(reservation(6)).await.unwrap();
        assert_matches!(
            service.reserve(reservation(5)).await,
            Err(ServiceError::InsufficientStock(_))
        );
        service.reserve(reservation(4)).await.unwrap();
        assert_eq!(service.reservations(Some(1)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_reservations_respect_the_ledger() {
        let service = Arc::new(service(vec![], vec![good(1, 10)]));
        let attempts = (0..8).map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.reserve(reservation(3)).await })
        });
        let results = futures::future::join_all(attempts).await;
        let granted = results
            .into_iter()
            .filter(|r| matches!(r, Ok(Ok(_))))
            .count();
        assert_eq!(granted, 3);
    }

    #[tokio::test]
    async fn reservations_need_an_open_order() {
        let service = service(vec![], vec![good(1, 10)]);
        let unknown = NewReservation {
            order_id: 99,
            ..reservation(1)
        };
        assert_matches!(
            service.reserve(unknown).await,
            Err(ServiceError::ValidationError(_))
        );
        let cancelled = NewReservation {
            order_id: 3,
            ..reservation(1)
        };
        assert_matches!(
            service.reserve(cancelled).await,
            Err(ServiceError::InvalidOperation(_))
        );
        assert!(service.reservations(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stock_cannot_drop_below_reserved() {
        let service = service(vec![], vec![good(1, 10)]);
        let held = service.reserve(reservation(8)).await.unwrap();

        assert_matches!(
            service
                .adjust_finished_good(1, StockAdjustment { delta: -7, reason: None })
                .await,
            Err(ServiceError::InsufficientStock(_))
        );
        let good = service
            .adjust_finished_good(1, StockAdjustment { delta: -2, reason: None })
            .await
            .unwrap();
        assert_eq!(good.current_stock, 8);

        let good = service.fulfill(held.id).await.unwrap();
        assert_eq!(good.current_stock, 0);
    }

    #[tokio::test]
    async fn failed_fulfilment_puts_stock_back() {
        let ledger = Arc::new(StuckLedger(MemoryRepository::new()));
        let service = with_ledger(vec![], vec![good(1, 10)], ledger);
        let held = service.reserve(reservation(4)).await.unwrap();

        assert_matches!(
            service.fulfill(held.id).await,
            Err(ServiceError::ExternalServiceError(_))
        );
        assert_eq!(service.get_finished_good(1).await.unwrap().current_stock, 10);
        assert_eq!(service.reservations(None).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_material_adjustments_are_not_lost() {
        let service = Arc::new(service(vec![material(1, "Raw Steel", 0, 10)], vec![]));
        let tasks: Vec<_> = (0..200)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .adjust_material(1, StockAdjustment { delta: 1, reason: None })
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(service.get_material(1).await.unwrap().current_stock, 200);
    }

    #[tokio::test]
    async fn fulfill_deducts_stock_and_clears_reservation() {
        let service = service(vec![], vec![good(1, 10)]);
        let held = service.reserve(reservation(4)).await.unwrap();

        let good = service.fulfill(held.id).await.unwrap();
        assert_eq!(good.current_stock, 6);
        assert!(service.reservations(None).await.unwrap().is_empty());
        assert_matches!(service.release(held.id).await, Err(ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn low_stock_lists_non_adequate_items() {
        let service = service(
            vec![
                material(1, "Raw Steel", 100, 50),
                material(2, "Fasteners", 40, 50),
                material(3, "Packaging", 10, 50),
            ],
            vec![good(1, 50)],
        );
        let report = service.low_stock().await.unwrap();
        let levels: Vec<(i64, StockLevel)> =
            report.materials.iter().map(|i| (i.id, i.level)).collect();
        assert_eq!(levels, vec![(2, StockLevel::Low), (3, StockLevel::Critical)]);
        assert!(report.finished_goods.is_empty());
    }

    #[tokio::test]
    async fn csv_export_includes_header_and_stock_level() {
        let service = service(vec![material(1, "Raw Steel, cold rolled", 4, 10)], vec![]);
        let csv = service.export_materials_csv().await.unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("id,name,sku"));
        let row = lines.next().unwrap();
        assert!(row.contains("\"Raw Steel, cold rolled\""));
        assert!(row.ends_with(",Critical"));
    }

    #[tokio::test]
    async fn valuation_sums_both_sides() {
        let service = service(vec![material(1, "Raw Steel", 10, 5)], vec![good(1, 2)]);
        let v = service.valuation().await.unwrap();
        assert_eq!(v.materials, Decimal::new(4000, 2));
        assert_eq!(v.finished_goods, Decimal::new(9000, 2));
        assert_eq!(v.total, Decimal::new(13000, 2));
    }

    #[tokio::test]
    async fn find_material_matches_substrings() {
        let service = service(vec![material(1, "Raw Steel Sheet", 10, 5)], vec![]);
        assert_eq!(
            service.find_material("raw steel").await.unwrap().map(|m| m.id),
            Some(1)
        );
        assert!(service.find_material("Copper").await.unwrap().is_none());
    }
}
