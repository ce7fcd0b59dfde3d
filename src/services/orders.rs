use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{
    Order, OrderStatus, Priority, QualityInfo, ShippingInfo, TimelineEvent, WorkOrderStatus,
};
use crate::repositories::{require, Repository};
use crate::services::customers::CustomerService;
use crate::services::work_orders::WorkOrderService;

const DEFAULT_USER: &str = "system";

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewOrder {
    /// Customer name; taken from the customer record when `customer_id` is set
    #[validate(length(min = 1, max = 200))]
    pub customer: Option<String>,
    pub customer_id: Option<i64>,
    #[validate(length(min = 1, max = 200))]
    pub product: String,
    #[validate(range(min = 1, max = 1_000_000))]
    pub quantity: u32,
    pub unit_price: Decimal,
    #[schema(value_type = Option<String>, example = "Medium")]
    pub priority: Option<Priority>,
    pub due_date: NaiveDate,
    pub shipping_address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct OrderUpdate {
    #[validate(length(min = 1, max = 200))]
    pub product: Option<String>,
    #[validate(range(min = 1, max = 1_000_000))]
    pub quantity: Option<u32>,
    pub unit_price: Option<Decimal>,
    #[schema(value_type = Option<String>, example = "High")]
    pub priority: Option<Priority>,
    pub due_date: Option<NaiveDate>,
    pub shipping: Option<ShippingInfo>,
    pub quality: Option<QualityInfo>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct OrderStatusChange {
    #[schema(value_type = String, example = "In Production")]
    pub status: OrderStatus,
    #[validate(length(max = 500))]
    pub note: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub user: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct OrderSummary {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    /// Sum of total_price over orders that are not cancelled
    pub revenue: Decimal,
    pub average_order_value: Decimal,
}

pub struct OrderService {
    repo: Arc<dyn Repository<Order>>,
    customers: Arc<CustomerService>,
    work_orders: Arc<WorkOrderService>,
    events: EventSender,
    // held across status transitions so one order spawns one work order
    write_lock: Mutex<()>,
}

impl OrderService {
    pub fn new(
        repo: Arc<dyn Repository<Order>>,
        customers: Arc<CustomerService>,
        work_orders: Arc<WorkOrderService>,
        events: EventSender,
    ) -> Self {
        Self {
            repo,
            customers,
            work_orders,
            events,
            write_lock: Mutex::new(()),
        }
    }

    /// Orders, most recently created first.
    pub async fn list(&self) -> Result<Vec<Order>, ServiceError> {
        let mut orders = self.repo.list().await?;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    pub async fn by_status(&self, status: OrderStatus) -> Result<Vec<Order>, ServiceError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|o| o.status == status)
            .collect())
    }

    pub async fn get(&self, id: i64) -> Result<Order, ServiceError> {
        require(self.repo.as_ref(), "Order", id).await
    }

    #[instrument(skip(self), fields(product = %input.product, quantity = input.quantity))]
    pub async fn create(&self, input: NewOrder) -> Result<Order, ServiceError> {
        input.validate()?;
        let customer = match (input.customer_id, input.customer) {
            (Some(customer_id), name) => {
                let record = self.customers.get(customer_id).await.map_err(|e| match e {
                    ServiceError::NotFound(_) => ServiceError::ValidationError(format!(
                        "customer {} does not exist",
                        customer_id
                    )),
                    other => other,
                })?;
                name.unwrap_or(record.name)
            }
            (None, Some(name)) => name,
            (None, None) => {
                return Err(ServiceError::ValidationError(
                    "an order needs a customer or customer_id".into(),
                ))
            }
        };

        let now = Utc::now();
        let order = Order {
            id: 0,
            order_number: String::new(),
            customer,
            customer_id: input.customer_id,
            product: input.product,
            quantity: input.quantity,
            unit_price: input.unit_price,
            total_price: Order::line_total(input.unit_price, input.quantity),
            status: OrderStatus::Pending,
            priority: input.priority.unwrap_or_default(),
            due_date: input.due_date,
            work_order_id: None,
            timeline: vec![TimelineEvent {
                timestamp: now,
                status: OrderStatus::Pending,
                note: "Order created".to_string(),
                user: DEFAULT_USER.to_string(),
            }],
            shipping: input.shipping_address.map(|address| ShippingInfo {
                address: Some(address),
                ..ShippingInfo::default()
            }),
            quality: None,
            created_at: now,
            updated_at: now,
        };

        let mut order = self.repo.insert(order).await?;
        order.order_number = Order::order_number_for(order.id, now.year());
        let order = self.repo.update(order).await?;

        info!(order_id = order.id, order_number = %order.order_number, customer = %order.customer, "Order created");
        self.events.emit(Event::OrderCreated {
            id: order.id,
            order_number: order.order_number.clone(),
            customer: order.customer.clone(),
        });
        Ok(order)
    }

    #[instrument(skip(self))]
    pub async fn update(&self, id: i64, input: OrderUpdate) -> Result<Order, ServiceError> {
        input.validate()?;
        let _guard = self.write_lock.lock().await;
        let mut order = self.get(id).await?;
        if order.status.is_terminal() {
            return Err(ServiceError::InvalidOperation(format!(
                "order {} is {} and can no longer be edited",
                order.order_number, order.status
            )));
        }
        if let Some(product) = input.product {
            order.product = product;
        }
        if let Some(quantity) = input.quantity {
            order.quantity = quantity;
        }
        if let Some(price) = input.unit_price {
            order.unit_price = price;
        }
        if let Some(priority) = input.priority {
            order.priority = priority;
        }
        if let Some(due_date) = input.due_date {
            order.due_date = due_date;
        }
        if input.shipping.is_some() {
            order.shipping = input.shipping;
        }
        if input.quality.is_some() {
            order.quality = input.quality;
        }
        order.total_price = Order::line_total(order.unit_price, order.quantity);
        order.updated_at = Utc::now();
        self.repo.update(order).await
    }

    /// Moves an order to a new status and appends it to the timeline.
    ///
    /// Entering In Production opens a work order for the order (once, and
    /// only if the order itself is saved);
    /// entering Quality Check starts the quality record; Shipped and
    /// Delivered stamp the shipping record. Cancelling also cancels an open
    /// work order.
    #[instrument(skip(self, change), fields(status = %change.status))]
    pub async fn update_status(
        &self,
        id: i64,
        change: OrderStatusChange,
    ) -> Result<Order, ServiceError> {
        change.validate()?;
        let _guard = self.write_lock.lock().await;
        let mut order = self.get(id).await?;
        let previous = order.status;
        if previous.is_terminal() {
            return Err(ServiceError::InvalidOperation(format!(
                "order {} is {}; no further transitions are allowed",
                order.order_number, previous
            )));
        }

        let now = Utc::now();
        let user = change.user.unwrap_or_else(|| DEFAULT_USER.to_string());
        let mut opened = None;
        match change.status {
            OrderStatus::InProduction if order.work_order_id.is_none() => {
                let work_order = self.work_orders.create_for_order(&order).await?;
                info!(order_id = id, work_order_id = work_order.id, "Work order opened for order");
                order.work_order_id = Some(work_order.id);
                opened = Some(work_order.id);
            }
            OrderStatus::QualityCheck => {
                order.quality.get_or_insert_with(QualityInfo::default).started_at = Some(now);
            }
            OrderStatus::Shipped => {
                order.shipping.get_or_insert_with(ShippingInfo::default).shipped_at = Some(now);
            }
            OrderStatus::Delivered => {
                order.shipping.get_or_insert_with(ShippingInfo::default).delivered_at = Some(now);
            }
            OrderStatus::Cancelled => {
                if let Some(work_order_id) = order.work_order_id {
                    self.cancel_work_order(work_order_id).await?;
                }
            }
            _ => {}
        }

        order.status = change.status;
        order.timeline.push(TimelineEvent {
            timestamp: now,
            status: change.status,
            note: change
                .note
                .unwrap_or_else(|| format!("Status changed to {}", change.status)),
            user: user.clone(),
        });
        order.updated_at = now;
        let order = match self.repo.update(order).await {
            Ok(order) => order,
            Err(e) => {
                // the order never recorded the link
                if let Some(work_order_id) = opened {
                    self.discard_work_order(id, work_order_id).await;
                }
                return Err(e);
            }
        };

        info!(order_id = id, from = %previous, to = %order.status, "Order status changed");
        self.events.emit(Event::OrderStatusChanged {
            id,
            order_number: order.order_number.clone(),
            from: previous,
            to: order.status,
            user,
        });
        Ok(order)
    }

    async fn discard_work_order(&self, order_id: i64, work_order_id: i64) {
        warn!(order_id, work_order_id, "Order save failed, removing its new work order");
        if let Err(e) = self.work_orders.delete(work_order_id).await {
            error!(order_id, work_order_id, error = %e, "Failed to remove orphaned work order");
        }
    }

    async fn cancel_work_order(&self, work_order_id: i64) -> Result<(), ServiceError> {
        match self.work_orders.get(work_order_id).await {
            Ok(wo) if !wo.status.is_terminal() => {
                self.work_orders
                    .set_status(work_order_id, WorkOrderStatus::Cancelled)
                    .await?;
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(ServiceError::NotFound(_)) => {
                warn!(work_order_id, "Linked work order no longer exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        let _guard = self.write_lock.lock().await;
        if self.repo.delete(id).await? {
            info!(order_id = id, "Order deleted");
            Ok(())
        } else {
            Err(ServiceError::not_found("Order", id))
        }
    }

    pub async fn summary(&self) -> Result<OrderSummary, ServiceError> {
        Ok(Self::summarize(&self.repo.list().await?))
    }

    pub fn summarize(orders: &[Order]) -> OrderSummary {
        let mut by_status = BTreeMap::new();
        for order in orders {
            *by_status.entry(order.status.to_string()).or_insert(0) += 1;
        }
        let counted: Vec<&Order> = orders
            .iter()
            .filter(|o| o.status != OrderStatus::Cancelled)
            .collect();
        let revenue: Decimal = counted.iter().map(|o| o.total_price).sum();
        let average_order_value = if counted.is_empty() {
            Decimal::ZERO
        } else {
            (revenue / Decimal::from(counted.len() as u64)).round_dp(2)
        };
        OrderSummary {
            total: orders.len(),
            by_status,
            revenue,
            average_order_value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Customer;
    use crate::repositories::MemoryRepository;
    use crate::services::inventory::InventoryService;
    use assert_matches::assert_matches;
    use chrono::Duration;

    struct Fixture {
        orders: OrderService,
        work_orders: Arc<WorkOrderService>,
    }

    fn fixture() -> Fixture {
        let events = EventSender::detached();
        let order_repo: Arc<dyn Repository<Order>> = Arc::new(MemoryRepository::new());
        let inventory = Arc::new(InventoryService::new(
            Arc::new(MemoryRepository::new()),
            Arc::new(MemoryRepository::new()),
            Arc::new(MemoryRepository::new()),
            order_repo.clone(),
            events.clone(),
        ));
        let work_orders = Arc::new(WorkOrderService::new(
            Arc::new(MemoryRepository::new()),
            inventory,
            events.clone(),
            true,
        ));
        let customers = Arc::new(CustomerService::new(Arc::new(MemoryRepository::with_records(
            vec![Customer {
                id: 1,
                name: "Acme Tooling".into(),
                contact_name: None,
                email: "ops@acme.test".into(),
                phone: None,
                address: None,
                created_at: Utc::now(),
            }],
        ))));
        let orders = OrderService::new(
            order_repo,
            customers,
            work_orders.clone(),
            events,
        );
        Fixture {
            orders,
            work_orders,
        }
    }

    fn new_order() -> NewOrder {
        NewOrder {
            customer: None,
            customer_id: Some(1),
            product: "Hydraulic Valve".into(),
            quantity: 40,
            unit_price: Decimal::new(1999, 2),
            priority: Some(Priority::High),
            due_date: Utc::now().date_naive() + Duration::days(21),
            shipping_address: None,
        }
    }

    fn to(status: OrderStatus) -> OrderStatusChange {
        OrderStatusChange {
            status,
            note: None,
            user: Some("lee".into()),
        }
    }

    #[tokio::test]
    async fn create_seeds_timeline_and_totals() {
        let f = fixture();
        let order = f.orders.create(new_order()).await.unwrap();

        assert_eq!(order.customer, "Acme Tooling");
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_price, Decimal::new(79960, 2));
        assert_eq!(order.timeline.len(), 1);
        assert_eq!(order.timeline[0].note, "Order created");
        assert!(order.order_number.starts_with("ORD-"));
    }

    #[tokio::test]
    async fn unknown_customer_is_rejected() {
        let f = fixture();
        let mut input = new_order();
        input.customer_id = Some(99);
        assert_matches!(
            f.orders.create(input).await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn entering_production_creates_exactly_one_work_order() {
        let f = fixture();
        let order = f.orders.create(new_order()).await.unwrap();

        let order = f.orders.update_status(order.id, to(OrderStatus::InProduction)).await.unwrap();
        let work_order_id = order.work_order_id.unwrap();
        let order = f.orders.update_status(order.id, to(OrderStatus::InProduction)).await.unwrap();

        assert_eq!(order.work_order_id, Some(work_order_id));
        let work_orders = f.work_orders.list().await.unwrap();
        assert_eq!(work_orders.len(), 1);
        assert_eq!(work_orders[0].order_id, Some(order.id));
        assert_eq!(work_orders[0].quantity, 40);
        assert_eq!(work_orders[0].priority, Priority::High);
        assert_eq!(order.timeline.len(), 3);
    }

    #[tokio::test]
    async fn quality_and_shipping_records_are_stamped() {
        let f = fixture();
        let order = f.orders.create(new_order()).await.unwrap();

        let order = f.orders.update_status(order.id, to(OrderStatus::QualityCheck)).await.unwrap();
        assert!(order.quality.as_ref().and_then(|q| q.started_at).is_some());

        let order = f.orders.update_status(order.id, to(OrderStatus::Shipped)).await.unwrap();
        assert!(order.shipping.as_ref().and_then(|s| s.shipped_at).is_some());
        assert_eq!(order.timeline.last().unwrap().user, "lee");
    }

    #[tokio::test]
    async fn terminal_orders_reject_transitions() {
        let f = fixture();
        let order = f.orders.create(new_order()).await.unwrap();
        f.orders.update_status(order.id, to(OrderStatus::Delivered)).await.unwrap();

        assert_matches!(
            f.orders.update_status(order.id, to(OrderStatus::Pending)).await,
            Err(ServiceError::InvalidOperation(_))
        );
    }

    #[tokio::test]
    async fn cancelling_cancels_the_linked_work_order() {
        let f = fixture();
        let order = f.orders.create(new_order()).await.unwrap();
        let order = f.orders.update_status(order.id, to(OrderStatus::InProduction)).await.unwrap();
        f.orders.update_status(order.id, to(OrderStatus::Cancelled)).await.unwrap();

        let wo = f.work_orders.get(order.work_order_id.unwrap()).await.unwrap();
        assert_eq!(wo.status, WorkOrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn revenue_excludes_cancelled_orders() {
        let f = fixture();
        let kept = f.orders.create(new_order()).await.unwrap();
        let dropped = f.orders.create(new_order()).await.unwrap();
        f.orders.update_status(dropped.id, to(OrderStatus::Cancelled)).await.unwrap();

        let summary = f.orders.summary().await.unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.revenue, kept.total_price);
        assert_eq!(summary.by_status.get("Cancelled"), Some(&1));
    }
}
