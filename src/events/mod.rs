use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

use crate::models::{
    ActivityKind, AlertPriority, LineStatus, OrderStatus, StageName, WorkOrderStatus,
};
use crate::services::activities::ActivityService;

const SYSTEM_USER: &str = "system";

/// Domain events emitted by services after a successful mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    WorkOrderCreated {
        id: i64,
        job_id: String,
        product: String,
        quantity: u32,
    },
    WorkOrderStageUpdated {
        id: i64,
        job_id: String,
        stage: StageName,
        progress: f64,
    },
    WorkOrderStatusChanged {
        id: i64,
        job_id: String,
        status: WorkOrderStatus,
    },
    OrderCreated {
        id: i64,
        order_number: String,
        customer: String,
    },
    OrderStatusChanged {
        id: i64,
        order_number: String,
        from: OrderStatus,
        to: OrderStatus,
        user: String,
    },
    AlertRaised {
        id: i64,
        priority: AlertPriority,
        source: String,
        message: String,
    },
    AlertAcknowledged {
        id: i64,
        user: String,
    },
    QualityMetricRecorded {
        line_id: i64,
        defect_rate: f64,
    },
    MaintenanceRecorded {
        machine_id: i64,
        machine: String,
    },
    LineStatusChanged {
        line_id: i64,
        name: String,
        status: LineStatus,
    },
    StockAdjusted {
        sku: String,
        name: String,
        previous: u32,
        current: u32,
    },
    StockReserved {
        order_id: i64,
        sku: String,
        quantity: u32,
    },
}

/// An activity-feed entry derived from an event.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEntry {
    pub kind: ActivityKind,
    pub description: String,
    pub user: String,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn to_activity(&self) -> ActivityEntry {
        let (kind, description, user) = match self {
            Event::WorkOrderCreated {
                job_id,
                product,
                quantity,
                ..
            } => (
                ActivityKind::WorkOrder,
                format!("Work order {} created for {} x {}", job_id, quantity, product),
                SYSTEM_USER.to_string(),
            ),
            Event::WorkOrderStageUpdated {
                job_id,
                stage,
                progress,
                ..
            } => (
                ActivityKind::WorkOrder,
                format!("{} stage {} at {}%", job_id, stage, progress),
                SYSTEM_USER.to_string(),
            ),
            Event::WorkOrderStatusChanged { job_id, status, .. } => (
                ActivityKind::WorkOrder,
                format!("Work order {} is now {}", job_id, status),
                SYSTEM_USER.to_string(),
            ),
            Event::OrderCreated {
                order_number,
                customer,
                ..
            } => (
                ActivityKind::Order,
                format!("Order {} received from {}", order_number, customer),
                SYSTEM_USER.to_string(),
            ),
            Event::OrderStatusChanged {
                order_number,
                from,
                to,
                user,
                ..
            } => (
                ActivityKind::Order,
                format!("Order {} moved from {} to {}", order_number, from, to),
                user.clone(),
            ),
            Event::AlertRaised {
                priority,
                source,
                message,
                ..
            } => (
                ActivityKind::Alert,
                format!("{} alert from {}: {}", priority, source, message),
                SYSTEM_USER.to_string(),
            ),
            Event::AlertAcknowledged { id, user } => (
                ActivityKind::Alert,
                format!("Alert {} acknowledged", id),
                user.clone(),
            ),
            Event::QualityMetricRecorded {
                line_id,
                defect_rate,
            } => (
                ActivityKind::Quality,
                format!("Line {} inspected at {}% defects", line_id, defect_rate),
                SYSTEM_USER.to_string(),
            ),
            Event::MaintenanceRecorded { machine, .. } => (
                ActivityKind::Maintenance,
                format!("Maintenance completed on {}", machine),
                SYSTEM_USER.to_string(),
            ),
            Event::LineStatusChanged { name, status, .. } => (
                ActivityKind::System,
                format!("{} is now {}", name, status),
                SYSTEM_USER.to_string(),
            ),
            Event::StockAdjusted {
                sku,
                name,
                previous,
                current,
            } => (
                ActivityKind::Inventory,
                format!("{} ({}) stock {} -> {}", name, sku, previous, current),
                SYSTEM_USER.to_string(),
            ),
            Event::StockReserved {
                order_id,
                sku,
                quantity,
            } => (
                ActivityKind::Inventory,
                format!("Reserved {} x {} for order {}", quantity, sku, order_id),
                SYSTEM_USER.to_string(),
            ),
        };
        ActivityEntry {
            kind,
            description,
            user,
            timestamp: Utc::now(),
        }
    }
}

/// Cheap, cloneable handle services use to publish events.
///
/// Emission never blocks and never fails the caller: a full channel drops
/// the event with a warning.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Builds a sender and the receiver to hand to [`process_events`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// A sender whose receiver is already gone; events are discarded.
    pub fn detached() -> Self {
        let (sender, _) = Self::channel(1);
        sender
    }

    pub fn emit(&self, event: Event) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(?event, "event channel full, dropping event");
            }
            Err(TrySendError::Closed(event)) => {
                debug!(?event, "event channel closed");
            }
        }
    }
}

/// Drains the event channel into the activity feed until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, activities: Arc<ActivityService>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        debug!(?event, "received event");
        let entry = event.to_activity();
        if let Err(e) = activities.record(entry).await {
            error!(error = %e, "Failed to record activity for event");
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emit_on_full_channel_does_not_block() {
        let (sender, mut rx) = EventSender::channel(1);
        let event = Event::AlertAcknowledged {
            id: 1,
            user: "kim".into(),
        };
        sender.emit(event.clone());
        sender.emit(event.clone());

        assert_eq!(rx.recv().await, Some(event));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn detached_sender_discards_silently() {
        EventSender::detached().emit(Event::QualityMetricRecorded {
            line_id: 1,
            defect_rate: 2.0,
        });
    }

    #[test]
    fn order_status_activity_credits_the_acting_user() {
        let entry = Event::OrderStatusChanged {
            id: 4,
            order_number: "ORD-2024-0004".into(),
            from: OrderStatus::Confirmed,
            to: OrderStatus::InProduction,
            user: "dana".into(),
        }
        .to_activity();

        assert_eq!(entry.kind, ActivityKind::Order);
        assert_eq!(entry.user, "dana");
        assert_eq!(
            entry.description,
            "Order ORD-2024-0004 moved from Confirmed to In Production"
        );
    }
}
