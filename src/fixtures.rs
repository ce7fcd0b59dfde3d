//! Seed data for in-memory repositories and for the remote-read fallback.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal_macros::dec;

use crate::models::{
    Activity, ActivityKind, Alert, AlertPriority, Batch, Customer, FinishedGood, LineStatus,
    Machine, MachineStatus, Material, MaterialRequirement, Order, OrderStatus, Priority,
    ProductionLine, QualityMetric, StageName, StageStatus, TimelineEvent, WorkOrder,
    WorkOrderStatus,
};

/// Fixture data anchored to a point in time.
pub struct Fixtures {
    now: DateTime<Utc>,
}

impl Fixtures {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    fn year(&self) -> i32 {
        use chrono::Datelike;
        self.now.year()
    }

    pub fn production_lines(&self) -> Vec<ProductionLine> {
        let lines = [
            (1, "Assembly Line A", LineStatus::Running, Some(1), 847, 1000),
            (2, "Assembly Line B", LineStatus::Running, Some(2), 623, 800),
            (3, "Machining Cell 1", LineStatus::Maintenance, None, 0, 500),
            (4, "Packaging Line", LineStatus::Idle, None, 412, 600),
        ];
        lines
            .into_iter()
            .map(|(id, name, status, job, actual, target)| {
                let mut line = ProductionLine {
                    id,
                    name: name.to_string(),
                    status,
                    current_job: job.map(|wo| WorkOrder::job_id_for(wo, self.year())),
                    actual_output: actual,
                    target_output: target,
                    efficiency: 0.0,
                };
                line.refresh_efficiency();
                line
            })
            .collect()
    }

    pub fn machines(&self) -> Vec<Machine> {
        vec![
            Machine {
                id: 1,
                name: "CNC Mill 01".into(),
                line_id: Some(1),
                status: MachineStatus::Operational,
                utilization: 87.5,
                last_maintenance: self.now - Duration::days(21),
                next_maintenance: Some(self.today() + Duration::days(69)),
            },
            Machine {
                id: 2,
                name: "Hydraulic Press 02".into(),
                line_id: Some(1),
                status: MachineStatus::Operational,
                utilization: 72.0,
                last_maintenance: self.now - Duration::days(45),
                next_maintenance: Some(self.today() + Duration::days(3)),
            },
            Machine {
                id: 3,
                name: "Laser Cutter 03".into(),
                line_id: Some(3),
                status: MachineStatus::Maintenance,
                utilization: 0.0,
                last_maintenance: self.now - Duration::days(120),
                next_maintenance: None,
            },
            Machine {
                id: 4,
                name: "Robotic Welder 04".into(),
                line_id: Some(2),
                status: MachineStatus::Operational,
                utilization: 91.2,
                last_maintenance: self.now - Duration::days(10),
                next_maintenance: Some(self.today() + Duration::days(80)),
            },
            Machine {
                id: 5,
                name: "Shrink Wrapper 05".into(),
                line_id: Some(4),
                status: MachineStatus::Idle,
                utilization: 35.4,
                last_maintenance: self.now - Duration::days(60),
                next_maintenance: None,
            },
        ]
    }

    pub fn quality_metrics(&self) -> Vec<QualityMetric> {
        [(1, 1, 2.1, 1200, 6), (2, 2, 3.4, 950, 5), (3, 1, 1.8, 1100, 2), (4, 4, 0.9, 600, 1)]
            .into_iter()
            .map(|(id, line_id, defect_rate, inspected_units, hours_ago)| QualityMetric {
                id,
                line_id,
                defect_rate,
                inspected_units,
                timestamp: self.now - Duration::hours(hours_ago),
            })
            .collect()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        vec![
            Alert {
                id: 1,
                priority: AlertPriority::Critical,
                source: "Laser Cutter 03".into(),
                message: "Cooling system failure detected".into(),
                acknowledged: false,
                acknowledged_by: None,
                timestamp: self.now - Duration::minutes(15),
            },
            Alert {
                id: 2,
                priority: AlertPriority::High,
                source: "Inventory".into(),
                message: "Fasteners below reorder point".into(),
                acknowledged: false,
                acknowledged_by: None,
                timestamp: self.now - Duration::hours(1),
            },
            Alert {
                id: 3,
                priority: AlertPriority::Medium,
                source: "Hydraulic Press 02".into(),
                message: "Maintenance due in 3 days".into(),
                acknowledged: true,
                acknowledged_by: Some("j.okafor".into()),
                timestamp: self.now - Duration::hours(5),
            },
        ]
    }

    pub fn activities(&self) -> Vec<Activity> {
        [
            (1, ActivityKind::WorkOrder, "Work order WO-{y}-0001 moved to Production", "m.chen", 20),
            (2, ActivityKind::Quality, "Assembly Line B inspected at 3.4% defects", "qc.team", 300),
            (3, ActivityKind::Maintenance, "Maintenance started on Laser Cutter 03", "r.patel", 90),
            (4, ActivityKind::Order, "Order ORD-{y}-0002 confirmed", "s.alvarez", 240),
        ]
        .into_iter()
        .map(|(id, kind, text, user, minutes_ago)| Activity {
            id,
            kind,
            description: text.replace("{y}", &self.year().to_string()),
            user: user.to_string(),
            timestamp: self.now - Duration::minutes(minutes_ago),
        })
        .collect()
    }

    pub fn materials(&self) -> Vec<Material> {
        let batch = |number: &str, quantity: u32, days_ago: i64| Batch {
            batch_number: number.to_string(),
            quantity,
            received: self.today() - Duration::days(days_ago),
            expiry: None,
        };
        vec![
            Material {
                id: 1,
                name: "Raw Steel Sheet".into(),
                sku: "RM-STL-001".into(),
                category: Some("Metals".into()),
                current_stock: 2400,
                reorder_point: 1000,
                unit: "kg".into(),
                unit_cost: dec!(4.25),
                supplier: Some("Harbor Steel Supply".into()),
                location: Some("Warehouse A-1".into()),
                last_restocked: Some(self.now - Duration::days(6)),
                batches: vec![batch("STL-2291", 2400, 6)],
            },
            Material {
                id: 2,
                name: "Fasteners M8".into(),
                sku: "RM-FST-008".into(),
                category: Some("Hardware".into()),
                current_stock: 3200,
                reorder_point: 5000,
                unit: "pcs".into(),
                unit_cost: dec!(0.12),
                supplier: Some("BoltWorks".into()),
                location: Some("Warehouse B-4".into()),
                last_restocked: Some(self.now - Duration::days(30)),
                batches: vec![batch("FST-0412", 3200, 30)],
            },
            Material {
                id: 3,
                name: "Packaging Carton".into(),
                sku: "RM-PKG-010".into(),
                category: Some("Packaging".into()),
                current_stock: 180,
                reorder_point: 500,
                unit: "pcs".into(),
                unit_cost: dec!(1.80),
                supplier: Some("BoxCo".into()),
                location: Some("Warehouse C-2".into()),
                last_restocked: Some(self.now - Duration::days(45)),
                batches: Vec::new(),
            },
            Material {
                id: 4,
                name: "Hydraulic Fluid".into(),
                sku: "RM-HYD-002".into(),
                category: Some("Consumables".into()),
                current_stock: 340,
                reorder_point: 200,
                unit: "L".into(),
                unit_cost: dec!(6.50),
                supplier: Some("FluidTech".into()),
                location: Some("Warehouse A-3".into()),
                last_restocked: None,
                batches: Vec::new(),
            },
        ]
    }

    pub fn finished_goods(&self) -> Vec<FinishedGood> {
        vec![
            FinishedGood {
                id: 1,
                name: "Gear Housing GH-200".into(),
                sku: "FG-GH-200".into(),
                current_stock: 320,
                reorder_point: 100,
                unit_price: dec!(45.00),
                location: Some("Finished Goods 1".into()),
                batches: Vec::new(),
            },
            FinishedGood {
                id: 2,
                name: "Hydraulic Valve HV-12".into(),
                sku: "FG-HV-012".into(),
                current_stock: 60,
                reorder_point: 80,
                unit_price: dec!(129.50),
                location: Some("Finished Goods 2".into()),
                batches: Vec::new(),
            },
            FinishedGood {
                id: 3,
                name: "Mounting Bracket MB-7".into(),
                sku: "FG-MB-007".into(),
                current_stock: 25,
                reorder_point: 150,
                unit_price: dec!(8.75),
                location: Some("Finished Goods 1".into()),
                batches: Vec::new(),
            },
        ]
    }

    pub fn customers(&self) -> Vec<Customer> {
        [
            (1, "Acme Industrial", "Dana Whitfield", "purchasing@acme-industrial.test"),
            (2, "Northwind Machining", "Robin Vale", "orders@northwind.test"),
            (3, "Bluewater Marine", "Sam Ortega", "supply@bluewater.test"),
        ]
        .into_iter()
        .map(|(id, name, contact, email)| Customer {
            id,
            name: name.to_string(),
            contact_name: Some(contact.to_string()),
            email: email.to_string(),
            phone: None,
            address: None,
            created_at: self.now - Duration::days(200 - id * 30),
        })
        .collect()
    }

    pub fn work_orders(&self) -> Vec<WorkOrder> {
        let mut in_progress = self.work_order(
            1,
            "Gear Housing GH-200",
            500,
            Priority::High,
            "Acme Industrial",
            self.today() + Duration::days(7),
            Some(1),
        );
        in_progress.materials = vec![
            MaterialRequirement::new("Raw Steel", 1250, 2400, dec!(4.25)),
            MaterialRequirement::new("Fasteners", 4000, 3200, dec!(0.12)),
            MaterialRequirement::new("Packaging", 500, 180, dec!(1.80)),
        ];
        let started = self.now - Duration::days(2);
        // Setup done, production underway
        let _ = in_progress.apply_stage_update(StageName::Setup, Some(100.0), None, started);
        let _ = in_progress.apply_stage_update(StageName::Production, Some(60.0), None, self.now);

        let scheduled = self.work_order(
            2,
            "Hydraulic Valve HV-12",
            120,
            Priority::Medium,
            "Northwind Machining",
            self.today() + Duration::days(14),
            Some(2),
        );

        let mut late = self.work_order(
            3,
            "Mounting Bracket MB-7",
            800,
            Priority::Urgent,
            "Bluewater Marine",
            self.today() - Duration::days(1),
            None,
        );
        late.refresh_status(self.today());

        let mut done = self.work_order(
            4,
            "Gear Housing GH-200",
            200,
            Priority::Low,
            "Acme Industrial",
            self.today() - Duration::days(3),
            Some(1),
        );
        for stage in [StageName::Setup, StageName::Production, StageName::QualityCheck] {
            let _ = done.apply_stage_update(stage, None, Some(StageStatus::Complete), self.now - Duration::days(4));
        }

        vec![in_progress, scheduled, late, done]
    }

    fn work_order(
        &self,
        id: i64,
        product: &str,
        quantity: u32,
        priority: Priority,
        customer: &str,
        due_date: NaiveDate,
        assigned_line: Option<i64>,
    ) -> WorkOrder {
        WorkOrder {
            id,
            job_id: WorkOrder::job_id_for(id, self.year()),
            product: product.to_string(),
            quantity,
            priority,
            customer: customer.to_string(),
            due_date,
            assigned_line,
            order_id: None,
            stages: WorkOrder::initial_stages(),
            materials: Vec::new(),
            status: WorkOrderStatus::Scheduled,
            current_stage: StageName::Setup,
            progress: 0.0,
            created_at: self.now - Duration::days(10),
            updated_at: self.now - Duration::days(1),
        }
    }

    pub fn orders(&self) -> Vec<Order> {
        let event = |status: OrderStatus, note: &str, user: &str, days_ago: i64| TimelineEvent {
            timestamp: self.now - Duration::days(days_ago),
            status,
            note: note.to_string(),
            user: user.to_string(),
        };
        let order = |id: i64,
                     customer_id: i64,
                     customer: &str,
                     product: &str,
                     quantity: u32,
                     unit_price: rust_decimal::Decimal,
                     status: OrderStatus,
                     due_in: i64| Order {
            id,
            order_number: Order::order_number_for(id, self.year()),
            customer: customer.to_string(),
            customer_id: Some(customer_id),
            product: product.to_string(),
            quantity,
            unit_price,
            total_price: Order::line_total(unit_price, quantity),
            status,
            priority: Priority::Medium,
            due_date: self.today() + Duration::days(due_in),
            work_order_id: None,
            timeline: vec![event(OrderStatus::Pending, "Order created", "system", 12)],
            shipping: None,
            quality: None,
            created_at: self.now - Duration::days(12),
            updated_at: self.now - Duration::days(1),
        };

        let mut in_production = order(
            1,
            1,
            "Acme Industrial",
            "Gear Housing GH-200",
            500,
            dec!(45.00),
            OrderStatus::InProduction,
            7,
        );
        in_production.work_order_id = Some(1);
        in_production.priority = Priority::High;
        in_production
            .timeline
            .push(event(OrderStatus::Confirmed, "Credit approved", "s.alvarez", 10));
        in_production
            .timeline
            .push(event(OrderStatus::InProduction, "Released to floor", "m.chen", 2));

        let mut confirmed = order(
            2,
            2,
            "Northwind Machining",
            "Hydraulic Valve HV-12",
            120,
            dec!(129.50),
            OrderStatus::Confirmed,
            14,
        );
        confirmed
            .timeline
            .push(event(OrderStatus::Confirmed, "Order confirmed", "s.alvarez", 4));

        let pending = order(
            3,
            3,
            "Bluewater Marine",
            "Mounting Bracket MB-7",
            800,
            dec!(8.75),
            OrderStatus::Pending,
            21,
        );

        vec![in_production, confirmed, pending]
    }
}
