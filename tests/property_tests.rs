//! Property checks over the pure domain rules.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use plantops_api::models::{
    Alert, AlertPriority, MaterialRequirement, MaterialStatus, ProductionLine, StageName,
    StageStatus, WorkOrder, WorkOrderStatus,
};
use proptest::prelude::*;

fn fresh_work_order() -> WorkOrder {
    let now = Utc.with_ymd_and_hms(2024, 5, 6, 7, 0, 0).unwrap();
    WorkOrder {
        id: 1,
        job_id: WorkOrder::job_id_for(1, 2024),
        product: "Gear Housing".into(),
        quantity: 10,
        priority: Default::default(),
        customer: "Acme".into(),
        due_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
        assigned_line: None,
        order_id: None,
        stages: WorkOrder::initial_stages(),
        materials: Vec::new(),
        status: WorkOrderStatus::Scheduled,
        current_stage: StageName::Setup,
        progress: 0.0,
        created_at: now,
        updated_at: now,
    }
}

fn stage_strategy() -> impl Strategy<Value = StageName> {
    prop_oneof![
        Just(StageName::Setup),
        Just(StageName::Production),
        Just(StageName::QualityCheck),
        Just(StageName::Complete),
    ]
}

fn priority_strategy() -> impl Strategy<Value = AlertPriority> {
    prop_oneof![
        Just(AlertPriority::Critical),
        Just(AlertPriority::High),
        Just(AlertPriority::Medium),
        Just(AlertPriority::Low),
    ]
}

proptest! {
    #[test]
    fn progress_stays_the_mean_of_stages_under_any_update_sequence(
        updates in prop::collection::vec((stage_strategy(), -50.0f64..200.0), 0..24)
    ) {
        let mut work_order = fresh_work_order();
        let start = work_order.created_at;

        for (step, (stage, progress)) in updates.into_iter().enumerate() {
            let now = start + Duration::minutes(step as i64);
            // Rejected updates leave the order untouched
            let before = work_order.clone();
            if work_order.apply_stage_update(stage, Some(progress), None, now).is_err() {
                prop_assert_eq!(&work_order, &before);
            }

            let mean = work_order.stages.iter().map(|s| s.progress).sum::<f64>()
                / work_order.stages.len() as f64;
            prop_assert!((work_order.progress - (mean * 10.0).round() / 10.0).abs() < 1e-9);
            prop_assert!((0.0..=100.0).contains(&work_order.progress));
            prop_assert!(work_order.stages.iter().all(|s| (0.0..=100.0).contains(&s.progress)));
        }
    }

    #[test]
    fn completed_stages_always_form_a_prefix(
        updates in prop::collection::vec((stage_strategy(), 0.0f64..=100.0), 0..24)
    ) {
        let mut work_order = fresh_work_order();
        let now = work_order.created_at;
        for (stage, progress) in updates {
            let _ = work_order.apply_stage_update(stage, Some(progress), None, now);
        }

        let completed = work_order
            .stages
            .iter()
            .take_while(|s| s.status == StageStatus::Complete)
            .count();
        prop_assert!(work_order.stages[completed..]
            .iter()
            .all(|s| s.status != StageStatus::Complete));
        prop_assert_eq!(
            work_order.status == WorkOrderStatus::Complete,
            completed == work_order.stages.len()
        );
    }

    #[test]
    fn efficiency_is_bounded_ratio(actual in 0u32..100_000, target in 0u32..100_000) {
        let efficiency = ProductionLine::compute_efficiency(actual, target);
        prop_assert!(efficiency >= 0.0);
        if target == 0 {
            prop_assert_eq!(efficiency, 0.0);
        } else if actual <= target {
            prop_assert!(efficiency <= 100.0);
        }
    }

    #[test]
    fn material_status_follows_availability(available in 0u32..10_000, required in 1u32..10_000) {
        let status = MaterialRequirement::classify(available, required);
        let expected = if available >= required {
            MaterialStatus::Available
        } else if u64::from(available) * 2 >= u64::from(required) {
            MaterialStatus::Low
        } else {
            MaterialStatus::Critical
        };
        prop_assert_eq!(status, expected);
    }

    #[test]
    fn open_alerts_sort_before_acknowledged_ones(
        alerts in prop::collection::vec((priority_strategy(), any::<bool>(), 0i64..10_000), 1..20)
    ) {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut alerts: Vec<Alert> = alerts
            .into_iter()
            .enumerate()
            .map(|(i, (priority, acknowledged, minutes))| Alert {
                id: i as i64 + 1,
                priority,
                source: "Line A".into(),
                message: "check".into(),
                acknowledged,
                acknowledged_by: None,
                timestamp: base + Duration::minutes(minutes),
            })
            .collect();
        alerts.sort_by(Alert::display_order);

        for pair in alerts.windows(2) {
            prop_assert!(!pair[0].acknowledged || pair[1].acknowledged);
            if pair[0].acknowledged == pair[1].acknowledged {
                prop_assert!(pair[0].priority.rank() <= pair[1].priority.rank());
            }
        }
    }
}
