use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::models::{Activity, Alert, Machine, ProductionLine, QualityMetric, WorkOrder};
use crate::services::activities::ActivityService;
use crate::services::alerts::AlertService;
use crate::services::machines::MachineService;
use crate::services::production_lines::ProductionLineService;
use crate::services::quality::QualityService;
use crate::services::work_orders::WorkOrderService;

const RECENT_ACTIVITY_LIMIT: usize = 10;
const RECENT_QUALITY_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DashboardKpis {
    /// Mean line efficiency, percent
    pub overall_efficiency: f64,
    pub total_output: u64,
    pub target_output: u64,
    pub average_utilization: f64,
    pub average_defect_rate: f64,
    pub lines_running: usize,
    pub unacknowledged_alerts: usize,
    pub active_work_orders: usize,
    pub overdue_work_orders: usize,
    pub machines_due_for_maintenance: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardSnapshot {
    pub generated_at: DateTime<Utc>,
    pub kpis: DashboardKpis,
    pub production_lines: Vec<ProductionLine>,
    pub machines: Vec<Machine>,
    pub quality_metrics: Vec<QualityMetric>,
    pub alerts: Vec<Alert>,
    pub recent_activities: Vec<Activity>,
    /// Work orders that are neither complete nor cancelled
    pub work_orders: Vec<WorkOrder>,
}

impl DashboardSnapshot {
    /// Builds a snapshot and its KPIs from already-fetched collections.
    /// `quality_metrics` and `alerts` are expected in display order.
    pub fn assemble(
        today: NaiveDate,
        production_lines: Vec<ProductionLine>,
        machines: Vec<Machine>,
        mut quality_metrics: Vec<QualityMetric>,
        alerts: Vec<Alert>,
        recent_activities: Vec<Activity>,
        work_orders: Vec<WorkOrder>,
    ) -> Self {
        let kpis = DashboardKpis {
            overall_efficiency: ProductionLineService::overall_efficiency(&production_lines),
            total_output: production_lines.iter().map(|l| u64::from(l.actual_output)).sum(),
            target_output: production_lines.iter().map(|l| u64::from(l.target_output)).sum(),
            average_utilization: MachineService::average_utilization(&machines),
            average_defect_rate: QualityService::mean_defect_rate(&quality_metrics),
            lines_running: production_lines
                .iter()
                .filter(|l| l.status == crate::models::LineStatus::Running)
                .count(),
            unacknowledged_alerts: alerts.iter().filter(|a| !a.acknowledged).count(),
            active_work_orders: work_orders.iter().filter(|w| !w.status.is_terminal()).count(),
            overdue_work_orders: work_orders.iter().filter(|w| w.is_overdue(today)).count(),
            machines_due_for_maintenance: machines
                .iter()
                .filter(|m| m.is_maintenance_due(today))
                .count(),
        };
        quality_metrics.truncate(RECENT_QUALITY_LIMIT);

        Self {
            generated_at: Utc::now(),
            kpis,
            production_lines,
            machines,
            quality_metrics,
            alerts,
            recent_activities,
            work_orders: work_orders
                .into_iter()
                .filter(|w| !w.status.is_terminal())
                .collect(),
        }
    }
}

/// Joins every dashboard collection into one snapshot.
pub struct DashboardService {
    lines: Arc<ProductionLineService>,
    machines: Arc<MachineService>,
    quality: Arc<QualityService>,
    alerts: Arc<AlertService>,
    activities: Arc<ActivityService>,
    work_orders: Arc<WorkOrderService>,
}

impl DashboardService {
    pub fn new(
        lines: Arc<ProductionLineService>,
        machines: Arc<MachineService>,
        quality: Arc<QualityService>,
        alerts: Arc<AlertService>,
        activities: Arc<ActivityService>,
        work_orders: Arc<WorkOrderService>,
    ) -> Self {
        Self {
            lines,
            machines,
            quality,
            alerts,
            activities,
            work_orders,
        }
    }

    #[instrument(skip(self))]
    pub async fn snapshot(&self) -> Result<DashboardSnapshot, ServiceError> {
        let (lines, machines, metrics, alerts, activities, work_orders) = tokio::try_join!(
            self.lines.list(),
            self.machines.list(),
            self.quality.list(None),
            self.alerts.list(),
            self.activities.recent(RECENT_ACTIVITY_LIMIT),
            self.work_orders.list(),
        )?;
        Ok(DashboardSnapshot::assemble(
            Utc::now().date_naive(),
            lines,
            machines,
            metrics,
            alerts,
            activities,
            work_orders,
        ))
    }

    /// Refreshes derived work-order statuses, then takes a snapshot.
    pub async fn refresh(&self) -> Result<DashboardSnapshot, ServiceError> {
        self.work_orders
            .refresh_overdue(Utc::now().date_naive())
            .await?;
        self.snapshot().await
    }
}

/// Most recent snapshot, shared between the refresher and HTTP handlers.
///
/// Every write goes through one refresh mutex, so a slow refresh that started
/// earlier can never replace the result of one that started later.
#[derive(Clone, Default)]
pub struct SnapshotCache {
    inner: Arc<RwLock<Option<Arc<DashboardSnapshot>>>>,
    refresh_lock: Arc<Mutex<()>>,
    stored: Arc<AtomicU64>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Option<Arc<DashboardSnapshot>> {
        self.inner.read().await.clone()
    }

    /// Number of snapshots stored since start.
    pub fn refreshes(&self) -> u64 {
        self.stored.load(Ordering::SeqCst)
    }

    async fn store(&self, snapshot: DashboardSnapshot) -> Arc<DashboardSnapshot> {
        let snapshot = Arc::new(snapshot);
        *self.inner.write().await = Some(snapshot.clone());
        self.stored.fetch_add(1, Ordering::SeqCst);
        snapshot
    }

    /// Recomputes the dashboard and caches the result.
    pub async fn refresh(
        &self,
        service: &DashboardService,
    ) -> Result<Arc<DashboardSnapshot>, ServiceError> {
        let _guard = self.refresh_lock.lock().await;
        let snapshot = service.refresh().await?;
        Ok(self.store(snapshot).await)
    }

    /// Cached snapshot, or a fresh one when nothing is cached yet.
    pub async fn get_or_refresh(
        &self,
        service: &DashboardService,
    ) -> Result<Arc<DashboardSnapshot>, ServiceError> {
        if let Some(snapshot) = self.get().await {
            return Ok(snapshot);
        }
        let _guard = self.refresh_lock.lock().await;
        // another caller may have filled it while we waited
        if let Some(snapshot) = self.get().await {
            return Ok(snapshot);
        }
        Ok(self.store(service.snapshot().await?).await)
    }
}

/// Periodically recomputes the dashboard snapshot.
///
/// Each refresh is awaited before the next tick is taken, so refreshes never
/// overlap; ticks missed while a slow refresh runs are skipped.
pub struct DashboardRefresher {
    service: Arc<DashboardService>,
    cache: SnapshotCache,
    interval: Duration,
}

impl DashboardRefresher {
    pub fn new(service: Arc<DashboardService>, cache: SnapshotCache, interval: Duration) -> Self {
        Self {
            service,
            cache,
            interval,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "Starting dashboard refresher");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.refresh_once().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Dashboard refresher stopped");
    }

    pub async fn refresh_once(&self) {
        match self.cache.refresh(&self.service).await {
            Ok(snapshot) => {
                debug!(
                    efficiency = snapshot.kpis.overall_efficiency,
                    alerts = snapshot.kpis.unacknowledged_alerts,
                    "Dashboard snapshot refreshed"
                );
            }
            Err(e) => warn!(error = %e, "Dashboard refresh failed, keeping previous snapshot"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventSender;
    use crate::models::{AlertPriority, LineStatus, MachineStatus};
    use crate::repositories::MemoryRepository;
    use crate::services::inventory::InventoryService;
    use chrono::TimeZone;

    fn empty_dashboard() -> Arc<DashboardService> {
        let events = EventSender::detached();
        let alerts = Arc::new(AlertService::new(Arc::new(MemoryRepository::new()), events.clone()));
        let inventory = Arc::new(InventoryService::new(
            Arc::new(MemoryRepository::new()),
            Arc::new(MemoryRepository::new()),
            Arc::new(MemoryRepository::new()),
            Arc::new(MemoryRepository::new()),
            events.clone(),
        ));
        Arc::new(DashboardService::new(
            Arc::new(ProductionLineService::new(Arc::new(MemoryRepository::new()), events.clone())),
            Arc::new(MachineService::new(Arc::new(MemoryRepository::new()), events.clone())),
            Arc::new(QualityService::new(
                Arc::new(MemoryRepository::new()),
                alerts.clone(),
                events.clone(),
                5.0,
            )),
            alerts,
            Arc::new(ActivityService::new(Arc::new(MemoryRepository::new()))),
            Arc::new(WorkOrderService::new(
                Arc::new(MemoryRepository::new()),
                inventory,
                events,
                false,
            )),
        ))
    }

    /// Lets spawned tasks run without letting the paused clock move.
    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn refresher_ticks_skips_missed_ticks_and_stops_on_shutdown() {
        let cache = SnapshotCache::new();
        let refresher =
            DashboardRefresher::new(empty_dashboard(), cache.clone(), Duration::from_secs(30));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(refresher.run(shutdown_rx));

        // the first tick fires at once
        settle().await;
        assert_eq!(cache.refreshes(), 1);
        assert!(cache.get().await.is_some());

        tokio::time::advance(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(cache.refreshes(), 2);

        // three periods pass in one jump; only one catch-up refresh runs
        tokio::time::advance(Duration::from_secs(95)).await;
        settle().await;
        assert_eq!(cache.refreshes(), 3);

        // and the schedule stays on the original grid
        tokio::time::advance(Duration::from_secs(25)).await;
        settle().await;
        assert_eq!(cache.refreshes(), 4);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
        tokio::time::advance(Duration::from_secs(120)).await;
        settle().await;
        assert_eq!(cache.refreshes(), 4);
    }

    #[tokio::test]
    async fn overlapping_refreshes_keep_the_latest_snapshot() {
        let service = empty_dashboard();
        let cache = SnapshotCache::new();

        let (first, second) = tokio::join!(cache.refresh(&service), cache.refresh(&service));
        let (first, second) = (first.unwrap(), second.unwrap());

        let cached = cache.get().await.unwrap();
        assert!(Arc::ptr_eq(&cached, &second));
        assert!(!Arc::ptr_eq(&cached, &first));
        assert_eq!(cache.refreshes(), 2);
    }

    #[tokio::test]
    async fn first_read_fills_an_empty_cache_once() {
        let service = empty_dashboard();
        let cache = SnapshotCache::new();

        let first = cache.get_or_refresh(&service).await.unwrap();
        let again = cache.get_or_refresh(&service).await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(cache.refreshes(), 1);
    }

    fn line(id: i64, actual: u32, target: u32, status: LineStatus) -> ProductionLine {
        let mut line = ProductionLine {
            id,
            name: format!("Line {}", id),
            status,
            current_job: None,
            actual_output: actual,
            target_output: target,
            efficiency: 0.0,
        };
        line.refresh_efficiency();
        line
    }

    #[test]
    fn kpis_aggregate_the_collections() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let machines = vec![Machine {
            id: 1,
            name: "Lathe".into(),
            line_id: Some(1),
            status: MachineStatus::Operational,
            utilization: 75.0,
            last_maintenance: now,
            next_maintenance: None,
        }];
        let metrics = vec![QualityMetric {
            id: 1,
            line_id: 1,
            defect_rate: 2.5,
            inspected_units: 100,
            timestamp: now,
        }];
        let alerts = vec![Alert {
            id: 1,
            priority: AlertPriority::Low,
            source: "Line 1".into(),
            message: "check".into(),
            acknowledged: false,
            acknowledged_by: None,
            timestamp: now,
        }];

        let snapshot = DashboardSnapshot::assemble(
            now.date_naive(),
            vec![
                line(1, 80, 100, LineStatus::Running),
                line(2, 50, 100, LineStatus::Idle),
            ],
            machines,
            metrics,
            alerts,
            Vec::new(),
            Vec::new(),
        );

        assert_eq!(snapshot.kpis.overall_efficiency, 65.0);
        assert_eq!(snapshot.kpis.total_output, 130);
        assert_eq!(snapshot.kpis.target_output, 200);
        assert_eq!(snapshot.kpis.lines_running, 1);
        assert_eq!(snapshot.kpis.average_utilization, 75.0);
        assert_eq!(snapshot.kpis.average_defect_rate, 2.5);
        assert_eq!(snapshot.kpis.unacknowledged_alerts, 1);
        assert_eq!(snapshot.kpis.active_work_orders, 0);
    }
}
