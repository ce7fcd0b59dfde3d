//! Storage wiring: picks a backend per collection from configuration.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::config::{AppConfig, DataSource};
use crate::errors::ServiceError;
use crate::fixtures::Fixtures;
use crate::models::{
    Activity, Alert, Customer, FinishedGood, Machine, Material, Order, ProductionLine,
    QualityMetric, Reservation, WorkOrder,
};
use crate::records::{HttpRecordStore, RecordStore};
use crate::repositories::{MemoryRepository, Record, RecordRepository, Repository};

/// One repository per collection.
#[derive(Clone)]
pub struct Repositories {
    pub production_lines: Arc<dyn Repository<ProductionLine>>,
    pub machines: Arc<dyn Repository<Machine>>,
    pub quality_metrics: Arc<dyn Repository<QualityMetric>>,
    pub alerts: Arc<dyn Repository<Alert>>,
    pub activities: Arc<dyn Repository<Activity>>,
    pub work_orders: Arc<dyn Repository<WorkOrder>>,
    pub orders: Arc<dyn Repository<Order>>,
    pub materials: Arc<dyn Repository<Material>>,
    pub finished_goods: Arc<dyn Repository<FinishedGood>>,
    pub reservations: Arc<dyn Repository<Reservation>>,
    pub customers: Arc<dyn Repository<Customer>>,
    /// The remote store behind the record-backed collections, if any
    pub record_store: Option<Arc<dyn RecordStore>>,
}

fn memory<T: Record>(seed: Vec<T>) -> Arc<dyn Repository<T>> {
    Arc::new(MemoryRepository::with_records(seed))
}

fn remote<T: Record>(store: &Arc<dyn RecordStore>, fallback: Vec<T>) -> Arc<dyn Repository<T>> {
    Arc::new(RecordRepository::with_fallback(store.clone(), fallback))
}

impl Repositories {
    /// Every collection in memory, seeded from fixtures.
    pub fn in_memory() -> Self {
        let fixtures = Fixtures::new(Utc::now());
        Self {
            production_lines: memory(fixtures.production_lines()),
            machines: memory(fixtures.machines()),
            quality_metrics: memory(fixtures.quality_metrics()),
            alerts: memory(fixtures.alerts()),
            activities: memory(fixtures.activities()),
            work_orders: memory(fixtures.work_orders()),
            orders: memory(fixtures.orders()),
            materials: memory(fixtures.materials()),
            finished_goods: memory(fixtures.finished_goods()),
            reservations: memory(Vec::new()),
            customers: memory(fixtures.customers()),
            record_store: None,
        }
    }

    /// Every collection in memory and empty.
    pub fn empty() -> Self {
        Self {
            production_lines: memory(Vec::new()),
            machines: memory(Vec::new()),
            quality_metrics: memory(Vec::new()),
            alerts: memory(Vec::new()),
            activities: memory(Vec::new()),
            work_orders: memory(Vec::new()),
            orders: memory(Vec::new()),
            materials: memory(Vec::new()),
            finished_goods: memory(Vec::new()),
            reservations: memory(Vec::new()),
            customers: memory(Vec::new()),
            record_store: None,
        }
    }

    /// Machines, materials, finished goods and orders go through `store`,
    /// falling back to fixtures when reads fail; the rest stay in memory.
    pub fn with_record_store(store: Arc<dyn RecordStore>) -> Self {
        let fixtures = Fixtures::new(Utc::now());
        Self {
            machines: remote(&store, fixtures.machines()),
            materials: remote(&store, fixtures.materials()),
            finished_goods: remote(&store, fixtures.finished_goods()),
            orders: remote(&store, fixtures.orders()),
            record_store: Some(store),
            ..Self::in_memory()
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        match config.data_source() {
            DataSource::Mock => {
                info!("Using in-memory data source");
                Ok(Self::in_memory())
            }
            DataSource::Remote => {
                let store = HttpRecordStore::new(&config.record_api)?;
                info!(
                    base_url = config.record_api.base_url.as_deref().unwrap_or_default(),
                    "Using remote record store"
                );
                Ok(Self::with_record_store(Arc::new(store)))
            }
        }
    }
}
