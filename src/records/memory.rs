use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::{Fields, RecordStore, RemoteRecord};
use crate::errors::ServiceError;

/// In-process `RecordStore`, used by tests and offline runs.
///
/// `set_unavailable(true)` makes every call fail the way an unreachable
/// remote would.
#[derive(Default)]
pub struct MemoryRecordStore {
    tables: RwLock<HashMap<String, BTreeMap<i64, Fields>>>,
    unavailable: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Raw stored fields, exactly as a remote would hold them.
    pub async fn raw(&self, table: &str, id: i64) -> Option<Fields> {
        self.tables
            .read()
            .await
            .get(table)
            .and_then(|rows| rows.get(&id).cloned())
    }

    fn check_available(&self) -> Result<(), ServiceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(ServiceError::ExternalServiceError(
                "record store unavailable".into(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn fetch(&self, table: &str, fields: &[&str]) -> Result<Vec<RemoteRecord>, ServiceError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        let Some(rows) = tables.get(table) else {
            return Ok(Vec::new());
        };
        Ok(rows
            .iter()
            .map(|(id, row)| RemoteRecord {
                id: *id,
                fields: row
                    .iter()
                    .filter(|(key, _)| fields.is_empty() || fields.contains(&key.as_str()))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            })
            .collect())
    }

    async fn get(&self, table: &str, id: i64) -> Result<Option<RemoteRecord>, ServiceError> {
        self.check_available()?;
        Ok(self.raw(table, id).await.map(|fields| RemoteRecord { id, fields }))
    }

    async fn create(&self, table: &str, fields: Fields) -> Result<RemoteRecord, ServiceError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        let id = rows.keys().next_back().copied().unwrap_or(0) + 1;
        rows.insert(id, fields.clone());
        Ok(RemoteRecord { id, fields })
    }

    async fn update(
        &self,
        table: &str,
        id: i64,
        fields: Fields,
    ) -> Result<RemoteRecord, ServiceError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let row = tables
            .get_mut(table)
            .and_then(|rows| rows.get_mut(&id))
            .ok_or_else(|| ServiceError::not_found(table, id))?;
        for (key, value) in fields {
            row.insert(key, value);
        }
        Ok(RemoteRecord {
            id,
            fields: row.clone(),
        })
    }

    async fn delete(&self, table: &str, id: i64) -> Result<bool, ServiceError> {
        self.check_available()?;
        Ok(self
            .tables
            .write()
            .await
            .get_mut(table)
            .map(|rows| rows.remove(&id).is_some())
            .unwrap_or(false))
    }
}
