use async_trait::async_trait;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::warn;

use super::{Record, Repository};
use crate::errors::ServiceError;
use crate::records::{Fields, RecordStore, RemoteRecord};

/// Repository backed by the remote record API.
///
/// Reads that fail are served from the fixture records the repository was
/// built with; writes always go to the remote and propagate its errors.
pub struct RecordRepository<T> {
    store: Arc<dyn RecordStore>,
    fallback: Vec<T>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> RecordRepository<T> {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_fallback(store, Vec::new())
    }

    pub fn with_fallback(store: Arc<dyn RecordStore>, fallback: Vec<T>) -> Self {
        Self {
            store,
            fallback,
            _record: PhantomData,
        }
    }

    /// Flattens a record into store fields. The id travels out of band and
    /// nested values listed in `JSON_FIELDS` become JSON strings.
    pub fn to_fields(record: &T) -> Result<Fields, ServiceError> {
        let mut fields = match serde_json::to_value(record)? {
            Value::Object(map) => map,
            other => {
                return Err(ServiceError::SerializationError(format!(
                    "{} record serialized to {} instead of an object",
                    T::TABLE,
                    other
                )))
            }
        };
        fields.remove("id");
        for name in T::JSON_FIELDS {
            if let Some(value) = fields.get_mut(*name) {
                if !value.is_null() {
                    *value = Value::String(value.to_string());
                }
            }
        }
        Ok(fields)
    }

    /// Rebuilds a record from store fields, parsing stringified JSON fields.
    pub fn from_remote(remote: RemoteRecord) -> Result<T, ServiceError> {
        let mut fields = remote.fields;
        for name in T::JSON_FIELDS {
            let parsed = match fields.get(*name) {
                Some(Value::String(raw)) if raw.trim().is_empty() => Value::Null,
                Some(Value::String(raw)) => serde_json::from_str(raw)?,
                _ => continue,
            };
            fields.insert((*name).to_string(), parsed);
        }
        fields.insert("id".to_string(), Value::from(remote.id));
        Ok(serde_json::from_value(Value::Object(fields))?)
    }

    fn fallback_get(&self, id: i64) -> Option<T> {
        self.fallback.iter().find(|r| r.id() == id).cloned()
    }
}

#[async_trait]
impl<T: Record> Repository<T> for RecordRepository<T> {
    async fn list(&self) -> Result<Vec<T>, ServiceError> {
        let remote = match self.store.fetch(T::TABLE, T::FIELDS).await {
            Ok(records) => records,
            Err(err) => {
                warn!(
                    table = T::TABLE,
                    error = %err,
                    fallback = self.fallback.len(),
                    "record fetch failed, serving fixture data"
                );
                return Ok(self.fallback.clone());
            }
        };

        let mut records = Vec::with_capacity(remote.len());
        for row in remote {
            let id = row.id;
            match Self::from_remote(row) {
                Ok(record) => records.push(record),
                Err(err) => warn!(table = T::TABLE, id, error = %err, "skipping malformed record"),
            }
        }
        Ok(records)
    }

    async fn get(&self, id: i64) -> Result<Option<T>, ServiceError> {
        match self.store.get(T::TABLE, id).await {
            Ok(Some(row)) => Self::from_remote(row).map(Some),
            Ok(None) => Ok(None),
            Err(err) => {
                warn!(table = T::TABLE, id, error = %err, "record get failed, serving fixture data");
                Ok(self.fallback_get(id))
            }
        }
    }

    async fn insert(&self, record: T) -> Result<T, ServiceError> {
        let fields = Self::to_fields(&record)?;
        let created = self.store.create(T::TABLE, fields).await?;
        Self::from_remote(created)
    }

    async fn update(&self, record: T) -> Result<T, ServiceError> {
        let fields = Self::to_fields(&record)?;
        let updated = self.store.update(T::TABLE, record.id(), fields).await?;
        Self::from_remote(updated)
    }

    async fn delete(&self, id: i64) -> Result<bool, ServiceError> {
        self.store.delete(T::TABLE, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Order, OrderStatus, Priority, TimelineEvent};
    use crate::records::MemoryRecordStore;
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    fn order(id: i64) -> Order {
        let now = Utc::now();
        Order {
            id,
            order_number: Order::order_number_for(id, 2024),
            customer: "Acme".into(),
            customer_id: None,
            product: "Widget".into(),
            quantity: 10,
            unit_price: Decimal::new(1250, 2),
            total_price: Decimal::new(12500, 2),
            status: OrderStatus::Pending,
            priority: Priority::Medium,
            due_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            work_order_id: None,
            timeline: vec![TimelineEvent {
                timestamp: now,
                status: OrderStatus::Pending,
                note: "Order created".into(),
                user: "system".into(),
            }],
            shipping: None,
            quality: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn nested_fields_are_stored_as_json_strings() {
        let store = Arc::new(MemoryRecordStore::new());
        let repo: RecordRepository<Order> = RecordRepository::new(store.clone());

        let created = repo.insert(order(0)).await.unwrap();
        let raw = store.raw(Order::TABLE, created.id).await.unwrap();

        assert!(raw["timeline"].is_string());
        assert!(raw["shipping"].is_null());
        assert!(!raw.contains_key("id"));

        let back = repo.get(created.id).await.unwrap().unwrap();
        assert_eq!(back.timeline.len(), 1);
        assert_eq!(back.timeline[0].note, "Order created");
    }

    #[tokio::test]
    async fn list_falls_back_to_fixtures_when_store_fails() {
        let store = Arc::new(MemoryRecordStore::new());
        store.set_unavailable(true);
        let repo = RecordRepository::with_fallback(store, vec![order(1), order(2)]);

        let orders = repo.list().await.unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(repo.get(2).await.unwrap().map(|o| o.id), Some(2));
    }

    #[tokio::test]
    async fn list_without_fixtures_is_empty_on_failure() {
        let store = Arc::new(MemoryRecordStore::new());
        store.set_unavailable(true);
        let repo: RecordRepository<Order> = RecordRepository::new(store);
        assert!(repo.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn writes_propagate_store_failures() {
        let store = Arc::new(MemoryRecordStore::new());
        store.set_unavailable(true);
        let repo: RecordRepository<Order> = RecordRepository::new(store);
        assert!(matches!(
            repo.insert(order(0)).await,
            Err(ServiceError::ExternalServiceError(_))
        ));
    }
}
