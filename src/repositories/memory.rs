use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

use super::{Record, Repository};
use crate::errors::ServiceError;

/// In-process repository over an id-ordered map.
///
/// Ids continue from the largest seeded id and are never handed out twice,
/// even after a delete.
pub struct MemoryRepository<T> {
    records: RwLock<BTreeMap<i64, T>>,
    next_id: AtomicI64,
}

impl<T: Record> MemoryRepository<T> {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    pub fn with_records(seed: Vec<T>) -> Self {
        let next_id = seed.iter().map(Record::id).max().unwrap_or(0) + 1;
        let records = seed.into_iter().map(|r| (r.id(), r)).collect();
        Self {
            records: RwLock::new(records),
            next_id: AtomicI64::new(next_id),
        }
    }
}

impl<T: Record> Default for MemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Record> Repository<T> for MemoryRepository<T> {
    async fn list(&self) -> Result<Vec<T>, ServiceError> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn get(&self, id: i64) -> Result<Option<T>, ServiceError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn insert(&self, mut record: T) -> Result<T, ServiceError> {
        let mut records = self.records.write().await;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        record.set_id(id);
        records.insert(id, record.clone());
        Ok(record)
    }

    async fn update(&self, record: T) -> Result<T, ServiceError> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.id()) {
            Some(slot) => {
                *slot = record.clone();
                Ok(record)
            }
            None => Err(ServiceError::not_found(T::TABLE, record.id())),
        }
    }

    async fn delete(&self, id: i64) -> Result<bool, ServiceError> {
        Ok(self.records.write().await.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Customer;
    use assert_matches::assert_matches;
    use chrono::Utc;

    fn customer(id: i64, name: &str) -> Customer {
        Customer {
            id,
            name: name.into(),
            contact_name: None,
            email: format!("{}@example.com", name.to_lowercase()),
            phone: None,
            address: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn ids_continue_after_seed_and_are_not_reused() {
        let repo = MemoryRepository::with_records(vec![customer(3, "A"), customer(7, "B")]);

        let first = repo.insert(customer(0, "C")).await.unwrap();
        assert_eq!(first.id, 8);

        assert!(repo.delete(first.id).await.unwrap());
        let second = repo.insert(customer(0, "D")).await.unwrap();
        assert_eq!(second.id, 9);
    }

    #[tokio::test]
    async fn list_is_ordered_by_id() {
        let repo = MemoryRepository::with_records(vec![customer(5, "E"), customer(2, "B")]);
        let ids: Vec<i64> = repo.list().await.unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 5]);
    }

    #[tokio::test]
    async fn update_of_missing_record_is_not_found() {
        let repo: MemoryRepository<Customer> = MemoryRepository::new();
        assert_matches!(
            repo.update(customer(1, "Ghost")).await,
            Err(ServiceError::NotFound(_))
        );
        assert!(!repo.delete(1).await.unwrap());
    }
}
