//! Storage seam between services and the record backends.
//!
//! Services hold an `Arc<dyn Repository<T>>` and never know whether the
//! records live in process or behind the remote record API.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::ServiceError;

pub mod memory;
pub mod record;

pub use memory::MemoryRepository;
pub use record::RecordRepository;

/// A flat record with a numeric surrogate key.
pub trait Record: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Table name in the record store
    const TABLE: &'static str;
    /// Field names requested from the record store
    const FIELDS: &'static [&'static str];
    /// Nested values the record store keeps as serialized JSON strings
    const JSON_FIELDS: &'static [&'static str] = &[];

    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);
}

#[async_trait]
pub trait Repository<T: Record>: Send + Sync {
    async fn list(&self) -> Result<Vec<T>, ServiceError>;

    async fn get(&self, id: i64) -> Result<Option<T>, ServiceError>;

    /// Stores a new record, ignoring its id and returning it with the assigned one.
    async fn insert(&self, record: T) -> Result<T, ServiceError>;

    /// Replaces the record with the same id; NotFound when there is none.
    async fn update(&self, record: T) -> Result<T, ServiceError>;

    /// Returns whether a record was removed.
    async fn delete(&self, id: i64) -> Result<bool, ServiceError>;
}

/// Fetches a record or fails with "<entity> <id> not found".
pub async fn require<T: Record>(
    repo: &dyn Repository<T>,
    entity: &str,
    id: i64,
) -> Result<T, ServiceError> {
    repo.get(id)
        .await?
        .ok_or_else(|| ServiceError::not_found(entity, id))
}
