//! Client side of the remote tabular record API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ServiceError;

pub mod http;
pub mod memory;

pub use http::HttpRecordStore;
pub use memory::MemoryRecordStore;

pub type Fields = Map<String, Value>;

/// A row as the record API returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub id: i64,
    #[serde(default)]
    pub fields: Fields,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn fetch(&self, table: &str, fields: &[&str]) -> Result<Vec<RemoteRecord>, ServiceError>;

    async fn get(&self, table: &str, id: i64) -> Result<Option<RemoteRecord>, ServiceError>;

    async fn create(&self, table: &str, fields: Fields) -> Result<RemoteRecord, ServiceError>;

    async fn update(&self, table: &str, id: i64, fields: Fields)
        -> Result<RemoteRecord, ServiceError>;

    async fn delete(&self, table: &str, id: i64) -> Result<bool, ServiceError>;
}
