use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{Fields, RecordStore, RemoteRecord};
use crate::config::RecordApiConfig;
use crate::errors::ServiceError;

#[derive(Debug, Deserialize)]
struct RecordList {
    #[serde(default)]
    records: Vec<RemoteRecord>,
}

/// `RecordStore` over HTTP.
///
/// Records live under `{base_url}/tables/{table}/records`; requests carry a
/// bearer token when one is configured.
#[derive(Clone, Debug)]
pub struct HttpRecordStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpRecordStore {
    pub fn new(config: &RecordApiConfig) -> Result<Self, ServiceError> {
        let base_url = config
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                ServiceError::ValidationError("record_api.base_url is not configured".into())
            })?
            .trim_end_matches('/')
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    fn records_url(&self, table: &str) -> String {
        format!("{}/tables/{}/records", self.base_url, table)
    }

    fn record_url(&self, table: &str, id: i64) -> String {
        format!("{}/{}", self.records_url(table), id)
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn ensure_success(response: Response) -> Result<Response, ServiceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ServiceError::ExternalServiceError(format!(
            "record API returned {}: {}",
            status,
            body.trim()
        )))
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    #[instrument(skip(self, fields))]
    async fn fetch(&self, table: &str, fields: &[&str]) -> Result<Vec<RemoteRecord>, ServiceError> {
        let mut request = self.request(Method::GET, self.records_url(table));
        if !fields.is_empty() {
            request = request.query(&[("fields", fields.join(","))]);
        }
        let response = Self::ensure_success(request.send().await?).await?;
        let list: RecordList = response.json().await?;
        debug!(count = list.records.len(), "fetched records");
        Ok(list.records)
    }

    #[instrument(skip(self))]
    async fn get(&self, table: &str, id: i64) -> Result<Option<RemoteRecord>, ServiceError> {
        let response = self
            .request(Method::GET, self.record_url(table, id))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::ensure_success(response).await?;
        Ok(Some(response.json().await?))
    }

    #[instrument(skip(self, fields))]
    async fn create(&self, table: &str, fields: Fields) -> Result<RemoteRecord, ServiceError> {
        let response = self
            .request(Method::POST, self.records_url(table))
            .json(&json!({ "fields": fields }))
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.json().await?)
    }

    #[instrument(skip(self, fields))]
    async fn update(
        &self,
        table: &str,
        id: i64,
        fields: Fields,
    ) -> Result<RemoteRecord, ServiceError> {
        let response = self
            .request(Method::PATCH, self.record_url(table, id))
            .json(&json!({ "fields": fields }))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ServiceError::not_found(table, id));
        }
        let response = Self::ensure_success(response).await?;
        Ok(response.json().await?)
    }

    #[instrument(skip(self))]
    async fn delete(&self, table: &str, id: i64) -> Result<bool, ServiceError> {
        let response = self
            .request(Method::DELETE, self.record_url(table, id))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::ensure_success(response).await?;
        Ok(true)
    }
}
