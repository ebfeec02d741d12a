//! `RecordStore` over HTTP.
//!
//! # Design
//! All wire knowledge lives in `RecordApi`; this type only executes the
//! requests it builds. A failure to complete the round-trip at all becomes
//! `StoreError::Transport`.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::api::RecordApi;
use crate::error::{StoreError, StoreResult};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::store::RecordStore;
use crate::types::{Cursor, Query, Record, RecordId};

#[derive(Debug, Clone)]
pub struct HttpRecordStore {
    api: RecordApi,
    http: reqwest::Client,
}

impl HttpRecordStore {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: &str, http: reqwest::Client) -> Self {
        Self {
            api: RecordApi::new(base_url),
            http,
        }
    }

    pub fn api(&self) -> &RecordApi {
        &self.api
    }

    async fn execute(&self, req: HttpRequest) -> StoreResult<HttpResponse> {
        debug!(method = %req.method, url = %req.url, "record store request");
        let method = match req.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self.http.request(method, &req.url);
        for (key, value) in &req.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = req.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(HttpResponse::new(status, body))
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn save_record(&self, record: Record) -> StoreResult<Option<Record>> {
        let created = record.record_id.is_none();
        let req = self.api.build_save_record(&record)?;
        let response = self.execute(req).await?;
        self.api.parse_save_record(response, created)
    }

    async fn query(&self, query: Query, records: mpsc::Sender<Record>) -> StoreResult<Option<Cursor>> {
        let req = self.api.build_query(&query)?;
        let page = self.api.parse_query(self.execute(req).await?)?;
        for record in page.records {
            if records.send(record).await.is_err() {
                return Ok(None);
            }
        }
        Ok(page.cursor)
    }

    async fn delete_record(&self, id: &RecordId) -> StoreResult<Option<RecordId>> {
        let response = self.execute(self.api.build_delete_record(id)?).await?;
        self.api.parse_delete_record(response)
    }

    async fn fetch_record(&self, id: &RecordId) -> StoreResult<Option<Record>> {
        let response = self.execute(self.api.build_fetch_record(id)?).await?;
        self.api.parse_fetch_record(response)
    }
}
