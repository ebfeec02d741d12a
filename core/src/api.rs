//! Stateless request builder and response parser for a hosted record store.
//!
//! # Design
//! `RecordApi` holds only a `base_url` and carries no state between calls.
//! Each store primitive is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`, so
//! the I/O boundary stays explicit and the mapping is testable without a
//! server.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;

use crate::error::{StoreError, StoreResult};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{Deleted, Query, QueryPage, Record, RecordId};

/// Everything but RFC 3986 unreserved characters is escaped inside an id
/// segment, so `/`, `?` and `#` can never leave the segment.
const ID_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, Clone)]
pub struct RecordApi {
    base_url: String,
}

impl RecordApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// New records are POSTed; records that already carry an id are PUT back
    /// to their own URL.
    pub fn build_save_record(&self, record: &Record) -> StoreResult<HttpRequest> {
        let body = serde_json::to_string(record)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let request = match &record.record_id {
            None => HttpRequest::new(HttpMethod::Post, format!("{}/records", self.base_url)),
            Some(id) => HttpRequest::new(HttpMethod::Put, self.record_url(id)?),
        };
        Ok(request.with_json(body))
    }

    pub fn build_query(&self, query: &Query) -> StoreResult<HttpRequest> {
        let body = serde_json::to_string(query)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(
            HttpRequest::new(HttpMethod::Post, format!("{}/records/query", self.base_url))
                .with_json(body),
        )
    }

    pub fn build_fetch_record(&self, id: &RecordId) -> StoreResult<HttpRequest> {
        Ok(HttpRequest::new(HttpMethod::Get, self.record_url(id)?))
    }

    pub fn build_delete_record(&self, id: &RecordId) -> StoreResult<HttpRequest> {
        Ok(HttpRequest::new(HttpMethod::Delete, self.record_url(id)?))
    }

    /// An empty success body means the store answered without a record.
    pub fn parse_save_record(&self, response: HttpResponse, created: bool) -> StoreResult<Option<Record>> {
        check_status(&response, if created { 201 } else { 200 })?;
        parse_optional(&response)
    }

    pub fn parse_query(&self, response: HttpResponse) -> StoreResult<QueryPage> {
        check_status(&response, 200)?;
        parse_json(&response)
    }

    pub fn parse_fetch_record(&self, response: HttpResponse) -> StoreResult<Option<Record>> {
        check_status(&response, 200)?;
        parse_optional(&response)
    }

    pub fn parse_delete_record(&self, response: HttpResponse) -> StoreResult<Option<RecordId>> {
        check_status(&response, 200)?;
        let deleted: Option<Deleted> = parse_optional(&response)?;
        Ok(deleted.and_then(|d| d.record_id))
    }

    /// Dot segments survive escaping (`%2E` is still a dot to URL parsers),
    /// so they are refused outright.
    fn record_url(&self, id: &RecordId) -> StoreResult<String> {
        let raw = id.as_str();
        if raw.is_empty() || raw == "." || raw == ".." {
            return Err(StoreError::InvalidRecordId(raw.to_string()));
        }
        Ok(format!("{}/records/{}", self.base_url, utf8_percent_encode(raw, ID_SEGMENT)))
    }
}

/// Map non-success status codes to the matching `StoreError` variant.
fn check_status(response: &HttpResponse, expected: u16) -> StoreResult<()> {
    if response.status == expected {
        return Ok(());
    }
    if response.status == 404 {
        return Err(StoreError::NotFound);
    }
    Err(StoreError::Http {
        status: response.status,
        body: response.body.clone(),
    })
}

fn parse_json<T: DeserializeOwned>(response: &HttpResponse) -> StoreResult<T> {
    serde_json::from_str(&response.body).map_err(|e| StoreError::Deserialization(e.to_string()))
}

fn parse_optional<T: DeserializeOwned>(response: &HttpResponse) -> StoreResult<Option<T>> {
    let body = response.body.trim();
    if body.is_empty() || body == "null" {
        return Ok(None);
    }
    parse_json(response).map(Some)
}
