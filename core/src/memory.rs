//! In-process `RecordStore`.
//!
//! Query evaluation mirrors the `record-server` query route, which keeps its
//! own DTOs; `tests/integration.rs` runs both against the same records.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::store::RecordStore;
use crate::types::{Cursor, Query, Record, RecordId};

/// In-memory `RecordStore` for tests and offline development.
///
/// Cursors are plain offsets into the sorted result set.
#[derive(Clone, Debug, Default)]
pub struct MemoryRecordStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<RecordId, Record>,
    last_created: Option<DateTime<Utc>>,
}

impl Inner {
    /// Creation times are strictly increasing so newest-first is a total order.
    fn next_creation_time(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_created {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_created = Some(now);
        now
    }
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn save_record(&self, mut record: Record) -> StoreResult<Option<Record>> {
        let mut inner = self.inner.write().await;
        match record.record_id.clone() {
            None => {
                let id = RecordId::new(Uuid::new_v4().to_string());
                record.record_id = Some(id.clone());
                record.created_at = Some(inner.next_creation_time());
                inner.records.insert(id, record.clone());
                Ok(Some(record))
            }
            Some(id) => {
                let stored = inner.records.get_mut(&id).ok_or(StoreError::NotFound)?;
                stored.fields = record.fields;
                Ok(Some(stored.clone()))
            }
        }
    }

    async fn query(&self, query: Query, records: mpsc::Sender<Record>) -> StoreResult<Option<Cursor>> {
        let offset = match &query.cursor {
            Some(cursor) => cursor.as_str().parse::<usize>().map_err(|_| StoreError::Http {
                status: 400,
                body: format!("invalid cursor `{}`", cursor.as_str()),
            })?,
            None => 0,
        };

        let (page, cursor) = {
            let inner = self.inner.read().await;
            let mut matching: Vec<&Record> = inner.records.values().filter(|r| query.selects(r)).collect();
            matching.sort_by(|a, b| query.compare(a, b));

            let total = matching.len();
            let end = if query.limit == 0 {
                total
            } else {
                offset.saturating_add(query.limit).min(total)
            };
            let page: Vec<Record> = matching
                .into_iter()
                .skip(offset)
                .take(end.saturating_sub(offset))
                .map(|r| {
                    let mut r = r.clone();
                    r.project(query.desired_keys.as_deref());
                    r
                })
                .collect();
            let cursor = (end < total).then(|| Cursor::new(end.to_string()));
            (page, cursor)
        };

        for record in page {
            if records.send(record).await.is_err() {
                return Ok(None);
            }
        }
        Ok(cursor)
    }

    async fn delete_record(&self, id: &RecordId) -> StoreResult<Option<RecordId>> {
        let mut inner = self.inner.write().await;
        inner
            .records
            .remove(id)
            .map(|_| Some(id.clone()))
            .ok_or(StoreError::NotFound)
    }

    async fn fetch_record(&self, id: &RecordId) -> StoreResult<Option<Record>> {
        let inner = self.inner.read().await;
        inner.records.get(id).cloned().map(Some).ok_or(StoreError::NotFound)
    }
}
