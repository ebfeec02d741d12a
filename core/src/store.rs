//! The remote record store as seen by the client.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::StoreResult;
use crate::types::{Cursor, Query, Record, RecordId};

/// Primitives a hosted record store has to offer.
///
/// Every method reports "success without a payload" as `Ok(None)` so the
/// client can tell it apart from a store error.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Insert a record without an id, or overwrite the fields of the record
    /// with the given id. Returns the record as the store now holds it.
    async fn save_record(&self, record: Record) -> StoreResult<Option<Record>>;

    /// Run `query`, pushing each matching record into `records` in result
    /// order as it is delivered. Resolves once the result set is exhausted,
    /// with a cursor when the limit cut it short. A closed receiver ends
    /// delivery early and is not an error.
    async fn query(&self, query: Query, records: mpsc::Sender<Record>) -> StoreResult<Option<Cursor>>;

    async fn delete_record(&self, id: &RecordId) -> StoreResult<Option<RecordId>>;

    async fn fetch_record(&self, id: &RecordId) -> StoreResult<Option<Record>>;
}
