//! Error types for the record store and the items client.
//!
//! # Design
//! `StoreError` is what a `RecordStore` reports: either the store answered
//! with a failure or the round-trip itself broke. `ClientError` is what
//! callers of `RecordStoreClient` see. Store failures are carried verbatim in
//! `RemoteFailure`; the remaining variants cover a store that reported
//! success but handed back something unusable.

use thiserror::Error;

/// Errors reported by a `RecordStore` implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store has no record with the requested identifier.
    #[error("record not found")]
    NotFound,

    /// The store answered with an unexpected status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The request never completed (connection refused, reset, DNS, ...).
    #[error("transport failed: {0}")]
    Transport(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The identifier cannot name a record URL (`.` or `..`).
    #[error("invalid record id: {0:?}")]
    InvalidRecordId(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

/// Errors returned by `RecordStoreClient` operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("remote store failure: {0}")]
    RemoteFailure(#[from] StoreError),

    /// The store reported success but returned no record.
    #[error("store returned no record")]
    RecordMissing,

    /// The store reported success but returned no record identifier.
    #[error("store returned no record identifier")]
    IdentifierMissing,

    /// A field was present but did not hold the expected type.
    #[error("field `{field}` could not be read as a string")]
    FieldCastFailure { field: &'static str },

    /// The item has never been saved, so there is nothing to update.
    #[error("item has no identifier; save it before updating")]
    Unpersisted,
}

pub type StoreResult<T> = Result<T, StoreError>;
pub type ClientResult<T> = Result<T, ClientError>;
