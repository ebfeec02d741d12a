//! Client core for keeping text items in a hosted record store.
//!
//! # Overview
//! `RecordStoreClient` offers four operations (create, fetch all, update,
//! delete) over any `RecordStore`. Results come back either as async values
//! or through completion callbacks delivered on a caller-chosen
//! `ExecutionContext`, typically the UI thread.
//!
//! # Design
//! - `RecordStore` is the seam to the hosted service. `HttpRecordStore`
//!   speaks to it over HTTP; `MemoryRecordStore` stands in for tests.
//! - `RecordApi` builds `HttpRequest` values and parses `HttpResponse` values
//!   without touching the network (host-does-IO pattern).
//! - Record type and field names sit behind `RecordSchema`, so the CRUD code
//!   never spells out `"Items"` or `"text"`.
//! - DTOs are defined independently from the `record-server` crate;
//!   integration tests catch schema drift.

pub mod api;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod item;
pub mod remote;
pub mod schema;
pub mod store;
pub mod types;

mod memory;
pub use memory::MemoryRecordStore;

pub use api::RecordApi;
pub use client::{FetchEvent, ItemStream, RecordStoreClient, RecordStream};
pub use crate::config::ClientConfig;
pub use dispatch::{DedicatedThread, ExecutionContext, Immediate, Job, MainLoop, MainQueue};
pub use error::{ClientError, StoreError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use item::Item;
pub use remote::HttpRecordStore;
pub use schema::RecordSchema;
pub use store::RecordStore;
pub use types::{Cursor, Predicate, Query, QueryPage, Record, RecordId, SortDescriptor};
