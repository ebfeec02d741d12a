use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{post, put},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use uuid::Uuid;

mod settings;
pub use settings::ServerConfig;

pub const CREATION_DATE_KEY: &str = "creation_date";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Record {
    pub record_id: Uuid,
    pub record_type: String,
    pub created_at: DateTime<Utc>,
    pub fields: Map<String, Value>,
}

#[derive(Deserialize)]
pub struct SaveRecord {
    pub record_type: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    #[default]
    All,
    Equals { field: String, value: Value },
}

#[derive(Clone, Debug, Deserialize)]
pub struct SortDescriptor {
    pub key: String,
    pub ascending: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Query {
    pub record_type: String,
    #[serde(default)]
    pub predicate: Predicate,
    #[serde(default)]
    pub sort: Vec<SortDescriptor>,
    #[serde(default)]
    pub desired_keys: Option<Vec<String>>,
    /// Zero means no limit.
    pub limit: usize,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryPage {
    pub records: Vec<Record>,
    pub cursor: Option<String>,
}

#[derive(Debug, Default)]
pub struct Store {
    records: HashMap<Uuid, Record>,
    last_created: Option<DateTime<Utc>>,
}

impl Store {
    /// Strictly increasing, so newest-first never ties.
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

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route("/records", post(create_record))
        .route("/records/query", post(query_records))
        .route(
            "/records/{id}",
            put(save_record).get(fetch_record).delete(delete_record),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "record server listening");
    }
    axum::serve(listener, app()).await
}

async fn create_record(
    State(db): State<Db>,
    Json(input): Json<SaveRecord>,
) -> (StatusCode, Json<Record>) {
    let mut store = db.write().await;
    let record = Record {
        record_id: Uuid::new_v4(),
        record_type: input.record_type,
        created_at: store.next_creation_time(),
        fields: input.fields,
    };
    store.records.insert(record.record_id, record.clone());
    debug!(record_id = %record.record_id, record_type = %record.record_type, "record created");
    (StatusCode::CREATED, Json(record))
}

async fn save_record(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    Json(input): Json<SaveRecord>,
) -> Result<Json<Record>, StatusCode> {
    let mut store = db.write().await;
    let record = store.records.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    if record.record_type != input.record_type {
        return Err(StatusCode::CONFLICT);
    }
    record.fields = input.fields;
    Ok(Json(record.clone()))
}

async fn fetch_record(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
) -> Result<Json<Record>, StatusCode> {
    let store = db.read().await;
    store.records.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn delete_record(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, StatusCode> {
    let mut store = db.write().await;
    store
        .records
        .remove(&id)
        .map(|_| Json(json!({ "record_id": id })))
        .ok_or(StatusCode::NOT_FOUND)
}

/// Same evaluation as `items_core::MemoryRecordStore::query`; the two are
/// checked against each other by `memory_store_and_server_answer_queries_alike`
/// in the core integration tests.
async fn query_records(
    State(db): State<Db>,
    Json(query): Json<Query>,
) -> Result<Json<QueryPage>, (StatusCode, String)> {
    let offset = match &query.cursor {
        Some(cursor) => cursor
            .parse::<usize>()
            .map_err(|_| (StatusCode::BAD_REQUEST, format!("invalid cursor `{cursor}`")))?,
        None => 0,
    };

    let store = db.read().await;
    let mut matching: Vec<&Record> = store
        .records
        .values()
        .filter(|r| r.record_type == query.record_type && query.predicate.matches(r))
        .collect();
    matching.sort_by(|a, b| compare(&query.sort, a, b));

    let total = matching.len();
    let end = if query.limit == 0 {
        total
    } else {
        offset.saturating_add(query.limit).min(total)
    };
    let records = matching
        .into_iter()
        .skip(offset)
        .take(end.saturating_sub(offset))
        .map(|r| project(r, query.desired_keys.as_deref()))
        .collect();
    let cursor = (end < total).then(|| end.to_string());
    Ok(Json(QueryPage { records, cursor }))
}

impl Predicate {
    fn matches(&self, record: &Record) -> bool {
        match self {
            Predicate::All => true,
            Predicate::Equals { field, value } => record.fields.get(field) == Some(value),
        }
    }
}

fn compare(sort: &[SortDescriptor], a: &Record, b: &Record) -> Ordering {
    for descriptor in sort {
        let ord = if descriptor.key == CREATION_DATE_KEY {
            a.created_at.cmp(&b.created_at)
        } else {
            compare_values(a.fields.get(&descriptor.key), b.fields.get(&descriptor.key))
        };
        let ord = if descriptor.ascending { ord } else { ord.reverse() };
        if ord.is_ne() {
            return ord;
        }
    }
    Ordering::Equal
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

fn project(record: &Record, desired_keys: Option<&[String]>) -> Record {
    let mut record = record.clone();
    if let Some(keys) = desired_keys {
        record.fields.retain(|name, _| keys.iter().any(|k| k == name));
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(secs: i64, text: &str) -> Record {
        let mut fields = Map::new();
        fields.insert("text".to_string(), json!(text));
        Record {
            record_id: Uuid::new_v4(),
            record_type: "Items".to_string(),
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
            fields,
        }
    }

    #[test]
    fn record_serializes_to_json() {
        let mut r = record(0, "Test");
        r.record_id = Uuid::nil();
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["record_id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["record_type"], "Items");
        assert_eq!(json["fields"]["text"], "Test");
        assert_eq!(json["created_at"], "1970-01-01T00:00:00Z");
    }

    #[test]
    fn save_record_defaults_fields_to_empty() {
        let input: SaveRecord = serde_json::from_str(r#"{"record_type":"Items"}"#).unwrap();
        assert!(input.fields.is_empty());
    }

    #[test]
    fn save_record_rejects_missing_type() {
        let result: Result<SaveRecord, _> = serde_json::from_str(r#"{"fields":{}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn query_defaults_to_all_unsorted() {
        let query: Query = serde_json::from_str(r#"{"record_type":"Items","limit":50}"#).unwrap();
        assert!(matches!(query.predicate, Predicate::All));
        assert!(query.sort.is_empty());
        assert!(query.cursor.is_none());
    }

    #[test]
    fn descending_creation_date_puts_newest_first() {
        let sort = vec![SortDescriptor {
            key: CREATION_DATE_KEY.to_string(),
            ascending: false,
        }];
        let older = record(1, "old");
        let newer = record(2, "new");
        assert_eq!(compare(&sort, &newer, &older), Ordering::Less);
    }

    #[test]
    fn field_sort_falls_through_on_ties() {
        let sort = vec![
            SortDescriptor {
                key: "text".to_string(),
                ascending: true,
            },
            SortDescriptor {
                key: CREATION_DATE_KEY.to_string(),
                ascending: true,
            },
        ];
        let a = record(2, "same");
        let b = record(1, "same");
        assert_eq!(compare(&sort, &a, &b), Ordering::Greater);
    }

    #[test]
    fn projection_drops_unrequested_fields() {
        let mut r = record(0, "x");
        r.fields.insert("extra".to_string(), json!(1));
        let projected = project(&r, Some(&["text".to_string()]));
        assert_eq!(projected.fields.len(), 1);
    }

    #[test]
    fn store_creation_times_strictly_increase() {
        let mut store = Store::default();
        let a = store.next_creation_time();
        let b = store.next_creation_time();
        assert!(b > a);
    }
}
