//! Record store data model.
//!
//! # Design
//! These types describe what a hosted record store holds and how it is
//! queried. They are defined independently from the `record-server` crate;
//! the integration tests catch any schema drift between the two.
//!
//! Field values are kept as `serde_json::Value` so a record can carry any
//! field the store accepts. Reading a field back as a concrete type is the
//! job of a `RecordSchema` implementation.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Sort key that orders records by their store-assigned creation time.
pub const CREATION_DATE_KEY: &str = "creation_date";

/// Opaque identifier assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A record as stored remotely: a type tag plus named fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<RecordId>,
    pub record_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// A fresh, never-saved record of the given type.
    pub fn new(record_type: &str) -> Self {
        Self {
            record_id: None,
            record_type: record_type.to_string(),
            created_at: None,
            fields: Map::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        self.fields.insert(field.to_string(), value.into());
    }

    /// Keep only the named fields. `None` keeps everything.
    pub fn project(&mut self, desired_keys: Option<&[String]>) {
        if let Some(keys) = desired_keys {
            self.fields.retain(|name, _| keys.iter().any(|k| k == name));
        }
    }
}

/// Continuation token handed out by a query that stopped at its limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Filter applied to records of the queried type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    #[default]
    All,
    Equals { field: String, value: Value },
}

impl Predicate {
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Predicate::All => true,
            Predicate::Equals { field, value } => record.get(field) == Some(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortDescriptor {
    pub key: String,
    pub ascending: bool,
}

impl SortDescriptor {
    pub fn newest_first() -> Self {
        Self {
            key: CREATION_DATE_KEY.to_string(),
            ascending: false,
        }
    }

    fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let ord = if self.key == CREATION_DATE_KEY {
            a.created_at.cmp(&b.created_at)
        } else {
            compare_values(a.get(&self.key), b.get(&self.key))
        };
        if self.ascending {
            ord
        } else {
            ord.reverse()
        }
    }
}

/// Missing values sort before present ones; values of different JSON kinds
/// compare equal so the next descriptor decides.
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

/// A predicate/sort/limit query over one record type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub record_type: String,
    #[serde(default)]
    pub predicate: Predicate,
    #[serde(default)]
    pub sort: Vec<SortDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_keys: Option<Vec<String>>,
    pub limit: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
}

impl Query {
    pub fn new(record_type: &str, limit: usize) -> Self {
        Self {
            record_type: record_type.to_string(),
            predicate: Predicate::All,
            sort: Vec::new(),
            desired_keys: None,
            limit,
            cursor: None,
        }
    }

    pub fn sorted_by(mut self, sort: SortDescriptor) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn with_desired_keys(mut self, keys: &[&str]) -> Self {
        self.desired_keys = Some(keys.iter().map(|k| k.to_string()).collect());
        self
    }

    pub fn with_cursor(mut self, cursor: Option<Cursor>) -> Self {
        self.cursor = cursor;
        self
    }

    /// Whether `record` belongs to this query's result set.
    pub fn selects(&self, record: &Record) -> bool {
        record.record_type == self.record_type && self.predicate.matches(record)
    }

    /// Order two records by the query's sort descriptors, in sequence.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        self.sort
            .iter()
            .map(|s| s.compare(a, b))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

/// One page of query results as returned over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPage {
    pub records: Vec<Record>,
    #[serde(default)]
    pub cursor: Option<Cursor>,
}

/// Body of a successful delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deleted {
    #[serde(default)]
    pub record_id: Option<RecordId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn record_at(secs: i64, text: &str) -> Record {
        let mut r = Record::new("Items");
        r.created_at = Some(Utc.timestamp_opt(secs, 0).unwrap());
        r.set("text", text);
        r
    }

    #[test]
    fn newest_first_orders_by_creation_time_descending() {
        let query = Query::new("Items", 10).sorted_by(SortDescriptor::newest_first());
        let mut records = vec![record_at(1, "a"), record_at(3, "c"), record_at(2, "b")];
        records.sort_by(|a, b| query.compare(a, b));
        let texts: Vec<_> = records.iter().map(|r| r.get("text").unwrap().clone()).collect();
        assert_eq!(texts, vec![json!("c"), json!("b"), json!("a")]);
    }

    #[test]
    fn equals_predicate_filters_on_field() {
        let pred = Predicate::Equals {
            field: "text".to_string(),
            value: json!("b"),
        };
        assert!(pred.matches(&record_at(0, "b")));
        assert!(!pred.matches(&record_at(0, "a")));
    }

    #[test]
    fn selects_rejects_other_record_types() {
        let query = Query::new("Items", 10);
        let mut other = record_at(0, "x");
        other.record_type = "Notes".to_string();
        assert!(!query.selects(&other));
        assert!(query.selects(&record_at(0, "x")));
    }

    #[test]
    fn project_keeps_only_desired_keys() {
        let mut r = record_at(0, "keep");
        r.set("extra", 1);
        r.project(Some(&["text".to_string()]));
        assert_eq!(r.fields.len(), 1);
        assert_eq!(r.get("text"), Some(&json!("keep")));
    }

    #[test]
    fn record_without_id_omits_it_on_the_wire() {
        let r = Record::new("Items");
        let json = serde_json::to_value(&r).unwrap();
        assert!(json.get("record_id").is_none());
        assert_eq!(json["record_type"], "Items");
    }

    #[test]
    fn predicate_serializes_with_kind_tag() {
        let json = serde_json::to_value(Predicate::All).unwrap();
        assert_eq!(json, json!({"kind": "all"}));
    }
}
