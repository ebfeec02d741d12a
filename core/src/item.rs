//! The text item exchanged with the store.

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};
use crate::schema::{fields, record_types, RecordSchema};
use crate::types::{Record, RecordId};

/// A single text item.
///
/// `id` is `None` until the store has saved the item once, and never changes
/// afterwards: there is no setter, only `with_text` to derive an edited copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    id: Option<RecordId>,
    pub text: String,
}

impl Item {
    /// A local item that has not been saved yet.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: None,
            text: text.into(),
        }
    }

    /// An item the store already knows under `id`.
    pub fn persisted(id: RecordId, text: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            text: text.into(),
        }
    }

    pub fn id(&self) -> Option<&RecordId> {
        self.id.as_ref()
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            id: self.id.clone(),
            text: text.into(),
        }
    }
}

impl RecordSchema for Item {
    const RECORD_TYPE: &'static str = record_types::ITEMS;
    const FIELDS: &'static [&'static str] = &[fields::TEXT];

    fn id(&self) -> Option<&RecordId> {
        self.id.as_ref()
    }

    fn write_fields(&self, record: &mut Record) {
        record.set(fields::TEXT, self.text.clone());
    }

    fn from_record(record: &Record) -> ClientResult<Self> {
        let id = record.record_id.clone().ok_or(ClientError::IdentifierMissing)?;
        let text = record
            .get(fields::TEXT)
            .and_then(|v| v.as_str())
            .ok_or(ClientError::FieldCastFailure { field: fields::TEXT })?;
        Ok(Self::persisted(id, text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saved(text: serde_json::Value) -> Record {
        let mut record = Record::new("Items");
        record.record_id = Some(RecordId::new("r-1"));
        record.set("text", text);
        record
    }

    #[test]
    fn new_item_is_not_persisted() {
        let item = Item::new("buy milk");
        assert!(item.id().is_none());
        assert!(!item.is_persisted());
    }

    #[test]
    fn to_new_record_tags_type_and_text() {
        let record = Item::new("buy milk").to_new_record();
        assert_eq!(record.record_type, "Items");
        assert!(record.record_id.is_none());
        assert_eq!(record.get("text").and_then(|v| v.as_str()), Some("buy milk"));
    }

    #[test]
    fn from_record_reads_id_and_text() {
        let item = Item::from_record(&saved("hello".into())).unwrap();
        assert_eq!(item.id(), Some(&RecordId::new("r-1")));
        assert_eq!(item.text, "hello");
    }

    #[test]
    fn from_record_rejects_non_string_text() {
        let err = Item::from_record(&saved(42.into())).unwrap_err();
        assert_eq!(err, ClientError::FieldCastFailure { field: "text" });
    }

    #[test]
    fn from_record_rejects_missing_text() {
        let mut record = saved("x".into());
        record.fields.clear();
        let err = Item::from_record(&record).unwrap_err();
        assert!(matches!(err, ClientError::FieldCastFailure { .. }));
    }

    #[test]
    fn from_record_requires_identifier() {
        let mut record = saved("x".into());
        record.record_id = None;
        assert_eq!(Item::from_record(&record).unwrap_err(), ClientError::IdentifierMissing);
    }

    #[test]
    fn with_text_keeps_identifier() {
        let item = Item::persisted(RecordId::new("r-9"), "old").with_text("new");
        assert_eq!(item.id(), Some(&RecordId::new("r-9")));
        assert_eq!(item.text, "new");
    }
}
