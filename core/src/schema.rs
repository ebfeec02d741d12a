//! Record types and field names the client reads and writes.
//!
//! Operation logic in `client` never names a field directly; it goes through
//! `RecordSchema`, so a new record type is a new impl rather than a change to
//! the CRUD code.

use crate::error::ClientResult;
use crate::types::{Record, RecordId};

pub mod record_types {
    pub const ITEMS: &str = "Items";
}

pub mod fields {
    pub const TEXT: &str = "text";
}

/// Maps a local value to and from a remote record.
pub trait RecordSchema: Sized {
    /// Tag of the collection every value of this type lives in.
    const RECORD_TYPE: &'static str;

    /// Fields a query needs to rebuild a value.
    const FIELDS: &'static [&'static str];

    fn id(&self) -> Option<&RecordId>;

    /// Copy this value's fields onto `record`, overwriting existing ones.
    fn write_fields(&self, record: &mut Record);

    /// Rebuild a value from a record the store handed back.
    fn from_record(record: &Record) -> ClientResult<Self>;

    /// A brand new record carrying this value's fields.
    fn to_new_record(&self) -> Record {
        let mut record = Record::new(Self::RECORD_TYPE);
        self.write_fields(&mut record);
        record
    }
}
