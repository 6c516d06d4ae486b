//! Keyed entity store adapter.
//!
//! Entities are addressed by a partition key and a row key and carry a flat map
//! of string properties. Queries are equality filters on a single property,
//! AND-combined with the partition. Backends only promise eventual
//! read-after-write consistency and a backend-defined result order.

use std::collections::BTreeMap;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

mod error;
mod local;
mod memory;

pub use error::Result;
pub use error::StoreError;
pub use local::LOCAL_STORE_FILENAME;
pub use local::LocalEntityStore;
pub use memory::InMemoryEntityStore;
pub use memory::QueryOrder;

/// A single stored row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableEntity {
    pub partition_key: String,
    pub row_key: String,
    /// Last write time as recorded by the backend. Ignored on writes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl TableEntity {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            timestamp: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub(crate) fn matches(&self, partition_key: &str, field: &str, value: &str) -> bool {
        self.partition_key == partition_key && self.property(field) == Some(value)
    }

    pub(crate) fn same_key(&self, other: &TableEntity) -> bool {
        self.partition_key == other.partition_key && self.row_key == other.row_key
    }
}

/// Wall-clock time, nudged forward so consecutive writes never share a stamp.
pub(crate) fn next_write_timestamp(last_write: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match last_write {
        Some(last) if now <= last => last + chrono::TimeDelta::microseconds(1),
        _ => now,
    }
}

/// Storage operations the correlator depends on.
pub trait EntityStore: Send + Sync {
    /// Entities in `partition_key` whose `field` equals `value`.
    fn query(&self, partition_key: &str, field: &str, value: &str) -> Result<Vec<TableEntity>>;

    /// Every entity in `partition_key`.
    fn list(&self, partition_key: &str) -> Result<Vec<TableEntity>>;

    /// Fails with [`StoreError::AlreadyExists`] when the row key is taken.
    fn insert(&self, entity: &TableEntity) -> Result<()>;

    /// Fails with [`StoreError::NotFound`] when the row no longer exists.
    fn replace(&self, entity: &TableEntity) -> Result<()>;
}
