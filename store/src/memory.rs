use std::sync::Mutex;
use std::sync::MutexGuard;

use chrono::DateTime;
use chrono::Utc;

use crate::EntityStore;
use crate::Result;
use crate::StoreError;
use crate::TableEntity;
use crate::next_write_timestamp;

/// Order in which [`InMemoryEntityStore`] returns query results.
///
/// Real backends do not guarantee any order, so callers must not rely on the
/// position of a row in a result set. `Reversed` lets tests prove that.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryOrder {
    /// Oldest insert first.
    #[default]
    Insertion,
    /// Newest insert first.
    Reversed,
}

#[derive(Debug, Default)]
struct Rows {
    entities: Vec<TableEntity>,
    last_write: Option<DateTime<Utc>>,
}

/// Process-local store. Every write is stamped with a strictly increasing
/// timestamp.
#[derive(Debug, Default)]
pub struct InMemoryEntityStore {
    rows: Mutex<Rows>,
    order: QueryOrder,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query_order(order: QueryOrder) -> Self {
        Self {
            rows: Mutex::default(),
            order,
        }
    }

    /// Number of rows across all partitions.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.entities.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.entities.is_empty())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Rows>> {
        self.rows
            .lock()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }

    fn ordered(&self, mut entities: Vec<TableEntity>) -> Vec<TableEntity> {
        if self.order == QueryOrder::Reversed {
            entities.reverse();
        }
        entities
    }
}

impl EntityStore for InMemoryEntityStore {
    fn query(&self, partition_key: &str, field: &str, value: &str) -> Result<Vec<TableEntity>> {
        let rows = self.lock()?;
        let matched = rows
            .entities
            .iter()
            .filter(|entity| entity.matches(partition_key, field, value))
            .cloned()
            .collect();
        Ok(self.ordered(matched))
    }

    fn list(&self, partition_key: &str) -> Result<Vec<TableEntity>> {
        let rows = self.lock()?;
        let matched = rows
            .entities
            .iter()
            .filter(|entity| entity.partition_key == partition_key)
            .cloned()
            .collect();
        Ok(self.ordered(matched))
    }

    fn insert(&self, entity: &TableEntity) -> Result<()> {
        let mut rows = self.lock()?;
        if rows.entities.iter().any(|existing| existing.same_key(entity)) {
            return Err(StoreError::already_exists(
                &entity.partition_key,
                &entity.row_key,
            ));
        }
        let stamp = next_write_timestamp(rows.last_write);
        rows.last_write = Some(stamp);
        let mut stored = entity.clone();
        stored.timestamp = Some(stamp);
        rows.entities.push(stored);
        Ok(())
    }

    fn replace(&self, entity: &TableEntity) -> Result<()> {
        let mut rows = self.lock()?;
        let stamp = next_write_timestamp(rows.last_write);
        let Some(existing) = rows
            .entities
            .iter_mut()
            .find(|existing| existing.same_key(entity))
        else {
            return Err(StoreError::not_found(&entity.partition_key, &entity.row_key));
        };
        *existing = entity.clone();
        existing.timestamp = Some(stamp);
        rows.last_write = Some(stamp);
        Ok(())
    }
}
