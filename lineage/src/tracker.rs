use std::sync::Arc;

use tracing::debug;
use trail_store::EntityStore;
use trail_utils_row_key::generate_row_key;

use crate::DeploymentEntry;
use crate::DeploymentField;
use crate::LineageError;
use crate::Result;
use crate::error::StoreStep;
use crate::error::require;

mod config_update;
mod manifest;
mod source_build;

#[cfg(test)]
mod test_support;

/// Entry point for every pipeline stage.
///
/// Each call is one or two store queries followed by at most one insert or
/// replace. There is no locking around that sequence: two concurrent stage-2
/// calls for the same image tag may both insert a new row.
#[derive(Clone)]
pub struct DeploymentTracker {
    store: Arc<dyn EntityStore>,
    partition_key: String,
}

impl std::fmt::Debug for DeploymentTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentTracker")
            .field("partition_key", &self.partition_key)
            .finish_non_exhaustive()
    }
}

impl DeploymentTracker {
    pub fn new(store: Arc<dyn EntityStore>, partition_key: impl Into<String>) -> Self {
        Self {
            store,
            partition_key: partition_key.into(),
        }
    }

    pub fn partition_key(&self) -> &str {
        self.partition_key.as_str()
    }

    /// Every entry in the tracked partition, in store order.
    pub fn deployments(&self) -> Result<Vec<DeploymentEntry>> {
        let entities = self
            .store
            .list(&self.partition_key)
            .map_err(|source| LineageError::Storage {
                operation: "deployments",
                step: StoreStep::List,
                source,
            })?;
        Ok(entities.into_iter().map(DeploymentEntry::from).collect())
    }

    /// Entries whose `field` equals `value`, in store order.
    pub fn deployments_by(
        &self,
        field: DeploymentField,
        value: &str,
    ) -> Result<Vec<DeploymentEntry>> {
        const OPERATION: &str = "deployments_by";
        let value = require(OPERATION, field.as_str(), value)?;
        self.query(OPERATION, field, value)
    }

    fn query(
        &self,
        operation: &'static str,
        field: DeploymentField,
        value: &str,
    ) -> Result<Vec<DeploymentEntry>> {
        let entities = self
            .store
            .query(&self.partition_key, field.as_str(), value)
            .map_err(|source| LineageError::Storage {
                operation,
                step: StoreStep::Query,
                source,
            })?;
        debug!(
            "{operation}: {} candidates for {field}={value}",
            entities.len()
        );
        Ok(entities.into_iter().map(DeploymentEntry::from).collect())
    }

    fn insert(&self, operation: &'static str, entry: &DeploymentEntry) -> Result<()> {
        self.store
            .insert(&entry.to_entity())
            .map_err(|source| LineageError::Storage {
                operation,
                step: StoreStep::Insert,
                source,
            })
    }

    fn replace(&self, operation: &'static str, entry: &DeploymentEntry) -> Result<()> {
        self.store
            .replace(&entry.to_entity())
            .map_err(|source| LineageError::Storage {
                operation,
                step: StoreStep::Replace,
                source,
            })
    }

    fn new_entry(&self) -> DeploymentEntry {
        DeploymentEntry::new(self.partition_key.as_str(), generate_row_key())
    }
}

fn lowercase(value: Option<&str>) -> Option<String> {
    value.map(str::to_lowercase)
}
