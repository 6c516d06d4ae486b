use thiserror::Error;
use trail_store::StoreError;

pub type Result<T> = std::result::Result<T, LineageError>;

#[derive(Debug, Error)]
pub enum LineageError {
    /// A required identifier was empty. Raised before the store is touched.
    #[error("{operation}: `{field}` must not be empty")]
    Validation {
        operation: &'static str,
        field: &'static str,
    },
    /// The store rejected a query, insert or replace. Safe to retry the whole call.
    #[error("{operation}: store {step} failed: {source}")]
    Storage {
        operation: &'static str,
        step: StoreStep,
        #[source]
        source: StoreError,
    },
    /// No manifest-generation entry exists for this pipeline run.
    #[error("no deployment found for manifest pipeline `{pipeline_id}`")]
    NotFound { pipeline_id: String },
}

impl LineageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, LineageError::NotFound { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStep {
    Query,
    List,
    Insert,
    Replace,
}

impl StoreStep {
    pub const fn as_str(self) -> &'static str {
        match self {
            StoreStep::Query => "query",
            StoreStep::List => "list",
            StoreStep::Insert => "insert",
            StoreStep::Replace => "replace",
        }
    }
}

impl std::fmt::Display for StoreStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trimmed `value`, or a validation error naming `field`.
pub(crate) fn require<'a>(
    operation: &'static str,
    field: &'static str,
    value: &'a str,
) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LineageError::Validation { operation, field });
    }
    Ok(trimmed)
}

/// Optional identifiers: blank is the same as absent.
pub(crate) fn optional(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
