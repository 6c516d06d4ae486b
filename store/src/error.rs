use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("entity {partition_key}/{row_key} already exists")]
    AlreadyExists {
        partition_key: String,
        row_key: String,
    },
    #[error("entity {partition_key}/{row_key} does not exist")]
    NotFound {
        partition_key: String,
        row_key: String,
    },
    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize entity file {}: {source}", path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("entity file version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u8, supported: u8 },
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub(crate) fn already_exists(partition_key: &str, row_key: &str) -> Self {
        Self::AlreadyExists {
            partition_key: partition_key.to_string(),
            row_key: row_key.to_string(),
        }
    }

    pub(crate) fn not_found(partition_key: &str, row_key: &str) -> Self {
        Self::NotFound {
            partition_key: partition_key.to_string(),
            row_key: row_key.to_string(),
        }
    }

    pub(crate) fn io(
        action: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
