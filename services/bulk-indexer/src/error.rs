use std::time::Duration;

use thiserror::Error;

use crate::bulk::SettingsSnapshot;

pub type Result<T> = std::result::Result<T, BulkError>;

#[derive(Error, Debug)]
pub enum BulkError {
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Scroll not found or expired: {0}")]
    ScrollNotFound(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid setting {name}: {value}")]
    InvalidSetting { name: String, value: String },

    #[error("Bulk indexing is already started")]
    AlreadyStarted,

    #[error("Bulk indexing session is not open")]
    SessionClosed,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Bulk requests still being executed after {timeout:?} ({in_flight} in flight)")]
    DrainTimeout {
        timeout: Duration,
        in_flight: usize,
        pending_restore: Option<SettingsSnapshot>,
    },

    #[error("Failed to restore settings of index {index} after large indexing ({snapshot}): {reason}")]
    SettingsRestore {
        index: String,
        snapshot: SettingsSnapshot,
        reason: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Tantivy error: {0}")]
    TantivyError(#[from] tantivy::TantivyError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Async error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Anyhow error: {0}")]
    AnyhowError(#[from] anyhow::Error),
}

impl BulkError {
    /// Errors that abort the session rather than a single batch.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BulkError::DrainTimeout { .. } | BulkError::SettingsRestore { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BulkError::IndexNotFound("issues".to_string());
        assert_eq!(format!("{}", err), "Index not found: issues");
    }

    #[test]
    fn test_drain_timeout_is_fatal() {
        let err = BulkError::DrainTimeout {
            timeout: Duration::from_secs(600),
            in_flight: 2,
            pending_restore: None,
        };
        assert!(err.is_fatal());
        assert!(format!("{}", err).contains("2 in flight"));
        assert!(!BulkError::SessionClosed.is_fatal());
    }
}
