//! Publish pipeline errors.

use thiserror::Error;

use super::grouper::GroupingError;
use crate::config::ConfigError;
use crate::ledger::{LedgerError, ObjectId};
use crate::storage::{BlobId, StorageError};

/// Result type for pipeline stages.
pub type PublishResult<T> = Result<T, PublishError>;

/// Errors that end a publish run.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Grouping(#[from] GroupingError),

    #[error("No files found to upload")]
    NoFiles,

    #[error("Not enough balance: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Failed to store blob {blob_id}: quorum not reached ({achieved}/{required} shards)")]
    QuorumNotReached {
        blob_id: BlobId,
        achieved: u64,
        required: u64,
    },

    #[error("Expected object missing: {0}")]
    MissingObject(String),

    #[error("Blob {0} has no registered object")]
    NotRegistered(BlobId),

    #[error("Publish cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PublishError {
    pub(crate) fn missing_site(id: &ObjectId) -> Self {
        PublishError::MissingObject(format!("site {}", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quorum_error_reports_coverage() {
        let err = PublishError::QuorumNotReached {
            blob_id: BlobId::from_bytes([0; 32]),
            achieved: 6,
            required: 7,
        };
        assert!(err.to_string().contains("(6/7 shards)"));
    }

    #[test]
    fn test_ledger_error_converts() {
        let err: PublishError = LedgerError::Rpc("timeout".to_string()).into();
        assert!(matches!(err, PublishError::Ledger(_)));
    }
}
