//! Trait abstraction for the storage network.
//!
//! The publish pipeline only ever talks to storage nodes through
//! [`StorageClient`], so tests can swap in [`super::MockStorageClient`].

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::committee::{Committee, StorageNode};
use super::types::{
    BlobCertificate, BlobId, BlobMetadata, EncodedBlob, SliversForNode, StorageConfirmation,
    StorageCost, SystemState,
};
use crate::ledger::ObjectId;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage network errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("Network error talking to node {node}: {reason}")]
    Network { node: String, reason: String },

    #[error("Connection to node {0} was reset")]
    ConnectionReset(String),

    #[error("Timed out writing to node {0}")]
    Timeout(String),

    #[error("Node {node} rejected the write: {reason}")]
    Rejected { node: String, reason: String },

    #[error("Write to node {0} was cancelled")]
    Cancelled(String),

    #[error("Encoding failed: {0}")]
    Encoding(String),

    #[error("Not enough confirmations for blob {blob_id}: {achieved}/{required} shards")]
    NotEnoughConfirmations {
        blob_id: BlobId,
        achieved: u64,
        required: u64,
    },

    #[error("System state unavailable: {0}")]
    SystemState(String),
}

impl StorageError {
    /// Transient errors warrant a client reset before the next retry round.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageError::Network { .. } | StorageError::ConnectionReset(_) | StorageError::Timeout(_)
        )
    }
}

/// Everything a node needs to store its slivers of one blob.
#[derive(Debug, Clone, Copy)]
pub struct NodeWriteRequest<'a> {
    pub blob_id: BlobId,
    /// On-chain blob object the write is registered under.
    pub object_id: ObjectId,
    pub node: &'a StorageNode,
    pub metadata: &'a BlobMetadata,
    pub slivers: &'a SliversForNode,
    pub deletable: bool,
}

/// Storage network client.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Current epoch, shard count and committee shard assignment.
    async fn system_state(&self) -> StorageResult<SystemState>;

    /// Erasure-encode `data` for `committee`.
    ///
    /// The resulting blob id is a pure function of the bytes and the shard
    /// count: identical input always yields the same id.
    async fn encode_blob(&self, data: &[u8], committee: &Committee) -> StorageResult<EncodedBlob>;

    /// Price of storing `unencoded_size` bytes for `epochs` epochs.
    async fn storage_cost(&self, unencoded_size: u64, epochs: u32) -> StorageResult<StorageCost>;

    /// Upload metadata and slivers to one node.
    ///
    /// Implementations must abort promptly once `cancel` fires.
    async fn write_to_node(
        &self,
        request: NodeWriteRequest<'_>,
        cancel: &CancellationToken,
    ) -> StorageResult<StorageConfirmation>;

    /// Aggregate per-node confirmations into a certificate.
    ///
    /// `confirmations` is committee-sized; `None` entries are nodes that never
    /// confirmed.
    async fn certify(
        &self,
        blob_id: &BlobId,
        confirmations: &[Option<StorageConfirmation>],
        committee: &Committee,
    ) -> StorageResult<BlobCertificate>;

    /// Drop cached connections after transient failures.
    fn reset(&self) {}
}
