//! Trait abstraction for the ledger.
//!
//! The pipeline builds transactions itself and only needs the RPC surface
//! below: simulation, submission, finality and read queries.

use async_trait::async_trait;
use thiserror::Error;

use super::command::TransactionData;
use super::objects::CodecError;
use super::signer::{Signature, SignerError};
use super::types::{
    Address, DryRunResult, DynamicFieldInfo, LedgerObject, ObjectId, Page, TransactionDigest,
    TransactionEffects,
};

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Dry run failed: {0}")]
    DryRunFailed(String),

    #[error("Transaction {digest} failed: {reason}")]
    ExecutionFailed {
        digest: TransactionDigest,
        reason: String,
    },

    #[error("Unknown transaction {0}")]
    UnknownTransaction(TransactionDigest),

    #[error("Object {0} not found")]
    ObjectNotFound(ObjectId),

    #[error("Failed to serialize transaction: {0}")]
    Serialization(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Signer(#[from] SignerError),
}

/// Ledger RPC client.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Simulate a transaction and report the gas it needs.
    async fn dry_run(&self, tx: &TransactionData) -> LedgerResult<DryRunResult>;

    /// Submit a signed transaction.
    async fn execute(
        &self,
        tx: &TransactionData,
        signature: &Signature,
    ) -> LedgerResult<TransactionDigest>;

    /// Block until `digest` is final and return its effects.
    async fn wait_for_transaction(
        &self,
        digest: &TransactionDigest,
    ) -> LedgerResult<TransactionEffects>;

    /// Fetch objects by id. Missing objects are omitted from the result.
    async fn multi_get_objects(&self, ids: &[ObjectId]) -> LedgerResult<Vec<LedgerObject>>;

    /// One page of objects owned by `owner` with type `struct_type`.
    async fn owned_objects(
        &self,
        owner: &Address,
        struct_type: &str,
        cursor: Option<String>,
        limit: usize,
    ) -> LedgerResult<Page<LedgerObject>>;

    /// One page of the dynamic fields attached to `parent`.
    async fn dynamic_fields(
        &self,
        parent: &ObjectId,
        cursor: Option<String>,
    ) -> LedgerResult<Page<DynamicFieldInfo>>;

    /// Total balance of `coin_type` held by `owner`.
    async fn balance(&self, owner: &Address, coin_type: &str) -> LedgerResult<u64>;
}
