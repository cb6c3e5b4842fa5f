//! Quorum writes to the storage committee.
//!
//! Every node of the committee is tracked as [`NodeState::Pending`],
//! [`NodeState::InFlight`], [`NodeState::Failed`] or
//! [`NodeState::Succeeded`]. The scheduler drains pending nodes in rounds of
//! `write_batch_size` concurrent writes until their shard coverage reaches the
//! committee quorum. Failed nodes are retried after a fixed backoff, at most
//! `write_retry_limit` rounds, and only while quorum is still missing.
//!
//! ## Confirmation slots
//!
//! Each node has one slot. A successful write fills it once and adds the
//! node's shard count to the coverage; slots of nodes that never confirmed
//! stay `None` and are passed to certification as such.
//!
//! ## Cancellation
//!
//! Every node write gets a child of the caller's token, which is also
//! cancelled when the per-call timeout fires. Either one aborts that write.

use async_trait::async_trait;
use futures::future::join_all;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::blob::{Blob, BlobSet, BlobState};
use super::error::{PublishError, PublishResult};
use super::pipeline::PublishContext;
use crate::ledger::ObjectId;
use crate::storage::{
    Committee, NodeWriteRequest, StorageClient, StorageConfirmation, StorageError, StorageResult,
};

/// Scheduler of one node during a quorum write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Pending,
    InFlight,
    Failed,
    Succeeded,
}

/// Why a quorum write stopped short.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    #[error("quorum not reached ({achieved}/{required} shards)")]
    QuorumNotReached { achieved: u64, required: u64 },

    #[error("write cancelled")]
    Cancelled,
}

/// Round size and retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritePolicy {
    pub batch_size: usize,
    pub retry_limit: u32,
    pub backoff: Duration,
}

/// Writes one blob's slivers to a single node.
///
/// The scheduler only sees this seam, so its quorum and retry behaviour can
/// be driven by fakes.
#[async_trait]
pub trait NodeWriter: Send + Sync {
    async fn write(
        &self,
        node_index: usize,
        cancel: &CancellationToken,
    ) -> StorageResult<StorageConfirmation>;

    /// Called before a retry round that follows transient failures.
    fn reset(&self) {}
}

/// Per-node progress of one quorum write.
#[derive(Debug, Clone)]
pub struct WriteProgress {
    states: Vec<NodeState>,
    confirmations: Vec<Option<StorageConfirmation>>,
    covered: u64,
    quorum: u64,
}

impl WriteProgress {
    pub fn new(committee: &Committee) -> Self {
        Self {
            states: vec![NodeState::Pending; committee.len()],
            confirmations: vec![None; committee.len()],
            covered: 0,
            quorum: committee.quorum(),
        }
    }

    pub fn has_quorum(&self) -> bool {
        self.covered >= self.quorum
    }

    pub fn covered(&self) -> u64 {
        self.covered
    }

    pub fn state(&self, node_index: usize) -> Option<NodeState> {
        self.states.get(node_index).copied()
    }

    /// Up to `limit` nodes in `state`, in committee order.
    fn take(&mut self, state: NodeState, limit: usize) -> Vec<usize> {
        let batch: Vec<usize> = self
            .states
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == state)
            .map(|(index, _)| index)
            .take(limit)
            .collect();
        for index in &batch {
            self.states[*index] = NodeState::InFlight;
        }
        batch
    }

    fn any(&self, state: NodeState) -> bool {
        self.states.contains(&state)
    }

    fn succeed(&mut self, node_index: usize, confirmation: StorageConfirmation, shards: u64) {
        self.states[node_index] = NodeState::Succeeded;
        if self.confirmations[node_index].is_none() {
            self.confirmations[node_index] = Some(confirmation);
            self.covered += shards;
        }
    }

    fn fail(&mut self, node_index: usize) {
        self.states[node_index] = NodeState::Failed;
    }

    pub fn into_confirmations(self) -> Vec<Option<StorageConfirmation>> {
        self.confirmations
    }
}

/// Write to the committee until quorum or until the retry budget runs out.
pub async fn write_with_quorum(
    writer: &dyn NodeWriter,
    committee: &Committee,
    policy: &WritePolicy,
    cancel: &CancellationToken,
) -> Result<Vec<Option<StorageConfirmation>>, WriteError> {
    let batch_size = policy.batch_size.max(1);
    let mut progress = WriteProgress::new(committee);
    let mut transient = false;

    while !progress.has_quorum() && progress.any(NodeState::Pending) {
        if cancel.is_cancelled() {
            return Err(WriteError::Cancelled);
        }
        let batch = progress.take(NodeState::Pending, batch_size);
        transient |= run_round(writer, committee, &mut progress, &batch, cancel).await;
    }

    let mut attempt = 1;
    while !progress.has_quorum() && progress.any(NodeState::Failed) && attempt <= policy.retry_limit {
        if transient {
            debug!("Resetting storage client after transient failures");
            writer.reset();
            transient = false;
        }
        warn!(
            attempt,
            covered = progress.covered(),
            required = progress.quorum,
            backoff = ?policy.backoff,
            "Quorum not reached, retrying failed nodes"
        );
        tokio::select! {
            _ = cancel.cancelled() => return Err(WriteError::Cancelled),
            _ = tokio::time::sleep(policy.backoff) => {}
        }

        let mut failed = progress.take(NodeState::Failed, usize::MAX);
        while !failed.is_empty() && !progress.has_quorum() {
            let rest = failed.split_off(batch_size.min(failed.len()));
            transient |= run_round(writer, committee, &mut progress, &failed, cancel).await;
            failed = rest;
        }
        // Nodes skipped because quorum was reached are simply not retried
        for index in failed {
            progress.fail(index);
        }
        attempt += 1;
    }

    if cancel.is_cancelled() && !progress.has_quorum() {
        return Err(WriteError::Cancelled);
    }
    if !progress.has_quorum() {
        return Err(WriteError::QuorumNotReached {
            achieved: progress.covered(),
            required: progress.quorum,
        });
    }
    Ok(progress.into_confirmations())
}

/// One round of concurrent writes. Returns whether any failure was transient.
async fn run_round(
    writer: &dyn NodeWriter,
    committee: &Committee,
    progress: &mut WriteProgress,
    batch: &[usize],
    cancel: &CancellationToken,
) -> bool {
    let results = join_all(batch.iter().map(|&node_index| async move {
        (node_index, writer.write(node_index, cancel).await)
    }))
    .await;

    let mut transient = false;
    for (node_index, result) in results {
        match result {
            Ok(confirmation) => {
                progress.succeed(node_index, confirmation, committee.shard_count(node_index));
            }
            Err(e) => {
                transient |= e.is_transient();
                warn!(node = node_index, error = %e, "Node write failed");
                progress.fail(node_index);
            }
        }
    }
    transient
}

/// [`NodeWriter`] over a [`StorageClient`] for one registered blob.
pub struct StorageNodeWriter<'a> {
    storage: &'a dyn StorageClient,
    committee: &'a Committee,
    blob: &'a Blob,
    object_id: ObjectId,
    timeout: Duration,
}

impl<'a> StorageNodeWriter<'a> {
    pub fn new(
        storage: &'a dyn StorageClient,
        committee: &'a Committee,
        blob: &'a Blob,
        object_id: ObjectId,
        timeout: Duration,
    ) -> Self {
        Self {
            storage,
            committee,
            blob,
            object_id,
            timeout,
        }
    }
}

#[async_trait]
impl NodeWriter for StorageNodeWriter<'_> {
    async fn write(
        &self,
        node_index: usize,
        cancel: &CancellationToken,
    ) -> StorageResult<StorageConfirmation> {
        let node = self.committee.node(node_index).ok_or_else(|| StorageError::Rejected {
            node: node_index.to_string(),
            reason: "not a committee member".to_string(),
        })?;
        let slivers = self
            .blob
            .encoded
            .slivers_by_node
            .get(node_index)
            .ok_or_else(|| StorageError::Encoding(format!("no slivers for node {}", node_index)))?;

        let request = NodeWriteRequest {
            blob_id: self.blob.blob_id(),
            object_id: self.object_id,
            node,
            metadata: &self.blob.encoded.metadata,
            slivers,
            deletable: true,
        };

        let call = cancel.child_token();
        tokio::select! {
            result = self.storage.write_to_node(request, &call) => result,
            _ = tokio::time::sleep(self.timeout) => {
                call.cancel();
                Err(StorageError::Timeout(node.name.clone()))
            }
        }
    }

    fn reset(&self) {
        self.storage.reset();
    }
}

/// Write every registered blob, one blob at a time.
pub async fn write_blobs(
    ctx: &PublishContext,
    blobs: &mut BlobSet,
    committee: &Committee,
    cancel: &CancellationToken,
) -> PublishResult<()> {
    let publish = &ctx.config.publish;
    let policy = WritePolicy {
        batch_size: publish.write_batch_size,
        retry_limit: publish.write_retry_limit,
        backoff: publish.retry_backoff,
    };

    for blob_id in blobs.ids_in_state(BlobState::Registered) {
        let Some(blob) = blobs.get_mut(&blob_id) else {
            continue;
        };
        let object_id = blob.object_id.ok_or(PublishError::NotRegistered(blob_id))?;

        let writer = StorageNodeWriter::new(
            ctx.storage.as_ref(),
            committee,
            blob,
            object_id,
            publish.node_write_timeout,
        );
        let confirmations = match write_with_quorum(&writer, committee, &policy, cancel).await {
            Ok(confirmations) => confirmations,
            Err(WriteError::Cancelled) => return Err(PublishError::Cancelled),
            Err(WriteError::QuorumNotReached { achieved, required }) => {
                return Err(PublishError::QuorumNotReached {
                    blob_id,
                    achieved,
                    required,
                })
            }
        };

        let confirmed = confirmations.iter().filter(|c| c.is_some()).count();
        info!(
            blob_id = %blob_id,
            confirmed,
            nodes = committee.len(),
            "Blob stored"
        );
        blob.mark_written(confirmations);
    }
    Ok(())
}
