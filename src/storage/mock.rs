//! Mock storage network for testing.
//!
//! Encoding here is a toy striping of the input across shards, not an erasure
//! code: it only preserves the properties the pipeline relies on (deterministic
//! ids, committee-sized sliver sets, per-node confirmations).

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::committee::Committee;
use super::encoding::{encoded_blob_length, EncodingType};
use super::traits::{NodeWriteRequest, StorageClient, StorageError, StorageResult};
use super::types::{
    BlobCertificate, BlobId, BlobMetadata, EncodedBlob, Sliver, SliverPairHashes,
    SliversForNode, StorageConfirmation, StorageCost, SystemState,
};

/// Pricing unit for storage reservations (1 MiB).
pub const STORAGE_UNIT: u64 = 1024 * 1024;

/// Mock storage client for testing.
#[derive(Clone)]
pub struct MockStorageClient {
    state: Arc<Mutex<MockState>>,
}

struct MockState {
    system: SystemState,
    storage_price: u64,
    write_price: u64,
    failing_nodes: HashSet<usize>,
    transient_failures: HashMap<usize, usize>,
    write_attempts: HashMap<usize, usize>,
    write_delay: Option<Duration>,
    resets: usize,
}

enum WriteOutcome {
    Reject,
    Transient,
    Store(Option<Duration>),
}

fn sha256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

impl MockStorageClient {
    /// Create a mock serving `system`.
    pub fn new(system: SystemState) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                system,
                storage_price: 100,
                write_price: 20,
                failing_nodes: HashSet::new(),
                transient_failures: HashMap::new(),
                write_attempts: HashMap::new(),
                write_delay: None,
                resets: 0,
            })),
        }
    }

    /// Set per-unit prices (per epoch for storage, once for writes).
    pub fn set_prices(&self, storage_price: u64, write_price: u64) {
        let mut s = self.state.lock().unwrap();
        s.storage_price = storage_price;
        s.write_price = write_price;
    }

    pub fn set_epoch(&self, epoch: u32) {
        self.state.lock().unwrap().system.epoch = epoch;
    }

    /// Make every write to `node_index` fail permanently.
    pub fn fail_node(&self, node_index: usize) {
        self.state.lock().unwrap().failing_nodes.insert(node_index);
    }

    /// Make the next `times` writes to `node_index` fail with a network error.
    pub fn fail_node_transiently(&self, node_index: usize, times: usize) {
        self.state
            .lock()
            .unwrap()
            .transient_failures
            .insert(node_index, times);
    }

    /// Delay every successful write, so cancellation can be observed.
    pub fn set_write_delay(&self, delay: Duration) {
        self.state.lock().unwrap().write_delay = Some(delay);
    }

    /// Number of write attempts made against `node_index`.
    pub fn write_attempts(&self, node_index: usize) -> usize {
        self.state
            .lock()
            .unwrap()
            .write_attempts
            .get(&node_index)
            .copied()
            .unwrap_or(0)
    }

    /// Total write attempts across all nodes.
    pub fn total_write_attempts(&self) -> usize {
        self.state.lock().unwrap().write_attempts.values().sum()
    }

    /// Number of times [`StorageClient::reset`] was called.
    pub fn reset_count(&self) -> usize {
        self.state.lock().unwrap().resets
    }

    fn confirmation_message(blob_id: &BlobId, epoch: u32) -> Vec<u8> {
        let mut message = blob_id.as_bytes().to_vec();
        message.extend_from_slice(&epoch.to_le_bytes());
        message
    }
}

#[async_trait]
impl StorageClient for MockStorageClient {
    async fn system_state(&self) -> StorageResult<SystemState> {
        Ok(self.state.lock().unwrap().system.clone())
    }

    async fn encode_blob(&self, data: &[u8], committee: &Committee) -> StorageResult<EncodedBlob> {
        let n_shards = committee.n_shards();
        if n_shards == 0 {
            return Err(StorageError::Encoding("committee has no shards".to_string()));
        }

        let blob_id = BlobId::from_bytes(sha256(&[&n_shards.to_le_bytes(), data]));
        let stripe = data.len().max(1).div_ceil(usize::from(n_shards));

        let mut slivers_by_node = vec![SliversForNode::default(); committee.len()];
        let mut hashes = Vec::with_capacity(usize::from(n_shards));

        for shard in 0..n_shards {
            let start = (usize::from(shard) * stripe).min(data.len());
            let end = (start + stripe).min(data.len());
            let primary = data[start..end].to_vec();
            let secondary = sha256(&[&shard.to_le_bytes(), &primary]).to_vec();

            hashes.push(SliverPairHashes {
                primary: sha256(&[&primary]),
                secondary: sha256(&[&secondary]),
            });

            if let Some(node) = committee.node_for_shard(shard) {
                let slivers = &mut slivers_by_node[node.node_index];
                slivers.primary.push(Sliver {
                    shard_index: shard,
                    data: primary,
                });
                slivers.secondary.push(Sliver {
                    shard_index: shard,
                    data: secondary,
                });
            }
        }

        let mut root = Sha256::new();
        for pair in &hashes {
            root.update(pair.primary);
            root.update(pair.secondary);
        }

        Ok(EncodedBlob {
            blob_id,
            metadata: BlobMetadata {
                encoding_type: EncodingType::Rs2,
                unencoded_length: data.len() as u64,
                hashes,
            },
            root_hash: root.finalize().into(),
            slivers_by_node,
        })
    }

    async fn storage_cost(&self, unencoded_size: u64, epochs: u32) -> StorageResult<StorageCost> {
        let s = self.state.lock().unwrap();
        let encoded = encoded_blob_length(unencoded_size, s.system.n_shards, EncodingType::Rs2);
        let units = encoded.div_ceil(STORAGE_UNIT);

        let storage_cost = units * s.storage_price * u64::from(epochs);
        let write_cost = units * s.write_price;
        Ok(StorageCost {
            storage_cost,
            write_cost,
            total_cost: storage_cost + write_cost,
        })
    }

    async fn write_to_node(
        &self,
        request: NodeWriteRequest<'_>,
        cancel: &CancellationToken,
    ) -> StorageResult<StorageConfirmation> {
        let node_index = request.node.node_index;
        let node_name = request.node.name.clone();

        let (outcome, epoch) = {
            let mut s = self.state.lock().unwrap();
            *s.write_attempts.entry(node_index).or_insert(0) += 1;

            let outcome = if s.failing_nodes.contains(&node_index) {
                WriteOutcome::Reject
            } else {
                match s.transient_failures.get_mut(&node_index) {
                    Some(remaining) if *remaining > 0 => {
                        *remaining -= 1;
                        WriteOutcome::Transient
                    }
                    _ => WriteOutcome::Store(s.write_delay),
                }
            };
            (outcome, s.system.epoch)
        };

        if cancel.is_cancelled() {
            return Err(StorageError::Cancelled(node_name));
        }

        match outcome {
            WriteOutcome::Reject => Err(StorageError::Rejected {
                node: node_name,
                reason: "node unavailable".to_string(),
            }),
            WriteOutcome::Transient => Err(StorageError::Network {
                node: node_name,
                reason: "connection refused".to_string(),
            }),
            WriteOutcome::Store(delay) => {
                if let Some(delay) = delay {
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(StorageError::Cancelled(node_name)),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }

                let message = Self::confirmation_message(&request.blob_id, epoch);
                let signature = sha256(&[request.node.node_id.as_bytes(), &message]).to_vec();
                Ok(StorageConfirmation {
                    serialized_message: message,
                    signature,
                })
            }
        }
    }

    async fn certify(
        &self,
        blob_id: &BlobId,
        confirmations: &[Option<StorageConfirmation>],
        committee: &Committee,
    ) -> StorageResult<BlobCertificate> {
        let mut signers = Vec::new();
        let mut achieved = 0;
        let mut aggregate = Sha256::new();

        for (node_index, confirmation) in confirmations.iter().enumerate() {
            if let Some(confirmation) = confirmation {
                signers.push(node_index as u16);
                achieved += committee.shard_count(node_index);
                aggregate.update(&confirmation.signature);
            }
        }

        let required = committee.quorum();
        if achieved < required {
            return Err(StorageError::NotEnoughConfirmations {
                blob_id: *blob_id,
                achieved,
                required,
            });
        }

        Ok(BlobCertificate {
            signers,
            serialized_message: Self::confirmation_message(blob_id, committee.epoch()),
            signature: aggregate.finalize().to_vec(),
        })
    }

    fn reset(&self) {
        self.state.lock().unwrap().resets += 1;
    }
}
