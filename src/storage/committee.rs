//! Storage committee: the ordered node set and its shard assignment.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::encoding::quorum_shards;
use crate::ledger::ObjectId;

/// A storage node and the shards it serves in the current epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageNode {
    pub node_id: ObjectId,
    pub name: String,
    pub network_url: String,
    pub shard_indices: Vec<u16>,
    /// Ordinal position within the committee.
    pub node_index: usize,
}

impl StorageNode {
    pub fn shard_count(&self) -> u64 {
        self.shard_indices.len() as u64
    }
}

/// Ordered committee plus a shard-index lookup.
///
/// Fetched once per run and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committee {
    epoch: u32,
    n_shards: u16,
    nodes: Vec<StorageNode>,
    by_shard_index: HashMap<u16, usize>,
}

impl Committee {
    /// Build a committee, renumbering nodes by their position in `nodes`.
    pub fn new(epoch: u32, n_shards: u16, nodes: Vec<StorageNode>) -> Self {
        let mut by_shard_index = HashMap::new();
        let nodes: Vec<StorageNode> = nodes
            .into_iter()
            .enumerate()
            .map(|(position, mut node)| {
                node.node_index = position;
                for shard in &node.shard_indices {
                    by_shard_index.insert(*shard, position);
                }
                node
            })
            .collect();

        Self {
            epoch,
            n_shards,
            nodes,
            by_shard_index,
        }
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Total shard count `n`.
    pub fn n_shards(&self) -> u16 {
        self.n_shards
    }

    pub fn nodes(&self) -> &[StorageNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, node_index: usize) -> Option<&StorageNode> {
        self.nodes.get(node_index)
    }

    /// Node serving `shard_index`, if any.
    pub fn node_for_shard(&self, shard_index: u16) -> Option<&StorageNode> {
        self.by_shard_index
            .get(&shard_index)
            .and_then(|position| self.nodes.get(*position))
    }

    /// Number of shards held by the node at `node_index` (0 if unknown).
    pub fn shard_count(&self, node_index: usize) -> u64 {
        self.nodes
            .get(node_index)
            .map(StorageNode::shard_count)
            .unwrap_or(0)
    }

    /// Shard coverage a write must reach.
    pub fn quorum(&self) -> u64 {
        quorum_shards(self.n_shards)
    }
}
