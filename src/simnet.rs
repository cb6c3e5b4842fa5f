//! In-process storage network and ledger.
//!
//! Wires a [`MockStorageClient`] and a [`MockLedgerClient`] into one
//! consistent world: the committee the storage side reports has staking
//! pools on the ledger, and the configured package ids match the ones the
//! ledger interpreter writes into object types. Used by `publish --simulate`
//! and by the tests.

use std::sync::Arc;

use crate::config::{Network, SiteConfig, SystemObjects};
use crate::ledger::objects::StorageNodeInfo;
use crate::ledger::{
    Address, CborCodec, LocalSigner, MockLedgerClient, ObjectId, Signer, StakingPool,
};
use crate::publish::PublishContext;
use crate::storage::{CommitteeAssignment, MockStorageClient, SystemState};

/// Seed of the signer used when none is supplied.
const DEFAULT_SEED: [u8; 32] = [7u8; 32];

/// Simulated epoch the network starts in.
pub const START_EPOCH: u32 = 1;

fn sim_id(tag: u8, index: u16) -> ObjectId {
    let mut bytes = [0u8; 32];
    bytes[0] = 0x5e;
    bytes[1] = tag;
    bytes[30..].copy_from_slice(&index.to_be_bytes());
    ObjectId::from_bytes(bytes)
}

/// A storage committee and ledger that agree with each other.
#[derive(Clone)]
pub struct SimNetwork {
    pub storage: MockStorageClient,
    pub ledger: MockLedgerClient,
    pub system: SystemObjects,
    signer: Arc<LocalSigner>,
}

impl SimNetwork {
    /// `nodes` storage nodes with `shards_per_node` consecutive shards each.
    pub fn new(nodes: u16, shards_per_node: u16) -> Self {
        let system = SystemObjects {
            coin_type: format!("{}::wal::WAL", sim_id(0, 1)),
            system_object_id: sim_id(0, 2),
            system_package_id: sim_id(0, 3),
            blob_package_id: sim_id(0, 4),
            site_package_id: sim_id(0, 5),
            subsidies_object_id: None,
            subsidies_package_id: None,
        };

        let committee: Vec<CommitteeAssignment> = (0..nodes)
            .map(|i| CommitteeAssignment {
                node_id: sim_id(1, i),
                shard_indices: (i * shards_per_node..(i + 1) * shards_per_node).collect(),
            })
            .collect();

        let ledger = MockLedgerClient::new(&system.coin_type);
        ledger.set_epoch(START_EPOCH);
        for (index, assignment) in committee.iter().enumerate() {
            ledger.add_staking_pool(
                &system.system_package_id,
                StakingPool {
                    id: assignment.node_id,
                    node_info: StorageNodeInfo {
                        name: format!("sim-node-{}", index),
                        node_id: assignment.node_id,
                        network_address: format!("http://127.0.0.1:{}", 9000 + index),
                    },
                },
            );
        }

        let storage = MockStorageClient::new(SystemState {
            epoch: START_EPOCH,
            n_shards: nodes * shards_per_node,
            committee,
        });

        let signer = match LocalSigner::from_seed(&DEFAULT_SEED) {
            Ok(signer) => Arc::new(signer),
            Err(e) => unreachable!("fixed seed is a valid key: {}", e),
        };

        Self {
            storage,
            ledger,
            system,
            signer,
        }
    }

    /// Default configuration pointed at this network, with no waiting.
    pub fn config(&self) -> SiteConfig {
        let mut config = SiteConfig {
            network: Network::Local,
            system: self.system.clone(),
            epochs: 5,
            ..SiteConfig::default()
        };
        config.publish.registration_settle = std::time::Duration::ZERO;
        config.publish.retry_backoff = std::time::Duration::from_millis(1);
        config
    }

    /// Fill in the system ids of `config` so it targets this network.
    pub fn configure(&self, config: &mut SiteConfig) {
        config.system = self.system.clone();
    }

    pub fn signer(&self) -> Arc<LocalSigner> {
        self.signer.clone()
    }

    /// Mint a payment coin for `owner`.
    pub fn fund(&self, owner: Address, amount: u64) -> ObjectId {
        self.ledger.mint_coin(owner, amount)
    }

    /// Move both sides of the network to `epoch`.
    pub fn set_epoch(&self, epoch: u32) {
        self.ledger.set_epoch(epoch);
        self.storage.set_epoch(epoch);
    }

    /// Context signing with the default signer.
    pub fn context(&self, config: SiteConfig) -> PublishContext {
        self.context_with_signer(config, self.signer.clone())
    }

    pub fn context_with_signer(&self, config: SiteConfig, signer: Arc<dyn Signer>) -> PublishContext {
        PublishContext::new(
            Arc::new(self.storage.clone()),
            Arc::new(self.ledger.clone()),
            Arc::new(CborCodec),
            signer,
            config,
        )
    }
}
