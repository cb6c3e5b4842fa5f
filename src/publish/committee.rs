//! Committee resolution.
//!
//! The storage network reports the shard assignment; node names and
//! endpoints live in the committee members' staking pools on the ledger.
//! Both are fetched once per run.

use std::collections::HashMap;
use tracing::{debug, info};

use super::error::{PublishError, PublishResult};
use super::pipeline::PublishContext;
use crate::ledger::objects::staking_pool_type;
use crate::ledger::query::get_all_objects;
use crate::ledger::{LedgerError, ObjectId, StakingPool};
use crate::storage::{Committee, StorageError, StorageNode};

/// Fetch the current committee.
pub async fn resolve_committee(ctx: &PublishContext) -> PublishResult<Committee> {
    let state = ctx.storage.system_state().await?;
    if state.n_shards == 0 || state.committee.is_empty() {
        return Err(StorageError::SystemState("committee is empty".to_string()).into());
    }

    let node_ids: Vec<ObjectId> = state.committee.iter().map(|a| a.node_id).collect();
    let pool_type = staking_pool_type(&ctx.config.system.system_package_id);
    let mut pools: HashMap<ObjectId, StakingPool> = HashMap::new();
    for object in get_all_objects(ctx.ledger.as_ref(), &node_ids).await? {
        if object.type_tag != pool_type {
            debug!(object = %object.object_id, type_tag = %object.type_tag, "Skipping non-pool object");
            continue;
        }
        let pool = ctx
            .codec
            .decode_staking_pool(&object.contents)
            .map_err(LedgerError::from)?;
        pools.insert(object.object_id, pool);
    }

    let mut nodes = Vec::with_capacity(state.committee.len());
    let mut assigned = 0usize;
    for assignment in state.committee {
        let pool = pools
            .remove(&assignment.node_id)
            .ok_or_else(|| PublishError::MissingObject(format!("staking pool {}", assignment.node_id)))?;
        assigned += assignment.shard_indices.len();
        nodes.push(StorageNode {
            node_id: assignment.node_id,
            name: pool.node_info.name,
            network_url: pool.node_info.network_address,
            shard_indices: assignment.shard_indices,
            node_index: 0,
        });
    }

    if assigned != usize::from(state.n_shards) {
        return Err(StorageError::SystemState(format!(
            "committee assigns {} shards, expected {}",
            assigned, state.n_shards
        ))
        .into());
    }

    let committee = Committee::new(state.epoch, state.n_shards, nodes);
    info!(
        epoch = committee.epoch(),
        n_shards = committee.n_shards(),
        nodes = committee.len(),
        quorum = committee.quorum(),
        "Resolved storage committee"
    );
    Ok(committee)
}
