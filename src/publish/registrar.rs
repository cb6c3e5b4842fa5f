//! Blob encoding, pricing and on-chain registration.
//!
//! ## Flow
//!
//! 1. [`prepare_blobs`] encodes every group, collapses groups whose payloads
//!    encode to the same blob id and prices each blob once.
//! 2. [`check_funds`] compares the summed cost with the sender's balance
//!    before anything is submitted.
//! 3. [`register_blobs`] submits reservation + registration transactions in
//!    chunks of `limits.registrations` blobs and maps the created blob objects
//!    back to their blob ids.

use tracing::{debug, info};

use super::blob::{Blob, BlobSet, BlobState, Registration};
use super::error::{PublishError, PublishResult};
use super::grouper::BlobGroup;
use super::pipeline::PublishContext;
use crate::config::SystemObjects;
use crate::ledger::objects::{blob_type, coin_type};
use crate::ledger::query::{all_owned_objects, get_all_objects};
use crate::ledger::{
    Address, Argument, Command, LedgerError, ObjectId, ProgrammableTransaction, TransactionBuilder,
    TransactionEffects,
};
use crate::storage::{encoded_blob_length, Committee};

/// Encode and price every group.
pub async fn prepare_blobs(
    ctx: &PublishContext,
    groups: Vec<BlobGroup>,
    committee: &Committee,
) -> PublishResult<BlobSet> {
    let epochs = ctx.config.epochs;
    let mut blobs = BlobSet::new();

    for group in groups {
        let payload = group.payload();
        let encoded = ctx.storage.encode_blob(&payload, committee).await?;
        if blobs.contains(&encoded.blob_id) {
            info!(
                group = group.group_id,
                blob_id = %encoded.blob_id,
                "Group duplicates an earlier blob, reusing it"
            );
            blobs.add_group(&encoded.blob_id, group);
            continue;
        }

        let unencoded_size = payload.len() as u64;
        let cost = ctx.storage.storage_cost(unencoded_size, epochs).await?;
        let registration = Registration {
            group_id: group.group_id,
            blob_id: encoded.blob_id,
            root_hash: encoded.root_hash,
            unencoded_size,
            encoding_type: encoded.metadata.encoding_type,
            encoded_size: encoded_blob_length(
                unencoded_size,
                committee.n_shards(),
                encoded.metadata.encoding_type,
            ),
            epochs,
            cost,
        };
        debug!(
            group = group.group_id,
            blob_id = %registration.blob_id,
            size = unencoded_size,
            encoded_size = registration.encoded_size,
            cost = cost.total_cost,
            "Encoded blob"
        );
        blobs.insert(Blob::new(group, encoded, registration));
    }

    Ok(blobs)
}

/// Fail with [`PublishError::InsufficientFunds`] when `required` exceeds the
/// sender's balance.
pub async fn check_funds(ctx: &PublishContext, required: u64) -> PublishResult<()> {
    let available = ctx
        .ledger
        .balance(&ctx.sender(), &ctx.config.system.coin_type)
        .await?;
    info!(required, available, "Storage cost");
    if required > available {
        return Err(PublishError::InsufficientFunds {
            required,
            available,
        });
    }
    Ok(())
}

/// Register every encoded blob, `limits.registrations` per transaction.
pub async fn register_blobs(ctx: &PublishContext, blobs: &mut BlobSet) -> PublishResult<()> {
    let pending = blobs.ids_in_state(BlobState::Encoded);
    let chunk_size = ctx.config.limits.registrations;
    let coin_tag = coin_type(&ctx.config.system.coin_type);

    for (chunk_index, chunk) in pending.chunks(chunk_size).enumerate() {
        let registrations: Vec<&Registration> = chunk
            .iter()
            .filter_map(|id| blobs.get(id))
            .map(|blob| &blob.registration)
            .collect();

        // Merging consumes coin objects, so the coin list is refreshed per chunk
        let coins: Vec<ObjectId> = all_owned_objects(ctx.ledger.as_ref(), &ctx.sender(), &coin_tag)
            .await?
            .into_iter()
            .map(|object| object.object_id)
            .collect();
        if coins.is_empty() {
            let required = registrations.iter().map(|r| r.cost.total_cost).sum();
            return Err(PublishError::InsufficientFunds {
                required,
                available: 0,
            });
        }

        let tx = registration_transaction(&ctx.config.system, ctx.owner, &coins, &registrations);
        info!(
            chunk = chunk_index,
            blobs = registrations.len(),
            commands = tx.commands.len(),
            "Registering blobs"
        );
        let effects = ctx.executor.execute("register blobs", tx).await?;
        map_created_blobs(ctx, &effects, blobs).await?;

        if let Some(missing) = chunk
            .iter()
            .find(|id| blobs.get(id).map_or(true, |blob| blob.object_id.is_none()))
        {
            return Err(PublishError::NotRegistered(*missing));
        }
    }

    Ok(())
}

/// Reservation + registration for `registrations`, paid from `coins`.
///
/// Coins are merged into the first one, per-blob write and storage amounts
/// are split off it, and every registered blob plus the split coins go to
/// `owner`.
pub fn registration_transaction(
    system: &SystemObjects,
    owner: Address,
    coins: &[ObjectId],
    registrations: &[&Registration],
) -> ProgrammableTransaction {
    let mut builder = TransactionBuilder::new();
    let Some((first, rest)) = coins.split_first() else {
        return builder.finish();
    };
    let coin = builder.object(*first);
    let sources: Vec<Argument> = rest.iter().map(|id| builder.object(*id)).collect();
    if !sources.is_empty() {
        builder.merge_coins(coin, sources);
    }

    let write_coins = builder.split_coins(
        coin,
        registrations.iter().map(|r| r.cost.write_cost).collect(),
    );
    let storage_coins = builder.split_coins(
        coin,
        registrations.iter().map(|r| r.cost.storage_cost).collect(),
    );

    let system_arg = builder.object(system.system_object_id);
    let subsidies = system.subsidies();
    let subsidies_arg = subsidies.map(|(object, _)| builder.object(object));
    let mut registered = Vec::with_capacity(registrations.len());

    for (i, registration) in registrations.iter().enumerate() {
        let storage = builder.command(Command::ReserveSpace {
            package: subsidies.map_or(system.system_package_id, |(_, package)| package),
            system: system_arg,
            subsidies: subsidies_arg,
            encoded_size: registration.encoded_size,
            epochs: registration.epochs,
            payment: storage_coins[i],
        });
        let blob = builder.command(Command::RegisterBlob {
            package: system.blob_package_id,
            system: system_arg,
            storage,
            blob_id: registration.blob_id,
            root_hash: registration.root_hash,
            size: registration.unencoded_size,
            encoding_type: registration.encoding_type.tag(),
            deletable: true,
            payment: write_coins[i],
        });
        registered.push(blob);
    }

    registered.extend(storage_coins);
    registered.extend(write_coins);
    builder.transfer_objects(registered, owner);
    builder.finish()
}

/// Attach the blob objects created by `effects` to their blobs.
async fn map_created_blobs(
    ctx: &PublishContext,
    effects: &TransactionEffects,
    blobs: &mut BlobSet,
) -> PublishResult<()> {
    let created: Vec<ObjectId> = effects.created.iter().map(|c| c.object_id).collect();
    let blob_tag = blob_type(&ctx.config.system.blob_package_id);

    for object in get_all_objects(ctx.ledger.as_ref(), &created).await? {
        if object.type_tag != blob_tag {
            continue;
        }
        let decoded = ctx
            .codec
            .decode_blob(&object.contents)
            .map_err(LedgerError::from)?;
        match blobs.get_mut(&decoded.blob_id) {
            Some(blob) => {
                debug!(blob_id = %decoded.blob_id, object = %object.object_id, "Registered blob");
                blob.mark_registered(object.object_id);
            }
            None => {
                return Err(PublishError::MissingObject(format!(
                    "created blob {} does not belong to this run",
                    decoded.blob_id
                )))
            }
        }
    }
    Ok(())
}
