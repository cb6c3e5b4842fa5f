//! Site index on the ledger.
//!
//! A site object holds one resource per published file and a route table.
//! New sites are created together with their metadata and the first batch of
//! resources; existing sites first drop every resource they currently hold.
//! Resources beyond the first `limits.site_resources` go into follow-up
//! transactions that reference the site by id.
//!
//! ## Byte ranges
//!
//! Files packed into one blob are addressed by range. In memory a range is
//! half-open over the files' concatenated bytes; the site contract expects
//! inclusive bounds into the payload, which starts with the marker byte, so
//! `[s, e)` is emitted as `s + 1 ..= e`.
//!
//! ## Old blobs
//!
//! After an update, blob objects owned by the site owner that the previous
//! resource set used, that this run did not create and whose storage is
//! still valid are deleted and their storage returned to the owner. This
//! covers blob ids the new resource set dropped as well as ids this run
//! registered again under a fresh object.

use std::collections::HashSet;
use tracing::{debug, info};

use super::blob::BlobSet;
use super::error::{PublishError, PublishResult};
use super::pipeline::PublishContext;
use crate::config::{Network, SystemObjects};
use crate::ledger::objects::{blob_type, site_type};
use crate::ledger::query::{all_dynamic_fields, all_owned_objects, get_all_objects};
use crate::ledger::{
    Address, Argument, BlobObject, Command, LedgerError, ObjectId, ProgrammableTransaction,
    TransactionBuilder, TransactionEffects,
};
use crate::storage::{BlobId, ContentHash};

/// Suffix of the type of a site's resource fields.
const RESOURCE_TYPE_SUFFIX: &str = "::site::Resource";

/// Commands emitted per resource.
pub const COMMANDS_PER_RESOURCE: usize = 5;

/// Half-open byte range `[start, end)` of a file within its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Inclusive bounds within the marker-prefixed payload.
    pub fn on_chain(&self) -> (u64, u64) {
        (self.start + 1, self.end)
    }
}

/// Consecutive ranges for files of the given sizes.
pub fn byte_ranges(sizes: &[u64]) -> Vec<ByteRange> {
    let mut offset = 0;
    sizes
        .iter()
        .map(|size| {
            let range = ByteRange {
                start: offset,
                end: offset + size,
            };
            offset = range.end;
            range
        })
        .collect()
}

/// One file as recorded in the site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteResource {
    pub path: String,
    pub blob_id: BlobId,
    pub blob_hash: ContentHash,
    pub content_type: String,
    pub content_encoding: String,
    /// Set only for files that share their blob.
    pub range: Option<ByteRange>,
}

/// Resources for every file of every blob, in blob order.
pub fn site_resources(blobs: &BlobSet) -> Vec<SiteResource> {
    let mut resources = Vec::with_capacity(blobs.file_count());
    for blob in blobs.iter() {
        for group in &blob.groups {
            let sizes: Vec<u64> = group.files.iter().map(|f| f.size).collect();
            let ranges = byte_ranges(&sizes);
            for (file, range) in group.files.iter().zip(ranges) {
                resources.push(SiteResource {
                    path: file.path.clone(),
                    blob_id: blob.blob_id(),
                    blob_hash: file.hash,
                    content_type: file.content_type.clone(),
                    content_encoding: file.content_encoding.clone(),
                    range: group.is_packed().then_some(range),
                });
            }
        }
    }
    resources
}

/// Route table: every HTML page maps to itself, `/index.html` to `/*`.
pub fn routes(resources: &[SiteResource]) -> Vec<(String, String)> {
    resources
        .iter()
        .filter(|r| r.path.ends_with(".html"))
        .map(|r| {
            let route = if r.path == "/index.html" {
                "/*".to_string()
            } else {
                r.path.clone()
            };
            (route, r.path.clone())
        })
        .collect()
}

/// Public URL of a site.
pub fn site_url(network: Network, site_id: &ObjectId) -> String {
    let subdomain = site_id.to_base36();
    match network {
        Network::Mainnet => format!("https://{}.wal.app", subdomain),
        Network::Testnet | Network::Local => format!("http://{}.localhost:3000", subdomain),
    }
}

fn add_resource(
    builder: &mut TransactionBuilder,
    package: ObjectId,
    site: Argument,
    resource: &SiteResource,
) {
    let (start, end) = match resource.range.map(|r| r.on_chain()) {
        Some((start, end)) => (Some(start), Some(end)),
        None => (None, None),
    };
    let range = builder.command(Command::NewRangeOption {
        package,
        start,
        end,
    });
    let new_resource = builder.command(Command::NewResource {
        package,
        path: resource.path.clone(),
        blob_id: resource.blob_id,
        blob_hash: resource.blob_hash,
        range,
    });
    builder.command(Command::AddHeader {
        package,
        resource: new_resource,
        name: "content-encoding".to_string(),
        value: resource.content_encoding.clone(),
    });
    builder.command(Command::AddHeader {
        package,
        resource: new_resource,
        name: "content-type".to_string(),
        value: resource.content_type.clone(),
    });
    builder.command(Command::AddResource {
        package,
        site,
        resource: new_resource,
    });
}

fn add_routes(
    builder: &mut TransactionBuilder,
    package: ObjectId,
    site: Argument,
    routes: &[(String, String)],
    replace: bool,
) {
    if replace {
        builder.command(Command::RemoveAllRoutesIfExist { package, site });
    }
    builder.command(Command::CreateRoutes { package, site });
    for (route, path) in routes {
        builder.command(Command::InsertRoute {
            package,
            site,
            route: route.clone(),
            path: path.clone(),
        });
    }
}

/// Resource batches that follow the first one, each against `site_id`.
fn follow_up_transactions(
    package: ObjectId,
    site_id: ObjectId,
    batches: &[&[SiteResource]],
) -> Vec<ProgrammableTransaction> {
    batches
        .iter()
        .map(|batch| {
            let mut builder = TransactionBuilder::new();
            let site = builder.object(site_id);
            for resource in *batch {
                add_resource(&mut builder, package, site, resource);
            }
            builder.finish()
        })
        .collect()
}

fn empty_to_none(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.is_empty())
}

/// Create a new site holding `resources` and return its object id.
pub async fn create_site(ctx: &PublishContext, resources: &[SiteResource]) -> PublishResult<ObjectId> {
    if resources.is_empty() {
        return Err(PublishError::NoFiles);
    }
    let package = ctx.config.system.site_package_id;
    let batches: Vec<&[SiteResource]> = resources.chunks(ctx.config.limits.site_resources).collect();
    let metadata = &ctx.config.metadata;

    let mut builder = TransactionBuilder::new();
    let metadata_arg = builder.command(Command::NewMetadata {
        package,
        link: empty_to_none(&metadata.link),
        image_url: empty_to_none(&metadata.image_url),
        description: empty_to_none(&metadata.description),
        project_url: empty_to_none(&metadata.project_url),
        creator: empty_to_none(&metadata.creator),
    });
    let site = builder.command(Command::NewSite {
        package,
        name: ctx.config.site_name.clone(),
        metadata: metadata_arg,
    });
    for resource in batches[0] {
        add_resource(&mut builder, package, site, resource);
    }
    add_routes(&mut builder, package, site, &routes(resources), false);
    builder.transfer_objects(vec![site], ctx.owner);

    info!(resources = batches[0].len(), "Creating site");
    let effects = ctx.executor.execute("create site", builder.finish()).await?;
    let site_id = find_created(ctx, &effects, &site_type(&package))
        .await?
        .ok_or_else(|| PublishError::MissingObject("created site object".to_string()))?;

    for tx in follow_up_transactions(package, site_id, &batches[1..]) {
        ctx.executor.execute("add site resources", tx).await?;
    }

    info!(site = %site_id, url = %site_url(ctx.config.network, &site_id), "Site created");
    Ok(site_id)
}

/// First created object of type `type_tag`.
async fn find_created(
    ctx: &PublishContext,
    effects: &TransactionEffects,
    type_tag: &str,
) -> PublishResult<Option<ObjectId>> {
    let created: Vec<ObjectId> = effects.created.iter().map(|c| c.object_id).collect();
    Ok(get_all_objects(ctx.ledger.as_ref(), &created)
        .await?
        .into_iter()
        .find(|object| object.type_tag == type_tag)
        .map(|object| object.object_id))
}

/// Replace the resources and routes of `site_id` with `resources`.
///
/// `created_objects` are the blob objects registered by this run; they are
/// never deleted. Returns the blob objects that were deleted.
pub async fn update_site(
    ctx: &PublishContext,
    site_id: ObjectId,
    resources: &[SiteResource],
    created_objects: &[ObjectId],
) -> PublishResult<Vec<ObjectId>> {
    if resources.is_empty() {
        return Err(PublishError::NoFiles);
    }
    let package = ctx.config.system.site_package_id;
    let limit = ctx.config.limits.site_resources;

    let fields: Vec<_> = all_dynamic_fields(ctx.ledger.as_ref(), &site_id)
        .await
        .map_err(|e| match e {
            LedgerError::ObjectNotFound(_) => PublishError::missing_site(&site_id),
            other => other.into(),
        })?
        .into_iter()
        .filter(|field| field.object_type.ends_with(RESOURCE_TYPE_SUFFIX))
        .collect();
    let old_paths: Vec<String> = fields.iter().map(|f| f.name.clone()).collect();
    let field_ids: Vec<ObjectId> = fields.iter().map(|f| f.object_id).collect();
    let stale = find_stale_blobs(ctx, &field_ids, resources, created_objects).await?;

    let site = Argument::Object(site_id);
    let batches = update_batches(&old_paths, resources, limit);

    for chunk in &batches.removals {
        let mut builder = TransactionBuilder::new();
        for path in *chunk {
            remove_resource(&mut builder, package, site, path);
        }
        ctx.executor.execute("remove site resources", builder.finish()).await?;
    }

    let mut builder = TransactionBuilder::new();
    for path in batches.riding {
        remove_resource(&mut builder, package, site, path);
    }
    for resource in batches.first {
        add_resource(&mut builder, package, site, resource);
    }
    add_routes(&mut builder, package, site, &routes(resources), true);
    info!(
        site = %site_id,
        removed = old_paths.len(),
        resources = batches.first.len(),
        "Updating site"
    );
    ctx.executor.execute("update site", builder.finish()).await?;

    for tx in follow_up_transactions(package, site_id, &batches.rest) {
        ctx.executor.execute("add site resources", tx).await?;
    }
    info!(site = %site_id, url = %site_url(ctx.config.network, &site_id), "Site updated");

    let deleted: Vec<ObjectId> = stale.iter().map(|blob| blob.id).collect();
    for chunk in deleted.chunks(ctx.config.limits.deletions) {
        let tx = deletion_transaction(&ctx.config.system, ctx.owner, chunk);
        ctx.executor.execute("delete old blobs", tx).await?;
        info!(blobs = chunk.len(), "Deleted blobs no longer used by the site");
    }
    Ok(deleted)
}

/// Split of an update's removals and resources into transactions.
///
/// Removals and resources share one budget of `limit * COMMANDS_PER_RESOURCE`
/// commands per transaction, route commands aside.
#[derive(Debug)]
struct UpdateBatches<'a, T> {
    /// Removal chunks submitted on their own, before the update.
    removals: Vec<&'a [String]>,
    /// Removals carried by the update transaction.
    riding: &'a [String],
    /// Resources carried by the update transaction.
    first: &'a [T],
    /// Follow-up resource batches.
    rest: Vec<&'a [T]>,
}

fn update_batches<'a, T>(
    old_paths: &'a [String],
    resources: &'a [T],
    limit: usize,
) -> UpdateBatches<'a, T> {
    let budget = limit.max(1) * COMMANDS_PER_RESOURCE;
    let mut removals: Vec<&[String]> = old_paths.chunks(budget).collect();

    // The last removal chunk rides along only if a resource still fits
    let riding: &[String] = match removals.last().copied() {
        Some(last) if last.len() + COMMANDS_PER_RESOURCE <= budget => {
            removals.pop();
            last
        }
        _ => &[],
    };
    let room = (budget - riding.len()) / COMMANDS_PER_RESOURCE;
    let (first, rest) = resources.split_at(room.min(resources.len()));

    UpdateBatches {
        removals,
        riding,
        first,
        rest: rest.chunks(limit.max(1)).collect(),
    }
}

fn remove_resource(builder: &mut TransactionBuilder, package: ObjectId, site: Argument, path: &str) {
    builder.command(Command::RemoveResourceIfExists {
        package,
        site,
        path: path.to_string(),
    });
}

/// Owner's blob objects the old site used and the new one no longer needs.
///
/// An old object whose blob id this run registered again is superseded by
/// the new object, even though the new resources still reference the id.
async fn find_stale_blobs(
    ctx: &PublishContext,
    field_ids: &[ObjectId],
    resources: &[SiteResource],
    created_objects: &[ObjectId],
) -> PublishResult<Vec<BlobObject>> {
    let mut used = HashSet::new();
    for object in get_all_objects(ctx.ledger.as_ref(), field_ids).await? {
        let field = ctx
            .codec
            .decode_resource_field(&object.contents)
            .map_err(LedgerError::from)?;
        used.insert(field.value.blob_id);
    }
    if used.is_empty() {
        return Ok(Vec::new());
    }

    let referenced: HashSet<BlobId> = resources.iter().map(|r| r.blob_id).collect();
    let created: HashSet<ObjectId> = created_objects.iter().copied().collect();
    let epoch = ctx.storage.system_state().await?.epoch;
    let blob_tag = blob_type(&ctx.config.system.blob_package_id);

    let mut owned = Vec::new();
    for object in all_owned_objects(ctx.ledger.as_ref(), &ctx.owner, &blob_tag).await? {
        let blob = ctx
            .codec
            .decode_blob(&object.contents)
            .map_err(LedgerError::from)?;
        owned.push((object.object_id, blob));
    }
    // Blob ids now backed by an object of this run
    let recreated: HashSet<BlobId> = owned
        .iter()
        .filter(|(id, _)| created.contains(id))
        .map(|(_, blob)| blob.blob_id)
        .collect();

    let mut stale = Vec::new();
    for (object_id, blob) in owned {
        let keep = !used.contains(&blob.blob_id)
            || created.contains(&object_id)
            || blob.storage.end_epoch < epoch
            || (referenced.contains(&blob.blob_id) && !recreated.contains(&blob.blob_id));
        if !keep {
            debug!(blob_id = %blob.blob_id, object = %object_id, "Blob no longer used");
            stale.push(blob);
        }
    }
    Ok(stale)
}

/// Delete `blobs` and hand the reclaimed storage to `owner`.
pub fn deletion_transaction(
    system: &SystemObjects,
    owner: Address,
    blobs: &[ObjectId],
) -> ProgrammableTransaction {
    let mut builder = TransactionBuilder::new();
    let system_arg = builder.object(system.system_object_id);
    let mut storage = Vec::with_capacity(blobs.len());
    for blob_id in blobs {
        let blob = builder.object(*blob_id);
        storage.push(builder.command(Command::DeleteBlob {
            package: system.blob_package_id,
            system: system_arg,
            blob,
        }));
    }
    if !storage.is_empty() {
        builder.transfer_objects(storage, owner);
    }
    builder.finish()
}
