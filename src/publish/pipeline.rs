//! Publish orchestration.
//!
//! Stages run strictly one after another and every transaction reaches
//! finality before the next is built:
//!
//! ```text
//! group -> resolve committee -> encode + price -> check funds
//!       -> register -> settle -> write -> certify -> create/update site
//! ```
//!
//! A failure anywhere between registration and certification deletes the
//! blob objects registered so far before the error is returned.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::blob::BlobSet;
use super::certifier::certify_blobs;
use super::committee::resolve_committee;
use super::compensator::rollback;
use super::error::{PublishError, PublishResult};
use super::grouper::group_directory;
use super::registrar::{check_funds, prepare_blobs, register_blobs};
use super::site::{create_site, site_resources, site_url, update_site};
use super::writer::write_blobs;
use crate::config::SiteConfig;
use crate::ledger::{Address, LedgerClient, ObjectCodec, ObjectId, Signer, TransactionExecutor};
use crate::storage::{Committee, StorageClient};

/// Clients and settings shared by every stage of one run.
#[derive(Clone)]
pub struct PublishContext {
    pub storage: Arc<dyn StorageClient>,
    pub ledger: Arc<dyn LedgerClient>,
    pub codec: Arc<dyn ObjectCodec>,
    pub executor: TransactionExecutor,
    pub config: SiteConfig,
    /// Recipient of the site and every blob object.
    pub owner: Address,
}

impl PublishContext {
    pub fn new(
        storage: Arc<dyn StorageClient>,
        ledger: Arc<dyn LedgerClient>,
        codec: Arc<dyn ObjectCodec>,
        signer: Arc<dyn Signer>,
        config: SiteConfig,
    ) -> Self {
        let owner = config.owner_or(signer.address());
        let executor = TransactionExecutor::new(ledger.clone(), signer, config.gas_budget);
        Self {
            storage,
            ledger,
            codec,
            executor,
            config,
            owner,
        }
    }

    /// Address that signs and pays.
    pub fn sender(&self) -> Address {
        self.executor.signer().address()
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub site_object_id: ObjectId,
    pub url: String,
    /// Whether a new site was created rather than updated.
    pub created: bool,
    pub blobs: usize,
    pub files: usize,
    /// Total storage cost paid.
    pub cost: u64,
    /// Blob objects of the previous version that were deleted.
    pub deleted_blobs: Vec<ObjectId>,
}

/// Publishes one directory as a site.
pub struct Publisher {
    ctx: PublishContext,
}

impl Publisher {
    pub fn new(ctx: PublishContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &PublishContext {
        &self.ctx
    }

    /// Run the whole pipeline for `config.path`.
    ///
    /// The configuration is validated before anything touches the network.
    pub async fn publish(&self, cancel: &CancellationToken) -> PublishResult<PublishOutcome> {
        let ctx = &self.ctx;
        ctx.config.validate()?;
        let groups = group_directory(&ctx.config.path, ctx.config.publish.max_blob_size)?;
        if groups.is_empty() {
            return Err(PublishError::NoFiles);
        }

        let committee = resolve_committee(ctx).await?;
        let mut blobs = prepare_blobs(ctx, groups, &committee).await?;
        let cost = blobs.total_cost();
        check_funds(ctx, cost).await?;

        if let Err(err) = self.store(&mut blobs, &committee, cancel).await {
            return Err(rollback(ctx, blobs.registered_object_ids(), err).await);
        }

        let resources = site_resources(&blobs);
        let (site_object_id, created, deleted_blobs) = match ctx.config.site_object_id {
            Some(site_id) => {
                let created_objects = blobs.registered_object_ids();
                let deleted = update_site(ctx, site_id, &resources, &created_objects).await?;
                (site_id, false, deleted)
            }
            None => (create_site(ctx, &resources).await?, true, Vec::new()),
        };

        let url = site_url(ctx.config.network, &site_object_id);
        info!(site = %site_object_id, url = %url, blobs = blobs.len(), "Published site");
        Ok(PublishOutcome {
            site_object_id,
            url,
            created,
            blobs: blobs.len(),
            files: blobs.file_count(),
            cost,
            deleted_blobs,
        })
    }

    /// Register, write and certify every blob.
    async fn store(
        &self,
        blobs: &mut BlobSet,
        committee: &Committee,
        cancel: &CancellationToken,
    ) -> PublishResult<()> {
        let ctx = &self.ctx;
        register_blobs(ctx, blobs).await?;

        let settle = ctx.config.publish.registration_settle;
        if !settle.is_zero() {
            info!(settle = ?settle, "Waiting for registrations to settle");
            tokio::select! {
                _ = cancel.cancelled() => return Err(PublishError::Cancelled),
                _ = tokio::time::sleep(settle) => {}
            }
        }

        write_blobs(ctx, blobs, committee, cancel).await?;
        certify_blobs(ctx, blobs, committee).await
    }
}
