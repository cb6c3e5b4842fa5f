//! Rollback of blobs registered by a failed run.
//!
//! Once a blob object exists its storage has been paid for. When a later
//! stage fails, every object registered so far is deleted in one batch so
//! the storage returns to the owner. The deletion is best-effort: its own
//! failure is logged and the error that triggered it is what the caller
//! sees.

use tracing::{error, info, warn};

use super::error::{PublishError, PublishResult};
use super::pipeline::PublishContext;
use super::site::deletion_transaction;
use crate::ledger::ObjectId;

/// Delete `object_ids`, `limits.deletions` per transaction.
pub async fn compensate(ctx: &PublishContext, object_ids: &[ObjectId]) -> PublishResult<()> {
    for chunk in object_ids.chunks(ctx.config.limits.deletions) {
        let tx = deletion_transaction(&ctx.config.system, ctx.owner, chunk);
        ctx.executor.execute("delete registered blobs", tx).await?;
        info!(blobs = chunk.len(), "Deleted registered blobs");
    }
    Ok(())
}

/// Compensate for `err` and hand it back unchanged.
pub async fn rollback(
    ctx: &PublishContext,
    object_ids: Vec<ObjectId>,
    err: PublishError,
) -> PublishError {
    if object_ids.is_empty() {
        return err;
    }
    warn!(
        error = %err,
        blobs = object_ids.len(),
        "Publish failed after registration, deleting registered blobs"
    );
    if let Err(e) = compensate(ctx, &object_ids).await {
        error!(error = %e, "Failed to delete registered blobs");
    }
    err
}
