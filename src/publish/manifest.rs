//! Site manifest.
//!
//! Lists every published file with the blob that holds it, sorted by blob
//! id, and is written to `.well-known/site_manifest.json` inside the
//! published tree. Generating it encodes the tree but submits nothing.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::blob::BlobSet;
use super::committee::resolve_committee;
use super::error::PublishResult;
use super::grouper::{group_directory, MANIFEST_PATH};
use super::pipeline::PublishContext;
use super::registrar::prepare_blobs;

/// One file in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    pub blob_id: String,
    pub blob_hash: String,
}

/// Manifest document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteManifest {
    pub resources: Vec<ManifestEntry>,
}

impl SiteManifest {
    /// Entries for every file except a previously generated manifest.
    pub fn from_blobs(blobs: &BlobSet) -> Self {
        let mut by_blob: Vec<(String, Vec<ManifestEntry>)> = blobs
            .iter()
            .map(|blob| {
                let blob_id = blob.blob_id().to_string();
                let entries = blob
                    .groups
                    .iter()
                    .flat_map(|group| &group.files)
                    .filter(|file| file.path != MANIFEST_PATH)
                    .map(|file| ManifestEntry {
                        path: file.path.clone(),
                        blob_id: blob_id.clone(),
                        blob_hash: file.hash.to_string(),
                    })
                    .collect();
                (blob_id, entries)
            })
            .collect();
        by_blob.sort_by(|a, b| a.0.cmp(&b.0));

        Self {
            resources: by_blob.into_iter().flat_map(|(_, entries)| entries).collect(),
        }
    }

    /// Write to `<root>/.well-known/site_manifest.json`.
    pub fn write(&self, root: &Path) -> PublishResult<PathBuf> {
        let path = root.join(MANIFEST_PATH.trim_start_matches('/'));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(&path, json)?;
        Ok(path)
    }
}

/// Group and encode `ctx.config.path`, then write its manifest.
pub async fn generate(ctx: &PublishContext) -> PublishResult<(SiteManifest, PathBuf)> {
    let root = &ctx.config.path;
    let groups = group_directory(root, ctx.config.publish.max_blob_size)?;
    let committee = resolve_committee(ctx).await?;
    let blobs = prepare_blobs(ctx, groups, &committee).await?;

    let manifest = SiteManifest::from_blobs(&blobs);
    let path = manifest.write(root)?;
    info!(path = %path.display(), resources = manifest.resources.len(), "Wrote site manifest");
    Ok((manifest, path))
}
