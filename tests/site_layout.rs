//! Site layout on the ledger
//!
//! Packed blobs and byte ranges, per-transaction batching limits and
//! resource replacement on update.

use std::fs;
use std::path::Path;

use blobsite::config::SiteConfig;
use blobsite::ledger::objects::RangeOption;
use blobsite::ledger::{CommandKind, Signer};
use blobsite::publish::Publisher;
use blobsite::simnet::SimNetwork;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn write_site(root: &Path, files: &[(&str, &str)]) {
    for (path, contents) in files {
        let full = root.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, contents).unwrap();
    }
}

fn network() -> SimNetwork {
    let net = SimNetwork::new(4, 1);
    net.fund(net.signer().address(), 10_000_000);
    net
}

fn site_config(net: &SimNetwork, root: &Path) -> SiteConfig {
    let mut config = net.config();
    config.path = root.to_path_buf();
    config
}

fn commands_per_tx(net: &SimNetwork, kind: CommandKind) -> Vec<usize> {
    net.ledger
        .transactions()
        .iter()
        .map(|tx| tx.kind.count(kind))
        .filter(|count| *count > 0)
        .collect()
}

#[tokio::test]
async fn test_packed_files_get_inclusive_ranges() {
    let net = network();
    let dir = TempDir::new().unwrap();
    write_site(
        dir.path(),
        &[("a.html", "aaa"), ("b.css", "bb"), ("c.js", "c")],
    );
    let mut config = site_config(&net, dir.path());
    config.publish.max_blob_size = 1_000;

    let outcome = Publisher::new(net.context(config))
        .publish(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.blobs, 1);
    assert_eq!(outcome.files, 3);

    let resources = net.ledger.site_resources(&outcome.site_object_id);
    let range = |path: &str| resources[path].range;
    // The payload starts with a marker byte, so offsets shift by one
    assert_eq!(range("/a.html"), Some(RangeOption { start: Some(1), end: Some(3) }));
    assert_eq!(range("/b.css"), Some(RangeOption { start: Some(4), end: Some(5) }));
    assert_eq!(range("/c.js"), Some(RangeOption { start: Some(6), end: Some(6) }));

    let blob_ids: Vec<_> = resources.values().map(|r| r.blob_id).collect();
    assert!(blob_ids.windows(2).all(|pair| pair[0] == pair[1]));
}

#[tokio::test]
async fn test_identical_files_share_one_blob() {
    let net = network();
    let dir = TempDir::new().unwrap();
    write_site(
        dir.path(),
        &[("one.txt", "same"), ("two.txt", "same"), ("three.txt", "other")],
    );

    let outcome = Publisher::new(net.context(site_config(&net, dir.path())))
        .publish(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.blobs, 2);
    assert_eq!(outcome.files, 3);
    assert_eq!(commands_per_tx(&net, CommandKind::RegisterBlob), vec![2]);

    let resources = net.ledger.site_resources(&outcome.site_object_id);
    assert_eq!(resources.len(), 3);
    assert_eq!(resources["/one.txt"].blob_id, resources["/two.txt"].blob_id);
}

#[tokio::test]
async fn test_batches_respect_limits() {
    let net = network();
    let dir = TempDir::new().unwrap();
    let files: Vec<(String, String)> = (0..5)
        .map(|i| (format!("page-{}.html", i), format!("<p>{}</p>", i)))
        .collect();
    let borrowed: Vec<(&str, &str)> = files.iter().map(|(p, c)| (p.as_str(), c.as_str())).collect();
    write_site(dir.path(), &borrowed);

    let mut config = site_config(&net, dir.path());
    config.limits.registrations = 2;
    config.limits.certifications = 2;
    config.limits.site_resources = 2;

    let outcome = Publisher::new(net.context(config.clone()))
        .publish(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(commands_per_tx(&net, CommandKind::RegisterBlob), vec![2, 2, 1]);
    assert_eq!(commands_per_tx(&net, CommandKind::CertifyBlob), vec![2, 2, 1]);
    assert_eq!(commands_per_tx(&net, CommandKind::AddResource), vec![2, 2, 1]);
    // Routes are created once, with the site
    assert_eq!(commands_per_tx(&net, CommandKind::CreateRoutes), vec![1]);

    let site = outcome.site_object_id;
    assert_eq!(net.ledger.site_resources(&site).len(), 5);
    assert_eq!(net.ledger.site_routes(&site).unwrap().len(), 5);

    // Update: every old resource is removed before the new ones go in
    let before = net.ledger.transactions().len();
    config.site_object_id = Some(site);
    Publisher::new(net.context(config))
        .publish(&CancellationToken::new())
        .await
        .unwrap();

    let update_txs = &net.ledger.transactions()[before..];
    let update = update_txs
        .iter()
        .find(|tx| tx.kind.contains(CommandKind::RemoveAllRoutesIfExist))
        .unwrap();
    // Five removals leave room for one five-command resource within ten
    assert_eq!(update.kind.count(CommandKind::RemoveResourceIfExists), 5);
    assert_eq!(update.kind.count(CommandKind::AddResource), 1);
    assert_eq!(commands_per_tx(&net, CommandKind::AddResource)[3..], [1, 2, 2]);
    assert_eq!(net.ledger.site_resources(&site).len(), 5);

    // Same content, so each old object is superseded by this run's copy
    let deletes: usize = update_txs
        .iter()
        .map(|tx| tx.kind.count(CommandKind::DeleteBlob))
        .sum();
    assert_eq!(deletes, 5);
    assert_eq!(net.ledger.owned_blobs(&net.signer().address()).len(), 5);
}

#[tokio::test]
async fn test_metadata_and_owner_override() {
    let net = network();
    let dir = TempDir::new().unwrap();
    write_site(dir.path(), &[("index.html", "hi")]);

    let recipient = "0x".to_string() + &"ab".repeat(32);
    let mut config = site_config(&net, dir.path());
    config.owner = Some(recipient.parse().unwrap());
    config.site_name = "docs".to_string();
    config.metadata.description = Some("Project docs".to_string());
    config.metadata.link = Some(String::new());

    let outcome = Publisher::new(net.context(config.clone()))
        .publish(&CancellationToken::new())
        .await
        .unwrap();

    let owner = config.owner.unwrap();
    assert_eq!(net.ledger.site_name(&outcome.site_object_id), Some("docs".to_string()));
    assert_eq!(net.ledger.owned_blobs(&owner).len(), 1);
    assert!(net.ledger.owned_blobs(&net.signer().address()).is_empty());

    let create = net
        .ledger
        .transactions()
        .into_iter()
        .find(|tx| tx.kind.contains(CommandKind::NewSite))
        .unwrap();
    assert_eq!(create.sender, net.signer().address());
}
