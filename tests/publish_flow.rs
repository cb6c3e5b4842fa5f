//! End-to-end publish scenarios
//!
//! Each test builds a site tree in a temp dir and drives the whole pipeline
//! against an in-process network:
//! 1. Create, then update with old-blob cleanup
//! 2. Expired blobs survive an update
//! 3. Failing nodes within the fault budget
//! 4. Quorum shortfall and compensation
//! 5. Compensation failure keeps the original error
//! 6. Funds, chain failures, cancellation and missing sites

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use blobsite::config::SiteConfig;
use blobsite::ledger::{Argument, Command, CommandKind, ObjectId, Signer};
use blobsite::publish::{PublishError, PublishOutcome, PublishResult, Publisher};
use blobsite::simnet::SimNetwork;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const FUNDS: u64 = 1_000_000;

fn write_site(root: &Path, files: &[(&str, &str)]) {
    for (path, contents) in files {
        let full = root.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, contents).unwrap();
    }
}

fn funded_network(nodes: u16, shards_per_node: u16) -> SimNetwork {
    let net = SimNetwork::new(nodes, shards_per_node);
    net.fund(net.signer().address(), FUNDS);
    net
}

fn site_config(net: &SimNetwork, root: &Path) -> SiteConfig {
    let mut config = net.config();
    config.path = root.to_path_buf();
    config
}

async fn publish(net: &SimNetwork, config: SiteConfig) -> PublishResult<PublishOutcome> {
    Publisher::new(net.context(config))
        .publish(&CancellationToken::new())
        .await
}

fn transactions_with(net: &SimNetwork, kind: CommandKind) -> usize {
    net.ledger
        .transactions()
        .iter()
        .filter(|tx| tx.kind.contains(kind))
        .count()
}

/// Scenario 1: Create, then update
///
/// a) Three files become three certified blobs and a new site
/// b) Routes map every page to itself and `/index.html` to `/*`
/// c) Updating drops a page and changes a stylesheet
/// d) Blobs of the dropped page and the old stylesheet are deleted
/// e) The unchanged page keeps its blob id, now backed by the new object
#[tokio::test]
async fn test_scenario_1_create_then_update() {
    let net = funded_network(4, 2);
    let owner = net.signer().address();
    let dir = TempDir::new().unwrap();
    write_site(
        dir.path(),
        &[
            ("index.html", "<h1>home</h1>"),
            ("about.html", "<h1>about</h1>"),
            ("style.css", "h1 { color: red }"),
        ],
    );

    let created = publish(&net, site_config(&net, dir.path())).await.unwrap();
    assert!(created.created);
    assert_eq!(created.blobs, 3);
    assert_eq!(created.files, 3);
    assert!(created.url.ends_with(".localhost:3000"));

    let site = created.site_object_id;
    assert_eq!(net.ledger.site_name(&site), Some("default-site".to_string()));
    let resources = net.ledger.site_resources(&site);
    let paths: Vec<&str> = resources.keys().map(String::as_str).collect();
    assert_eq!(paths, vec!["/about.html", "/index.html", "/style.css"]);
    assert_eq!(
        resources["/style.css"].headers.get("content-type").map(String::as_str),
        Some("text/css")
    );
    assert_eq!(
        resources["/style.css"].headers.get("content-encoding").map(String::as_str),
        Some("identity")
    );
    assert!(resources.values().all(|r| r.range.is_none()));

    let routes = net.ledger.site_routes(&site).unwrap();
    assert_eq!(routes.get("/*").map(String::as_str), Some("/index.html"));
    assert_eq!(routes.get("/about.html").map(String::as_str), Some("/about.html"));

    let blobs = net.ledger.owned_blobs(&owner);
    assert_eq!(blobs.len(), 3);
    assert!(blobs.iter().all(|b| b.certified_epoch == Some(1) && b.deletable));

    // Second version: about.html removed, style.css changed
    fs::remove_file(dir.path().join("about.html")).unwrap();
    write_site(dir.path(), &[("style.css", "h1 { color: blue }")]);
    let index_blob = resources["/index.html"].blob_id;

    let mut config = site_config(&net, dir.path());
    config.site_object_id = Some(site);
    let updated = publish(&net, config).await.unwrap();

    assert!(!updated.created);
    assert_eq!(updated.site_object_id, site);
    // about.html, the old stylesheet and the superseded index.html object
    assert_eq!(updated.deleted_blobs.len(), 3);
    for id in &updated.deleted_blobs {
        assert!(!net.ledger.exists(id));
    }

    let resources = net.ledger.site_resources(&site);
    let paths: Vec<&str> = resources.keys().map(String::as_str).collect();
    assert_eq!(paths, vec!["/index.html", "/style.css"]);
    assert_eq!(resources["/index.html"].blob_id, index_blob);

    let routes = net.ledger.site_routes(&site).unwrap();
    assert_eq!(routes.len(), 1);

    // Only this run's objects for index.html and the new stylesheet remain
    let remaining = net.ledger.owned_blobs(&owner);
    assert_eq!(remaining.len(), 2);
    assert_eq!(remaining.iter().filter(|b| b.blob_id == index_blob).count(), 1);
    assert!(remaining.iter().all(|b| !updated.deleted_blobs.contains(&b.id)));
}

/// Republishing unchanged content does not accumulate blob objects
#[tokio::test]
async fn test_unchanged_republish_keeps_object_count_flat() {
    let net = funded_network(4, 1);
    let owner = net.signer().address();
    let dir = TempDir::new().unwrap();
    write_site(dir.path(), &[("index.html", "<p>same</p>")]);

    let created = publish(&net, site_config(&net, dir.path())).await.unwrap();
    let blob_id = net.ledger.owned_blobs(&owner)[0].blob_id;
    let mut config = site_config(&net, dir.path());
    config.site_object_id = Some(created.site_object_id);

    for _ in 0..3 {
        let before = net.ledger.owned_blobs(&owner);
        let updated = publish(&net, config.clone()).await.unwrap();

        assert_eq!(updated.deleted_blobs, vec![before[0].id]);
        let after = net.ledger.owned_blobs(&owner);
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].blob_id, blob_id);
        assert_ne!(after[0].id, before[0].id);
    }

    let resources = net.ledger.site_resources(&created.site_object_id);
    assert_eq!(resources["/index.html"].blob_id, blob_id);
}

/// Scenario 2: Blobs whose storage already ran out are not deleted
#[tokio::test]
async fn test_scenario_2_expired_blobs_kept_on_update() {
    let net = funded_network(4, 1);
    let dir = TempDir::new().unwrap();
    write_site(dir.path(), &[("index.html", "v1")]);

    let created = publish(&net, site_config(&net, dir.path())).await.unwrap();
    let old = net.ledger.owned_blobs(&net.signer().address());
    assert_eq!(old[0].storage.end_epoch, 6);

    net.set_epoch(7);
    write_site(dir.path(), &[("index.html", "v2")]);
    let mut config = site_config(&net, dir.path());
    config.site_object_id = Some(created.site_object_id);

    let updated = publish(&net, config).await.unwrap();
    assert!(updated.deleted_blobs.is_empty());
    assert!(net.ledger.exists(&old[0].id));
    assert_eq!(transactions_with(&net, CommandKind::DeleteBlob), 0);
}

/// Scenario 3: Three of ten single-shard nodes fail, quorum is seven
#[tokio::test]
async fn test_scenario_3_quorum_despite_failing_nodes() {
    let net = funded_network(10, 1);
    for node in [0, 4, 9] {
        net.storage.fail_node(node);
    }
    let dir = TempDir::new().unwrap();
    write_site(dir.path(), &[("index.html", "<p>still up</p>")]);

    let outcome = publish(&net, site_config(&net, dir.path())).await.unwrap();
    assert!(outcome.created);

    // Quorum came from the first pass, so failed nodes were never retried
    assert_eq!(net.storage.write_attempts(0), 1);
    assert_eq!(net.storage.total_write_attempts(), 10);
    let blobs = net.ledger.owned_blobs(&net.signer().address());
    assert!(blobs[0].certified_epoch.is_some());
}

/// Scenario 4: Four failures leave six of seven shards, blobs are deleted
#[tokio::test]
async fn test_scenario_4_shortfall_compensates() {
    let net = funded_network(10, 1);
    for node in 0..4 {
        net.storage.fail_node(node);
    }
    let dir = TempDir::new().unwrap();
    write_site(dir.path(), &[("index.html", "a"), ("page.html", "b")]);

    let err = publish(&net, site_config(&net, dir.path())).await.unwrap_err();
    match err {
        PublishError::QuorumNotReached {
            achieved, required, ..
        } => {
            assert_eq!(achieved, 6);
            assert_eq!(required, 7);
        }
        other => panic!("Expected QuorumNotReached, got {:?}", other),
    }

    // Initial attempt plus the full retry budget
    let retry_limit = net.config().publish.write_retry_limit;
    assert_eq!(net.storage.write_attempts(0), 1 + retry_limit as usize);

    assert!(net.ledger.owned_blobs(&net.signer().address()).is_empty());
    assert_eq!(transactions_with(&net, CommandKind::DeleteBlob), 1);
    assert_eq!(transactions_with(&net, CommandKind::CertifyBlob), 0);
    assert_eq!(transactions_with(&net, CommandKind::NewSite), 0);

    // The rollback deletes exactly the two objects registration created
    let transactions = net.ledger.transactions();
    let effects = net.ledger.effects();
    let register = transactions
        .iter()
        .position(|tx| tx.kind.contains(CommandKind::RegisterBlob))
        .unwrap();
    let rollback = transactions
        .iter()
        .position(|tx| tx.kind.contains(CommandKind::DeleteBlob))
        .unwrap();

    let deleted: HashSet<ObjectId> = transactions[rollback]
        .kind
        .commands
        .iter()
        .filter_map(|command| match command {
            Command::DeleteBlob {
                blob: Argument::Object(id),
                ..
            } => Some(*id),
            _ => None,
        })
        .collect();
    let created: HashSet<ObjectId> = effects[register]
        .created
        .iter()
        .map(|object| object.object_id)
        .filter(|id| deleted.contains(id))
        .collect();

    assert_eq!(deleted.len(), 2);
    assert_eq!(created, deleted);
    let reclaimed: HashSet<ObjectId> = effects[rollback].deleted.iter().copied().collect();
    assert!(deleted.is_subset(&reclaimed));
    for id in &deleted {
        assert!(!net.ledger.exists(id));
    }
}

/// Scenario 5: A failing compensation does not mask the quorum error
#[tokio::test]
async fn test_scenario_5_failed_compensation_keeps_original_error() {
    let net = funded_network(10, 1);
    for node in 0..4 {
        net.storage.fail_node(node);
    }
    net.ledger.fail_command(CommandKind::DeleteBlob);
    let dir = TempDir::new().unwrap();
    write_site(dir.path(), &[("index.html", "a")]);

    let err = publish(&net, site_config(&net, dir.path())).await.unwrap_err();
    assert!(matches!(err, PublishError::QuorumNotReached { .. }));

    // The delete was attempted and rejected, so the blob is still there
    let blobs = net.ledger.owned_blobs(&net.signer().address());
    assert_eq!(blobs.len(), 1);
    assert_eq!(blobs[0].certified_epoch, None);
}

/// Scenario 6a: Not enough balance fails before any transaction
#[tokio::test]
async fn test_scenario_6_insufficient_funds() {
    let net = SimNetwork::new(4, 1);
    net.fund(net.signer().address(), 100);
    let dir = TempDir::new().unwrap();
    write_site(dir.path(), &[("index.html", "a")]);

    let err = publish(&net, site_config(&net, dir.path())).await.unwrap_err();
    match err {
        PublishError::InsufficientFunds {
            required,
            available,
        } => {
            assert!(required > available);
            assert_eq!(available, 100);
        }
        other => panic!("Expected InsufficientFunds, got {:?}", other),
    }
    assert!(net.ledger.transactions().is_empty());
}

/// Scenario 6b: A chain failure during certification deletes the blobs
#[tokio::test]
async fn test_scenario_6_certification_failure_compensates() {
    let net = funded_network(4, 1);
    net.ledger.fail_command(CommandKind::CertifyBlob);
    let dir = TempDir::new().unwrap();
    write_site(dir.path(), &[("index.html", "a"), ("b.css", "b")]);

    let err = publish(&net, site_config(&net, dir.path())).await.unwrap_err();
    assert!(matches!(err, PublishError::Ledger(_)));
    assert!(net.ledger.owned_blobs(&net.signer().address()).is_empty());
}

/// Scenario 6c: Cancelling before the writes start
#[tokio::test]
async fn test_scenario_6_cancelled_run_compensates() {
    let net = funded_network(4, 1);
    let dir = TempDir::new().unwrap();
    write_site(dir.path(), &[("index.html", "a")]);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = Publisher::new(net.context(site_config(&net, dir.path())))
        .publish(&cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, PublishError::Cancelled));
    assert!(net.ledger.owned_blobs(&net.signer().address()).is_empty());
}

/// Scenario 6d: Cancelling while node writes are in flight
#[tokio::test]
async fn test_scenario_6_cancel_during_writes_compensates() {
    let net = funded_network(10, 1);
    net.storage.set_write_delay(Duration::from_secs(30));
    let dir = TempDir::new().unwrap();
    write_site(dir.path(), &[("index.html", "a")]);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = Publisher::new(net.context(site_config(&net, dir.path())))
        .publish(&cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, PublishError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(net.storage.total_write_attempts(), 10);
    assert!(net.ledger.owned_blobs(&net.signer().address()).is_empty());
    assert_eq!(transactions_with(&net, CommandKind::DeleteBlob), 1);
}

/// Scenario 6e: Nodes that never answer time out and count as transient
#[tokio::test]
async fn test_scenario_6_node_timeouts_end_in_shortfall() {
    let net = funded_network(10, 1);
    net.storage.set_write_delay(Duration::from_secs(30));
    let dir = TempDir::new().unwrap();
    write_site(dir.path(), &[("index.html", "a")]);

    let mut config = site_config(&net, dir.path());
    config.publish.node_write_timeout = Duration::from_millis(20);
    let retry_limit = config.publish.write_retry_limit;

    let err = publish(&net, config).await.unwrap_err();
    match err {
        PublishError::QuorumNotReached {
            achieved, required, ..
        } => {
            assert_eq!(achieved, 0);
            assert_eq!(required, 7);
        }
        other => panic!("Expected QuorumNotReached, got {:?}", other),
    }
    // The client is reset before every retry round
    assert_eq!(net.storage.reset_count(), retry_limit as usize);
    assert!(net.ledger.owned_blobs(&net.signer().address()).is_empty());
}

/// Scenario 6f: Updating a site that does not exist
#[tokio::test]
async fn test_scenario_6_update_of_missing_site() {
    let net = funded_network(4, 1);
    let dir = TempDir::new().unwrap();
    write_site(dir.path(), &[("index.html", "a")]);

    let mut config = site_config(&net, dir.path());
    config.site_object_id = Some(ObjectId::from_bytes([0x42; 32]));
    let err = publish(&net, config).await.unwrap_err();
    assert!(matches!(err, PublishError::MissingObject(_)));
}

/// Zero batch limits are a configuration error, not a panic
#[tokio::test]
async fn test_zero_limits_rejected_before_any_transaction() {
    let net = funded_network(4, 1);
    let dir = TempDir::new().unwrap();
    write_site(dir.path(), &[("index.html", "a")]);

    for field in ["registrations", "certifications", "site_resources", "deletions"] {
        let mut config = site_config(&net, dir.path());
        match field {
            "registrations" => config.limits.registrations = 0,
            "certifications" => config.limits.certifications = 0,
            "site_resources" => config.limits.site_resources = 0,
            _ => config.limits.deletions = 0,
        }

        let err = publish(&net, config).await.unwrap_err();
        match err {
            PublishError::Config(e) => assert!(e.to_string().contains(field)),
            other => panic!("Expected Config error for {}, got {:?}", field, other),
        }
    }
    assert!(net.ledger.transactions().is_empty());
}

/// An empty directory is rejected before anything is submitted
#[tokio::test]
async fn test_empty_directory_has_no_files() {
    let net = funded_network(4, 1);
    let dir = TempDir::new().unwrap();

    let err = publish(&net, site_config(&net, dir.path())).await.unwrap_err();
    assert!(matches!(err, PublishError::NoFiles));
    assert!(net.ledger.transactions().is_empty());
}

/// A missing directory is a grouping error
#[tokio::test]
async fn test_missing_directory_rejected() {
    let net = funded_network(4, 1);
    let dir = TempDir::new().unwrap();

    let err = publish(&net, site_config(&net, &dir.path().join("nope")))
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::Grouping(_)));
}
