use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use blobsite::config::{ConfigError, SiteConfig};
use blobsite::ledger::{ObjectId, Signer};
use blobsite::publish::{PublishOutcome, Publisher};
use blobsite::simnet::SimNetwork;

use super::credentials::{key_source_from_env, load_signer};

/// Committee shape of the simulated network.
pub const SIM_NODES: u16 = 10;
pub const SIM_SHARDS_PER_NODE: u16 = 100;

/// Balance minted for the signer on the simulated network.
const SIM_FUNDS: u64 = 1_000_000_000_000;

/// Command-line overrides for one publish run.
#[derive(Debug, Default)]
pub struct PublishOptions {
    pub path: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    pub site_object_id: Option<String>,
    pub epochs: Option<u32>,
    pub simulate: bool,
}

/// Load the config file and apply the command-line overrides.
pub fn resolve_config(config_path: &Path, options: &PublishOptions) -> Result<SiteConfig, ConfigError> {
    let mut config = SiteConfig::load_or_default(config_path)?;

    if let Some(path) = &options.path {
        config.path = path.clone();
    }
    if let Some(epochs) = options.epochs {
        config.epochs = epochs;
    }
    if let Some(id) = &options.site_object_id {
        let id = ObjectId::from_str(id)
            .map_err(|e| ConfigError::Invalid(format!("site object id '{}': {}", id, e)))?;
        config.site_object_id = Some(id);
    }

    config.validate()?;
    if !config.path.is_dir() {
        return Err(ConfigError::Invalid(format!(
            "'{}' is not a directory",
            config.path.display()
        )));
    }
    Ok(config)
}

/// Publish a directory as a site.
///
/// ## Credentials
///
/// The signing key is read from one of these sources (in order of precedence):
/// 1. `--key-file` flag if provided
/// 2. `ED25519_PRIVATE_KEY` environment variable
/// 3. `~/.config/blobsite/key` if it exists
///
/// With `--simulate` and no key at all, the simulated network's own signer
/// is used.
///
/// ## Networks
///
/// Only the in-process simulated network has a client in this build; any
/// other target is rejected before a transaction is built.
pub async fn execute(
    config_path: &Path,
    options: PublishOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = resolve_config(config_path, &options)?;

    let signer: Option<Arc<dyn Signer>> = match key_source_from_env(options.key_file.clone()) {
        Ok(source) => Some(Arc::new(load_signer(source)?)),
        Err(e) if options.simulate => {
            info!(reason = %e, "No signing key given, using the simulated signer");
            None
        }
        Err(e) => return Err(e.into()),
    };

    if !options.simulate {
        return Err(ConfigError::Invalid(format!(
            "no ledger client for network '{}'; rerun with --simulate",
            config.network
        ))
        .into());
    }

    let net = SimNetwork::new(SIM_NODES, SIM_SHARDS_PER_NODE);
    net.configure(&mut config);
    let signer: Arc<dyn Signer> = match signer {
        Some(signer) => signer,
        None => net.signer(),
    };
    net.fund(signer.address(), SIM_FUNDS);

    let ctx = net.context_with_signer(config, signer);
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling node writes");
            interrupt.cancel();
        }
    });

    println!("Publishing {} ...", ctx.config.path.display());
    let outcome = Publisher::new(ctx).publish(&cancel).await?;
    print_outcome(&outcome);
    Ok(())
}

fn print_outcome(outcome: &PublishOutcome) {
    println!();
    if outcome.created {
        println!("Created new site: {}", outcome.site_object_id);
        println!("To update it later, add to your config:");
        println!("  site_object_id = \"{}\"", outcome.site_object_id);
    } else {
        println!("Updated site: {}", outcome.site_object_id);
        if !outcome.deleted_blobs.is_empty() {
            println!("Deleted {} blob(s) of the previous version", outcome.deleted_blobs.len());
        }
    }
    println!(
        "Stored {} file(s) in {} blob(s), cost {}",
        outcome.files, outcome.blobs, outcome.cost
    );
    println!("Browse it at: {}", outcome.url);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn site_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>hi</h1>").unwrap();
        dir
    }

    #[test]
    fn test_overrides_applied() {
        let site = site_dir();
        let options = PublishOptions {
            path: Some(site.path().to_path_buf()),
            site_object_id: Some(format!("0x{}", "ab".repeat(32))),
            epochs: Some(3),
            ..Default::default()
        };

        let config = resolve_config(&site.path().join("missing.toml"), &options).unwrap();
        assert_eq!(config.path, site.path());
        assert_eq!(config.epochs, 3);
        assert_eq!(config.site_object_id, Some(ObjectId::from_bytes([0xab; 32])));
    }

    #[test]
    fn test_zero_epochs_rejected() {
        let site = site_dir();
        let options = PublishOptions {
            path: Some(site.path().to_path_buf()),
            epochs: Some(0),
            ..Default::default()
        };

        let result = resolve_config(&site.path().join("missing.toml"), &options);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_directory_rejected() {
        let site = site_dir();
        let options = PublishOptions {
            path: Some(site.path().join("nope")),
            ..Default::default()
        };

        let result = resolve_config(&site.path().join("missing.toml"), &options);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_bad_site_object_id_rejected() {
        let site = site_dir();
        let options = PublishOptions {
            path: Some(site.path().to_path_buf()),
            site_object_id: Some("0xzz".to_string()),
            ..Default::default()
        };

        let result = resolve_config(&site.path().join("missing.toml"), &options);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_live_network_needs_simulate() {
        let site = site_dir();
        let key = site.path().join("key");
        std::fs::write(&key, "07".repeat(32)).unwrap();
        let options = PublishOptions {
            path: Some(site.path().to_path_buf()),
            key_file: Some(key),
            ..Default::default()
        };

        let err = execute(&site.path().join("missing.toml"), options).await.unwrap_err();
        assert!(err.to_string().contains("--simulate"));
    }
}
