use std::path::{Path, PathBuf};

use blobsite::config::ConfigError;
use blobsite::publish::manifest;
use blobsite::simnet::SimNetwork;

use super::publish::{resolve_config, PublishOptions, SIM_NODES, SIM_SHARDS_PER_NODE};

/// Write the site manifest for a directory.
///
/// Encoding needs the committee's shard count, so a network is still
/// required even though nothing is registered or paid for.
pub async fn execute(
    config_path: &Path,
    path: Option<PathBuf>,
    simulate: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = PublishOptions {
        path,
        simulate,
        ..Default::default()
    };
    let mut config = resolve_config(config_path, &options)?;

    if !simulate {
        return Err(ConfigError::Invalid(format!(
            "no storage client for network '{}'; rerun with --simulate",
            config.network
        ))
        .into());
    }

    let net = SimNetwork::new(SIM_NODES, SIM_SHARDS_PER_NODE);
    net.configure(&mut config);
    let (site_manifest, written) = manifest::generate(&net.context(config)).await?;

    println!(
        "Wrote {} resource(s) to {}",
        site_manifest.resources.len(),
        written.display()
    );
    Ok(())
}
