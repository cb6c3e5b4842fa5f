use clap::{Parser, Subcommand};
use std::path::PathBuf;

use blobsite::config::DEFAULT_CONFIG_FILE;

pub mod credentials;
pub mod init;
pub mod manifest;
pub mod publish;
pub mod version;

#[derive(Parser)]
#[command(name = "blobsite")]
#[command(author = "Blobsite Project")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Publish a static site to decentralized blob storage", long_about = None)]
pub struct Cli {
    /// Path to the site configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Publish a directory as a new site, or update an existing one
    Publish {
        /// Directory to publish (overrides `path` in the config)
        #[arg(long)]
        path: Option<PathBuf>,

        /// File holding the hex-encoded Ed25519 seed of the signer
        #[arg(long)]
        key_file: Option<PathBuf>,

        /// Existing site to update (overrides `site_object_id` in the config)
        #[arg(long)]
        site_object_id: Option<String>,

        /// Storage duration in epochs (overrides `epochs` in the config)
        #[arg(long)]
        epochs: Option<u32>,

        /// Run against an in-process simulated network
        #[arg(long)]
        simulate: bool,
    },

    /// Write `.well-known/site_manifest.json` without publishing anything
    Manifest {
        /// Directory to describe (overrides `path` in the config)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Resolve the committee from an in-process simulated network
        #[arg(long)]
        simulate: bool,
    },

    /// Write a commented default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display version information
    Version,
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Publish {
            path,
            key_file,
            site_object_id,
            epochs,
            simulate,
        } => {
            let options = publish::PublishOptions {
                path,
                key_file,
                site_object_id,
                epochs,
                simulate,
            };
            publish::execute(&cli.config, options).await
        }
        Commands::Manifest { path, simulate } => {
            manifest::execute(&cli.config, path, simulate).await
        }
        Commands::Init { force } => init::execute(&cli.config, force),
        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}
