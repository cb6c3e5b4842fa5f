mod cli;

use clap::Parser;
use cli::Cli;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use blobsite::config::{LoggingConfig, SiteConfig};

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
fn init_logging(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let logging = if config_path.exists() {
        SiteConfig::load(config_path)?.logging
    } else {
        LoggingConfig::default()
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match &logging.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match init_logging(&cli.config) {
        Ok(()) => cli::execute(cli).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
