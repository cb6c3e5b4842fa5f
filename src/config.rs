//! Site configuration file handling.
//!
//! Configuration is TOML, read from `site.config.toml` in the working
//! directory unless another path is given. A missing file is not an error:
//! the publisher falls back to the defaults below and logs a warning.
//!
//! ## Sections
//!
//! - top level: network, owner, site name, storage epochs, input path, gas
//!   budget and the site object to update (if any)
//! - `[metadata]`: display metadata attached to a newly created site
//! - `[system]`: on-chain package and object ids of the storage system
//! - `[publish]`: blob sizing and node-write retry behaviour
//! - `[limits]`: per-transaction command batching limits
//! - `[logging]`: log level and optional log file

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::ledger::{Address, ObjectId};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "site.config.toml";

/// Default log level
const DEFAULT_LOG_LEVEL: &str = "info";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Failed to write config file '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
}

/// Target network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
    Local,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
            Network::Local => write!(f, "local"),
        }
    }
}

/// Site publishing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub network: Network,

    /// Recipient of every created object; defaults to the signer's address.
    pub owner: Option<Address>,

    pub site_name: String,

    /// Storage duration in epochs.
    pub epochs: u32,

    /// Directory to publish.
    pub path: PathBuf,

    /// Upper bound for the gas of any one transaction.
    pub gas_budget: u64,

    /// Existing site to update. Absent means a new site is created.
    #[serde(alias = "site_obj_id")]
    pub site_object_id: Option<ObjectId>,

    pub metadata: SiteMetadata,

    pub system: SystemObjects,

    pub publish: PublishConfig,

    pub limits: BatchLimits,

    pub logging: LoggingConfig,
}

/// Display metadata of a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteMetadata {
    pub link: Option<String>,
    pub image_url: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub project_url: Option<String>,
    pub creator: Option<String>,
}

impl Default for SiteMetadata {
    fn default() -> Self {
        Self {
            link: None,
            image_url: None,
            name: "Blob Site".to_string(),
            description: None,
            project_url: None,
            creator: None,
        }
    }
}

/// On-chain locations of the storage system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemObjects {
    /// Payment coin type, e.g. `0x...::wal::WAL`.
    pub coin_type: String,
    pub system_object_id: ObjectId,
    pub system_package_id: ObjectId,
    pub blob_package_id: ObjectId,
    pub site_package_id: ObjectId,
    /// Subsidised reservations are used when both are set.
    pub subsidies_object_id: Option<ObjectId>,
    pub subsidies_package_id: Option<ObjectId>,
}

impl Default for SystemObjects {
    fn default() -> Self {
        Self {
            coin_type: String::new(),
            system_object_id: ObjectId::ZERO,
            system_package_id: ObjectId::ZERO,
            blob_package_id: ObjectId::ZERO,
            site_package_id: ObjectId::ZERO,
            subsidies_object_id: None,
            subsidies_package_id: None,
        }
    }
}

impl SystemObjects {
    /// Whether every required id has been filled in.
    pub fn is_configured(&self) -> bool {
        !self.coin_type.is_empty()
            && self.system_object_id != ObjectId::ZERO
            && self.system_package_id != ObjectId::ZERO
            && self.blob_package_id != ObjectId::ZERO
            && self.site_package_id != ObjectId::ZERO
    }

    /// `(object, package)` of the subsidies contract, when fully configured.
    pub fn subsidies(&self) -> Option<(ObjectId, ObjectId)> {
        match (self.subsidies_object_id, self.subsidies_package_id) {
            (Some(object), Some(package)) => Some((object, package)),
            _ => None,
        }
    }
}

/// Blob sizing and node-write behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Maximum packed size of one blob; `0` puts every file in its own blob.
    pub max_blob_size: u64,

    /// Retry rounds after the initial write pass.
    pub write_retry_limit: u32,

    /// Concurrent node writes per round.
    pub write_batch_size: usize,

    #[serde(with = "humantime_serde_compat")]
    pub retry_backoff: Duration,

    /// Pause between registration finality and the first node write.
    #[serde(with = "humantime_serde_compat")]
    pub registration_settle: Duration,

    #[serde(with = "humantime_serde_compat")]
    pub node_write_timeout: Duration,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            max_blob_size: 0,
            write_retry_limit: 5,
            write_batch_size: 10,
            retry_backoff: Duration::from_secs(10),
            registration_settle: Duration::from_secs(5),
            node_write_timeout: Duration::from_secs(60),
        }
    }
}

/// Maximum items per transaction, by transaction type.
///
/// Each limit counts items (blobs, resources), not raw commands; the
/// per-item command cost is fixed by the transaction shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchLimits {
    /// Blobs per registration transaction (reserve + register each).
    pub registrations: usize,
    /// Blobs per certification transaction.
    pub certifications: usize,
    /// Resources per site transaction (five commands each).
    pub site_resources: usize,
    /// Blobs per deletion transaction.
    pub deletions: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            registrations: 200,
            certifications: 500,
            site_resources: 100,
            deletions: 500,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            network: Network::Testnet,
            owner: None,
            site_name: "default-site".to_string(),
            epochs: 30,
            path: PathBuf::from("./dist"),
            gas_budget: 100_000_000,
            site_object_id: None,
            metadata: SiteMetadata::default(),
            system: SystemObjects::default(),
            publish: PublishConfig::default(),
            limits: BatchLimits::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: SiteConfig = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load `path`, or the defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!(path = %path.display(), "Config file not found, using default config");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::write(path, contents).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reject values no stage can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.epochs == 0 {
            return Err(ConfigError::Invalid("epochs must be at least 1".to_string()));
        }
        if self.site_name.trim().is_empty() {
            return Err(ConfigError::Invalid("site_name must not be empty".to_string()));
        }
        if self.publish.write_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "publish.write_batch_size must be at least 1".to_string(),
            ));
        }
        let limits = [
            ("registrations", self.limits.registrations),
            ("certifications", self.limits.certifications),
            ("site_resources", self.limits.site_resources),
            ("deletions", self.limits.deletions),
        ];
        if let Some((name, _)) = limits.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!(
                "limits.{} must be at least 1",
                name
            )));
        }
        Ok(())
    }

    /// Owner of created objects: the configured owner, else `signer`.
    pub fn owner_or(&self, signer: Address) -> Address {
        self.owner.unwrap_or(signer)
    }

    /// Generate default configuration content as a string with comments
    pub fn generate_default_toml() -> String {
        r#"# Site publishing configuration

# Target network: "mainnet", "testnet" or "local"
network = "testnet"

# Owner of the site and blob objects (defaults to the signer's address)
# owner = "0x..."

site_name = "default-site"

# Storage duration in epochs
epochs = 30

# Directory to publish
path = "./dist"

# Maximum gas for any one transaction
gas_budget = 100000000

# Set after the first publish to update the existing site in place
# site_object_id = "0x..."

[metadata]
name = "Blob Site"
# link = "https://example.com"
# image_url = "https://example.com/logo.png"
# description = "..."
# project_url = "https://github.com/..."
# creator = "..."

[system]
# Payment coin type and on-chain ids of the storage system
# coin_type = "0x...::wal::WAL"
# system_object_id = "0x..."
# system_package_id = "0x..."
# blob_package_id = "0x..."
# site_package_id = "0x..."

[publish]
# 0 stores every file in its own blob
max_blob_size = 0
write_retry_limit = 5
write_batch_size = 10
retry_backoff = "10s"
registration_settle = "5s"
node_write_timeout = "1m"

[limits]
registrations = 200
certifications = 500
site_resources = 100
deletions = 500

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (optional, logs to stderr if not specified)
# file = "/var/log/blobsite.log"
"#
        .to_string()
    }

    /// Create and save a default configuration file
    pub fn create_default(config_path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::write(config_path, Self::generate_default_toml()).map_err(|source| {
            ConfigError::Write {
                path: config_path.to_path_buf(),
                source,
            }
        })
    }
}

/// Durations as human-readable strings ("10s", "1m 30s").
mod humantime_serde_compat {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
