use std::fs;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

use blobsite::config::ConfigError;
use blobsite::ledger::LocalSigner;

/// Environment variable holding a hex-encoded Ed25519 seed.
pub const KEY_ENV_VAR: &str = "ED25519_PRIVATE_KEY";

/// Where the signing key comes from, checked in order
#[derive(Debug, PartialEq, Eq)]
pub enum KeySource {
    /// From --key-file /path/to/key
    File(PathBuf),
    /// From the ED25519_PRIVATE_KEY env var
    EnvVar(Zeroizing<String>),
    /// From `<config dir>/blobsite/key` when it exists
    DefaultFile(PathBuf),
}

/// Default key location: `~/.config/blobsite/key` on Linux.
pub fn default_key_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("blobsite").join("key"))
}

/// Pick the key source.
///
/// Priority: `--key-file` > env var > default key file. No source at all is
/// a configuration error, raised before anything touches the network.
pub fn determine_key_source(
    key_file: Option<PathBuf>,
    env_value: Option<String>,
    default_file: Option<PathBuf>,
) -> Result<KeySource, ConfigError> {
    if let Some(path) = key_file {
        return Ok(KeySource::File(path));
    }
    if let Some(value) = env_value.filter(|v| !v.trim().is_empty()) {
        return Ok(KeySource::EnvVar(Zeroizing::new(value)));
    }
    if let Some(path) = default_file.filter(|p| p.exists()) {
        return Ok(KeySource::DefaultFile(path));
    }
    Err(ConfigError::MissingCredentials(format!(
        "pass --key-file or set {}",
        KEY_ENV_VAR
    )))
}

/// Key source from the process environment.
pub fn key_source_from_env(key_file: Option<PathBuf>) -> Result<KeySource, ConfigError> {
    determine_key_source(key_file, std::env::var(KEY_ENV_VAR).ok(), default_key_path())
}

/// Build the signer from `source`.
pub fn load_signer(source: KeySource) -> Result<LocalSigner, ConfigError> {
    let encoded = match source {
        KeySource::File(path) | KeySource::DefaultFile(path) => read_key_file(&path)?,
        KeySource::EnvVar(value) => value,
    };

    LocalSigner::from_hex(&encoded)
        .map_err(|e| ConfigError::MissingCredentials(format!("invalid signing key: {}", e)))
}

fn read_key_file(path: &Path) -> Result<Zeroizing<String>, ConfigError> {
    let contents = Zeroizing::new(fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?);

    if contents.trim().is_empty() {
        return Err(ConfigError::MissingCredentials(format!(
            "key file '{}' is empty",
            path.display()
        )));
    }
    Ok(contents)
}
