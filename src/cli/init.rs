use std::path::Path;

use blobsite::config::{ConfigError, SiteConfig};

/// Write a commented default configuration to `config_path`.
pub fn execute(config_path: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if config_path.exists() && !force {
        return Err(ConfigError::Invalid(format!(
            "'{}' already exists (use --force to overwrite)",
            config_path.display()
        ))
        .into());
    }

    SiteConfig::create_default(config_path)?;
    println!("Created: {}", config_path.display());
    println!("Fill in the [system] section before publishing to a live network.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("site.config.toml");

        execute(&path, false).unwrap();
        let config = SiteConfig::load(&path).unwrap();
        assert_eq!(config.site_name, "default-site");
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("site.config.toml");
        std::fs::write(&path, "site_name = \"mine\"\n").unwrap();

        assert!(execute(&path, false).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "site_name = \"mine\"\n");

        execute(&path, true).unwrap();
        assert_eq!(SiteConfig::load(&path).unwrap().site_name, "default-site");
    }
}
