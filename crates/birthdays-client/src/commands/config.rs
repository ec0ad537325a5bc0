//! Configuration commands.

use std::path::Path;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::secret::SecretRef;

/// Dump the effective configuration to stdout.
///
/// Plain-text passwords are redacted; `pass::`/`env::` references are shown.
pub fn dump(config: &ClientConfig, path: &Path) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(&redacted(config))
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))?;
    println!("# config.toml ({})", path.display());
    println!("{}", toml_str);

    Ok(())
}

/// Validate the configuration.
pub fn validate(config: &ClientConfig) -> ClientResult<()> {
    config.validate().map_err(ClientError::Config)?;

    if config.carddav.is_none() {
        println!("No [carddav] section; only `show --vcf` will work.");
    }
    println!("Configuration is valid.");
    Ok(())
}

/// Show the configuration file path.
pub fn path(path: &Path) -> ClientResult<()> {
    println!("config: {}", path.display());
    Ok(())
}

fn redacted(config: &ClientConfig) -> ClientConfig {
    let mut config = config.clone();
    if let Some(ref mut carddav) = config.carddav {
        if let Some(ref mut password) = carddav.password {
            *password = SecretRef::parse(password).redacted();
        }
    }
    config
}
