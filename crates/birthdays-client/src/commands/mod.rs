//! Subcommand implementations.

pub mod check;
pub mod config;
pub mod show;
pub mod watch;

use birthdays_providers::carddav::CardDavProvider;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Builds the CardDAV provider from the `[carddav]` settings.
pub(crate) fn carddav_provider(config: &ClientConfig) -> ClientResult<CardDavProvider> {
    let settings = config.carddav.as_ref().ok_or_else(|| {
        ClientError::Config(format!(
            "no CardDAV server configured. Add to {}:\n  \
             [carddav]\n  \
             url = \"https://dav.example.com/addressbooks/me/contacts/\"\n  \
             username = \"me\"\n  \
             password = \"pass::dav/me\"\n\n  \
             Or pass --url/--username/--password",
            ClientConfig::default_path().display()
        ))
    })?;

    let provider_config = settings
        .to_provider_config()
        .map_err(ClientError::Config)?;
    Ok(CardDavProvider::new(provider_config)?)
}
