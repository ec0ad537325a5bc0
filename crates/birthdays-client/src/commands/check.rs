//! `birthdays check`: connection and credential check.

use birthdays_providers::ContactProvider;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Probes the address book URL with the configured credentials.
///
/// Failures are reported as `invalid_auth`, `cannot_connect` or `unknown`.
pub async fn run(config: &ClientConfig) -> ClientResult<()> {
    let provider = super::carddav_provider(config)?;
    let url = provider.config().url_str().to_string();
    debug!(url = %url, "Checking connection");

    match provider.check_connection().await {
        Ok(()) => {
            println!("ok: {} is reachable", url);
            Ok(())
        }
        Err(e) => Err(ClientError::Check {
            reason: e.code().check_reason(),
            message: e.to_string(),
        }),
    }
}
