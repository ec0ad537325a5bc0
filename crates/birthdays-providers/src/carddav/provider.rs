//! CardDAV contact provider.

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::ProviderResult;
use crate::provider::{BoxFuture, ContactProvider, FetchResult};

use super::client::CardDavClient;
use super::config::CardDavConfig;
use super::xml::{addressbook_query_body, parse_report_response};

const PROVIDER_NAME: &str = "carddav";

/// Fetches vCards with a `BDAY` from one address book collection.
pub struct CardDavProvider {
    client: Mutex<CardDavClient>,
    config: CardDavConfig,
}

impl CardDavProvider {
    /// Creates a new CardDAV provider with the given configuration.
    pub fn new(config: CardDavConfig) -> ProviderResult<Self> {
        let client = CardDavClient::new(config.clone())?;

        Ok(Self {
            client: Mutex::new(client),
            config,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CardDavConfig {
        &self.config
    }

    async fn query(&self) -> ProviderResult<FetchResult> {
        let url = self.config.url_str();
        let body = addressbook_query_body()?;

        debug!(url = %url, "Querying address book for birthdays");

        let response = {
            let mut client = self.client.lock().await;
            client.report(url, &body).await?
        };

        let contacts = parse_report_response(&response)?;
        info!(url = %url, count = contacts.len(), "Fetched vCards");

        Ok(FetchResult::with_contacts(contacts))
    }
}

impl ContactProvider for CardDavProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn fetch_contacts(&self) -> BoxFuture<'_, ProviderResult<FetchResult>> {
        Box::pin(async move {
            self.query()
                .await
                .map_err(|e| e.with_provider(PROVIDER_NAME))
        })
    }

    fn check_connection(&self) -> BoxFuture<'_, ProviderResult<()>> {
        Box::pin(async move {
            let url = self.config.url_str();
            let mut client = self.client.lock().await;
            client
                .probe(url)
                .await
                .map(|status| debug!(url = %url, status = %status, "Connection check passed"))
                .map_err(|e| e.with_provider(PROVIDER_NAME))
        })
    }
}
