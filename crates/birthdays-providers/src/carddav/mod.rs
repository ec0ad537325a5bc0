//! CardDAV contact provider.
//!
//! - HTTP Digest and Basic authentication
//! - `addressbook-query` REPORT filtered on `BDAY`
//! - namespace-agnostic `multistatus` parsing
//! - TLS verification can be disabled for self-signed servers
//!
//! ```ignore
//! use birthdays_providers::carddav::{CardDavConfig, CardDavProvider};
//!
//! let config = CardDavConfig::new("https://dav.example.com/addressbooks/alice/contacts/")?
//!     .with_credentials("alice", "s3cret");
//! let provider = CardDavProvider::new(config)?;
//! let fetched = provider.fetch_contacts().await?;
//! ```

mod auth;
mod client;
mod config;
mod provider;
mod xml;

#[cfg(test)]
pub(crate) mod test_server;

pub use config::CardDavConfig;
pub use provider::CardDavProvider;
pub use xml::{addressbook_query_body, parse_report_response};
