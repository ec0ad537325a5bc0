//! ContactProvider trait definition.
//!
//! A provider hands back raw vCard text; turning that text into contact
//! records is the job of [`crate::extract`], so every backend shares the
//! same `BDAY` rules.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, ProviderResult};

/// One contact resource as returned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawContact {
    /// Resource path of the vCard on the server.
    pub href: String,
    /// Entity tag with surrounding quotes removed.
    pub etag: Option<String>,
    /// The vCard text.
    pub vcard: String,
}

impl RawContact {
    /// Creates a raw contact without an etag.
    pub fn new(href: impl Into<String>, vcard: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            etag: None,
            vcard: vcard.into(),
        }
    }

    /// Builder method to set the etag.
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }
}

/// Result of one fetch.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Contacts that carry a `BDAY`, in server order.
    pub contacts: Vec<RawContact>,
    /// When the fetch completed.
    pub fetched_at: DateTime<Utc>,
}

impl FetchResult {
    /// Creates a fetch result stamped with the current time.
    pub fn with_contacts(contacts: Vec<RawContact>) -> Self {
        Self {
            contacts,
            fetched_at: Utc::now(),
        }
    }

    /// Returns the number of fetched contacts.
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    /// Returns true if nothing was fetched.
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}

/// A boxed future, so the trait stays object safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A source of vCards with birthdays.
///
/// ```ignore
/// impl ContactProvider for MyProvider {
///     fn name(&self) -> &str { "mine" }
///
///     fn fetch_contacts(&self) -> BoxFuture<'_, ProviderResult<FetchResult>> {
///         Box::pin(async move { Ok(FetchResult::with_contacts(self.load().await?)) })
///     }
///     // ...
/// }
/// ```
pub trait ContactProvider: Send + Sync {
    /// Returns the name/type of this provider (e.g. "carddav").
    fn name(&self) -> &str;

    /// Fetches every contact that has a birthday.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` on network errors, authentication failures
    /// or unparseable responses. A single bad vCard is not an error here.
    fn fetch_contacts(&self) -> BoxFuture<'_, ProviderResult<FetchResult>>;

    /// Verifies that the source is reachable and accepts the credentials.
    fn check_connection(&self) -> BoxFuture<'_, ProviderResult<()>>;
}

/// A provider that serves a fixed set of vCards.
///
/// Backs `show --vcf` and is handy in tests.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    name: String,
    contacts: Vec<RawContact>,
}

impl StaticProvider {
    /// Creates a provider that always returns `contacts`.
    pub fn new(name: impl Into<String>, contacts: Vec<RawContact>) -> Self {
        Self {
            name: name.into(),
            contacts,
        }
    }

    /// Creates a provider from vCard texts, naming each `<name>/<index>.vcf`.
    pub fn from_vcards<I, S>(name: impl Into<String>, vcards: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let contacts = vcards
            .into_iter()
            .enumerate()
            .map(|(i, vcard)| RawContact::new(format!("{}/{}.vcf", name, i), vcard))
            .collect();
        Self { name, contacts }
    }
}

impl ContactProvider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch_contacts(&self) -> BoxFuture<'_, ProviderResult<FetchResult>> {
        let contacts = self.contacts.clone();
        Box::pin(async move { Ok(FetchResult::with_contacts(contacts)) })
    }

    fn check_connection(&self) -> BoxFuture<'_, ProviderResult<()>> {
        Box::pin(async { Ok(()) })
    }

}

/// A provider that always returns an error.
///
/// Stands in for a provider that failed to initialize.
#[derive(Debug)]
pub struct ErrorProvider {
    name: String,
    error: ProviderError,
}

impl ErrorProvider {
    /// Creates a new error provider.
    pub fn new(name: impl Into<String>, error: ProviderError) -> Self {
        Self {
            name: name.into(),
            error,
        }
    }

    fn error(&self) -> ProviderError {
        self.error.detached().with_provider(&self.name)
    }
}

impl ContactProvider for ErrorProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch_contacts(&self) -> BoxFuture<'_, ProviderResult<FetchResult>> {
        let error = self.error();
        Box::pin(async move { Err(error) })
    }

    fn check_connection(&self) -> BoxFuture<'_, ProviderResult<()>> {
        let error = self.error();
        Box::pin(async move { Err(error) })
    }

}
