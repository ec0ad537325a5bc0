//! Contact sources and vCard birthday extraction.
//!
//! ```text
//! ┌─────────────────┐
//! │  CardDAV Server │
//! └────────┬────────┘
//!          │ REPORT addressbook-query
//!          ▼
//! ┌─────────────────┐
//! │ CardDavProvider │  ContactProvider
//! └────────┬────────┘
//!          │ RawContact (href, etag, vCard text)
//!          ▼ extract_contacts()
//! ┌─────────────────┐
//! │  ContactRecord  │  birthdays-core
//! └─────────────────┘
//! ```

#[cfg(feature = "carddav")]
pub mod carddav;
pub mod error;
pub mod extract;
pub mod provider;

pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use extract::{
    ExtractError, ExtractionFailure, ExtractionReport, extract_contact, extract_contacts,
    parse_bday, split_vcards,
};
pub use provider::{
    BoxFuture, ContactProvider, ErrorProvider, FetchResult, RawContact, StaticProvider,
};
