//! vCard birthday extraction.
//!
//! Parses one vCard with the `ical` crate and pulls out what the occurrence
//! engine needs: a display name (`FN`, else `N`), the `UID` and the `BDAY`.
//! Everything else in the card is ignored.
//!
//! Accepted `BDAY` shapes:
//!
//! | value | result |
//! |---|---|
//! | `1990-03-01` | full date |
//! | `1990-03-01T00:00:00Z` | full date, time part dropped |
//! | `--03-01` | month and day, year unknown |
//!
//! Any other shape counts as no birthday at all.

use std::sync::LazyLock;

use birthdays_core::{BirthDate, ContactRecord};
use ical::VcardParser;
use ical::property::Property;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::provider::RawContact;

static FULL_DATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})(?:T\S*)?$").expect("Invalid full date regex")
});

static YEARLESS_DATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^--(\d{2})-(\d{2})$").expect("Invalid year-less date regex"));

/// Why a vCard did not produce a contact record.
///
/// None of these abort a poll; the contact is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// Neither `FN` nor `N` yields a name.
    #[error("vCard has no FN or N name")]
    MissingName,

    /// No `BDAY`, or a `BDAY` in an unsupported shape.
    #[error("vCard has no usable BDAY")]
    MissingBirthday,

    /// A `BDAY` of the right shape naming a day that does not exist.
    #[error("BDAY `{value}` is not a calendar date")]
    MalformedDate {
        /// The raw `BDAY` value.
        value: String,
    },

    /// The text is not a vCard.
    #[error("not a vCard: {message}")]
    InvalidVCard {
        /// Parser message.
        message: String,
    },
}

/// A vCard that was skipped, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionFailure {
    /// Resource path of the skipped vCard.
    pub href: String,
    /// Why it was skipped.
    pub error: ExtractError,
}

/// Outcome of extracting a batch of vCards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Contacts with a usable birthday, in input order.
    pub contacts: Vec<ContactRecord>,
    /// vCards that were skipped.
    pub failures: Vec<ExtractionFailure>,
}

impl ExtractionReport {
    /// Number of skipped vCards.
    pub fn skipped(&self) -> usize {
        self.failures.len()
    }
}

/// Extracts a contact record from one vCard.
///
/// # Errors
///
/// Returns [`ExtractError`] when the text is not a vCard, has no name, or
/// has no usable birthday.
pub fn extract_contact(vcard: &str) -> Result<ContactRecord, ExtractError> {
    let mut parser = VcardParser::new(vcard.as_bytes());
    let card = match parser.next() {
        Some(Ok(card)) => card,
        Some(Err(e)) => {
            return Err(ExtractError::InvalidVCard {
                message: e.to_string(),
            });
        }
        None => {
            return Err(ExtractError::InvalidVCard {
                message: "no BEGIN:VCARD found".to_string(),
            });
        }
    };

    let name = display_name(&card.properties).ok_or(ExtractError::MissingName)?;

    let original = property_value(&card.properties, "BDAY")
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ExtractError::MissingBirthday)?;
    let birth_date = parse_bday(original)?;

    let mut record = ContactRecord::new(name, birth_date).with_original(original);
    if let Some(uid) = property_value(&card.properties, "UID")
        .map(|v| unescape(v.trim()))
        .filter(|v| !v.is_empty())
    {
        record = record.with_uid(uid);
    }

    Ok(record)
}

/// Extracts every raw contact, collecting failures instead of stopping.
pub fn extract_contacts<'a, I>(raw: I) -> ExtractionReport
where
    I: IntoIterator<Item = &'a RawContact>,
{
    let mut report = ExtractionReport::default();

    for contact in raw {
        match extract_contact(&contact.vcard) {
            Ok(record) => report.contacts.push(record),
            Err(error) => {
                warn!(href = %contact.href, error = %error, "Skipping vCard");
                report.failures.push(ExtractionFailure {
                    href: contact.href.clone(),
                    error,
                });
            }
        }
    }

    debug!(
        extracted = report.contacts.len(),
        skipped = report.skipped(),
        "Extracted birthdays"
    );
    report
}

/// Parses a `BDAY` value.
///
/// # Errors
///
/// [`ExtractError::MissingBirthday`] for unsupported shapes,
/// [`ExtractError::MalformedDate`] for impossible dates.
pub fn parse_bday(value: &str) -> Result<BirthDate, ExtractError> {
    let value = value.trim();
    let malformed = || ExtractError::MalformedDate {
        value: value.to_string(),
    };

    if let Some(caps) = FULL_DATE_REGEX.captures(value) {
        let year: i32 = caps[1].parse().map_err(|_| malformed())?;
        let month: u32 = caps[2].parse().map_err(|_| malformed())?;
        let day: u32 = caps[3].parse().map_err(|_| malformed())?;
        return BirthDate::new(Some(year), month, day).map_err(|_| malformed());
    }

    if let Some(caps) = YEARLESS_DATE_REGEX.captures(value) {
        let month: u32 = caps[1].parse().map_err(|_| malformed())?;
        let day: u32 = caps[2].parse().map_err(|_| malformed())?;
        return BirthDate::month_day(month, day).map_err(|_| malformed());
    }

    Err(ExtractError::MissingBirthday)
}

/// Splits a multi-contact `.vcf` file into one text block per vCard.
pub fn split_vcards(text: &str) -> Vec<String> {
    let mut cards = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut depth = 0usize;

    for line in text.lines() {
        let marker = line.trim().to_ascii_uppercase();
        if marker == "BEGIN:VCARD" {
            depth += 1;
        }
        if depth > 0 {
            current.push(line);
        }
        if marker == "END:VCARD" && depth > 0 {
            depth -= 1;
            if depth == 0 {
                cards.push(current.join("\r\n"));
                current.clear();
            }
        }
    }

    cards
}

fn display_name(properties: &[Property]) -> Option<String> {
    if let Some(fn_value) = property_value(properties, "FN") {
        let name = unescape(fn_value.trim());
        if !name.is_empty() {
            return Some(name);
        }
    }

    // N is Family;Given;Additional;Prefix;Suffix
    let n = property_value(properties, "N")?;
    let parts = split_structured(n);
    let family = parts.first().map(String::as_str).unwrap_or("");
    let given = parts.get(1).map(String::as_str).unwrap_or("");
    let name = [given, family]
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if name.is_empty() { None } else { Some(name) }
}

/// First value of a property, matched case-insensitively and ignoring any
/// `group.` prefix.
fn property_value<'a>(properties: &'a [Property], name: &str) -> Option<&'a str> {
    properties
        .iter()
        .filter(|p| {
            let bare = p.name.rsplit('.').next().unwrap_or(&p.name);
            bare.eq_ignore_ascii_case(name)
        })
        .find_map(|p| p.value.as_deref())
}

/// Splits a structured value on unescaped `;` and unescapes each part.
fn split_structured(value: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escaped = false;

    for c in value.chars() {
        if escaped {
            current.push('\\');
            current.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == ';' {
            parts.push(unescape(&current));
            current.clear();
        } else {
            current.push(c);
        }
    }
    if escaped {
        current.push('\\');
    }
    parts.push(unescape(&current));
    parts
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
