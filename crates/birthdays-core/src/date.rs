//! Birth date model.
//!
//! A [`BirthDate`] is a month/day pair with an optional year, because vCards
//! may carry a year-less `--MM-DD` birthday. [`LeapDayPolicy`] decides where
//! a February 29 birthday lands in years without that day.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Leap year used to validate year-less dates, so `--02-29` is accepted.
const REFERENCE_LEAP_YEAR: i32 = 2000;

/// Returns true if `year` has a February 29.
pub fn is_leap_year(year: i32) -> bool {
    NaiveDate::from_ymd_opt(year, 2, 29).is_some()
}

/// A month/day that does not exist on the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidBirthDate {
    /// Year, if one was given.
    pub year: Option<i32>,
    /// Month as given.
    pub month: u32,
    /// Day as given.
    pub day: u32,
}

impl fmt::Display for InvalidBirthDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid birth date {}",
            describe(self.year, self.month, self.day)
        )
    }
}

impl std::error::Error for InvalidBirthDate {}

fn describe(year: Option<i32>, month: u32, day: u32) -> String {
    match year {
        Some(y) => format!("{:04}-{:02}-{:02}", y, month, day),
        None => format!("--{:02}-{:02}", month, day),
    }
}

/// Where a February 29 birthday is observed in non-leap years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeapDayPolicy {
    /// Observe on February 28.
    #[default]
    Feb28,
    /// Observe on March 1.
    Mar1,
}

impl LeapDayPolicy {
    /// Returns the configuration name of this policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feb28 => "feb28",
            Self::Mar1 => "mar1",
        }
    }

    /// The date observed in `year` when it has no February 29.
    fn substitute(&self, year: i32) -> Option<NaiveDate> {
        match self {
            Self::Feb28 => NaiveDate::from_ymd_opt(year, 2, 28),
            Self::Mar1 => NaiveDate::from_ymd_opt(year, 3, 1),
        }
    }
}

impl fmt::Display for LeapDayPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeapDayPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "feb28" | "feb-28" | "02-28" => Ok(Self::Feb28),
            "mar1" | "mar-1" | "03-01" => Ok(Self::Mar1),
            other => Err(format!(
                "unknown leap day policy `{}` (expected `feb28` or `mar1`)",
                other
            )),
        }
    }
}

/// A birthday: month and day, with the year when it is known.
///
/// Fields are public so records can be deserialized or built by hand; use
/// [`BirthDate::validate`] (or the checked constructors) before trusting one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BirthDate {
    /// Birth year, absent for `--MM-DD` values.
    pub year: Option<i32>,
    /// Month, 1-12.
    pub month: u32,
    /// Day of month.
    pub day: u32,
}

impl BirthDate {
    /// Creates a checked birth date.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidBirthDate`] if the month/day (and year, when given)
    /// does not exist on the calendar.
    pub fn new(year: Option<i32>, month: u32, day: u32) -> Result<Self, InvalidBirthDate> {
        let date = Self { year, month, day };
        date.validate()?;
        Ok(date)
    }

    /// Creates a birth date with a known year from a calendar date.
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: Some(date.year()),
            month: date.month(),
            day: date.day(),
        }
    }

    /// Creates a checked year-less birth date.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidBirthDate`] for days that never exist (e.g. `--02-30`).
    pub fn month_day(month: u32, day: u32) -> Result<Self, InvalidBirthDate> {
        Self::new(None, month, day)
    }

    /// Checks that this month/day exists on the calendar.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidBirthDate`] describing the rejected value.
    pub fn validate(&self) -> Result<(), InvalidBirthDate> {
        let year = self.year.unwrap_or(REFERENCE_LEAP_YEAR);
        match NaiveDate::from_ymd_opt(year, self.month, self.day) {
            Some(_) => Ok(()),
            None => Err(self.invalid()),
        }
    }

    /// Returns true if this birthday is February 29.
    pub fn is_leap_day(&self) -> bool {
        self.month == 2 && self.day == 29
    }

    /// Returns the calendar date this birthday falls on in `year`.
    ///
    /// A February 29 birthday in a non-leap year is moved according to
    /// `policy`. Returns `None` if the month/day is invalid.
    pub fn in_year(&self, year: i32, policy: LeapDayPolicy) -> Option<NaiveDate> {
        match NaiveDate::from_ymd_opt(year, self.month, self.day) {
            Some(date) => Some(date),
            None if self.is_leap_day() && !is_leap_year(year) => policy.substitute(year),
            None => None,
        }
    }

    pub(crate) fn invalid(&self) -> InvalidBirthDate {
        InvalidBirthDate {
            year: self.year,
            month: self.month,
            day: self.day,
        }
    }
}

impl fmt::Display for BirthDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&describe(self.year, self.month, self.day))
    }
}

/// A contact with a usable birthday, as produced by the vCard extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    /// The vCard `UID`, when present.
    pub uid: Option<String>,
    /// Display name.
    pub name: String,
    /// Parsed birthday.
    pub birth_date: BirthDate,
    /// The `BDAY` value as found in the vCard.
    pub original: String,
}

impl ContactRecord {
    /// Creates a contact record; the original value defaults to the ISO form.
    pub fn new(name: impl Into<String>, birth_date: BirthDate) -> Self {
        Self {
            uid: None,
            name: name.into(),
            original: birth_date.to_string(),
            birth_date,
        }
    }

    /// Builder method to set the vCard UID.
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Builder method to set the original `BDAY` text.
    pub fn with_original(mut self, original: impl Into<String>) -> Self {
        self.original = original.into();
        self
    }
}
