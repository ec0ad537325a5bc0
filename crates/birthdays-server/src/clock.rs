//! Source of "today".
//!
//! The engine only sees dates, so the coordinator asks a clock once per
//! poll and passes the result down.

use chrono::{Local, NaiveDate};

/// Provides the current local date.
pub trait Clock: Send + Sync {
    /// Returns today's date in the host's time zone.
    fn today(&self) -> NaiveDate;
}

/// The system clock in local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock frozen on one date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
