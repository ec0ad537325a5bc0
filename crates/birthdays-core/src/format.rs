//! Output formatting for birthday snapshots.
//!
//! - **TTY**: one human-readable line per contact, soonest first
//! - **JSON**: the sensor states a host would receive, see [`crate::sensor`]
//!
//! # Example
//!
//! ```rust
//! use birthdays_core::format::OutputFormatter;
//! use birthdays_core::{BirthDate, ContactRecord, EngineOptions, compute_snapshot};
//! use chrono::NaiveDate;
//!
//! let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
//! let contacts = vec![ContactRecord::new("Carol", BirthDate::month_day(7, 15).unwrap())];
//! let snapshot = compute_snapshot(&contacts, today, EngineOptions::default());
//!
//! let lines = OutputFormatter::with_defaults().format_tty(&snapshot);
//! assert_eq!(lines, vec!["2024-07-15  Carol (in 14 days)"]);
//! ```

use serde::{Deserialize, Serialize};

use crate::occurrence::{BirthdaySnapshot, GlobalNextBirthday, OccurrenceResult};
use crate::sensor::{SensorSnapshot, contact_sensor, contact_unique_ids, next_birthday_sensor};

/// The output format for birthday display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Human-readable terminal output.
    #[default]
    Tty,
    /// Sensor states as JSON.
    Json,
}

/// Configuration options for output formatting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatOptions {
    /// Maximum number of contacts to print.
    pub limit: Option<usize>,
    /// Only include birthdays at most this many days away.
    pub within_days: Option<i64>,
    /// Line printed when there is nothing to show.
    pub no_birthday_text: String,
    /// chrono format string for dates in TTY output.
    pub date_format: String,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            limit: None,
            within_days: None,
            no_birthday_text: "No upcoming birthdays".to_string(),
            date_format: "%Y-%m-%d".to_string(),
        }
    }
}

/// Output formatter for birthday snapshots.
#[derive(Debug, Clone)]
pub struct OutputFormatter {
    options: FormatOptions,
}

impl OutputFormatter {
    /// Creates a new OutputFormatter with the given options.
    pub fn new(options: FormatOptions) -> Self {
        Self { options }
    }

    /// Creates a new OutputFormatter with default options.
    pub fn with_defaults() -> Self {
        Self::new(FormatOptions::default())
    }

    /// Formats a snapshot for TTY output, one line per contact.
    pub fn format_tty(&self, snapshot: &BirthdaySnapshot) -> Vec<String> {
        let lines: Vec<String> = self
            .selected(snapshot)
            .map(|r| self.format_line(r))
            .collect();

        if lines.is_empty() {
            vec![self.options.no_birthday_text.clone()]
        } else {
            lines
        }
    }

    /// Formats the aggregate next birthday as a single line.
    pub fn format_summary(&self, next: &GlobalNextBirthday) -> String {
        let (Some(date), Some(days)) = (next.date, next.days_until) else {
            return self.options.no_birthday_text.clone();
        };

        let mut line = format!(
            "Next birthday: {} on {} ({}",
            next.names.join(", "),
            date.format(&self.options.date_format),
            relative_days(days)
        );
        if let Some(age) = next.age_turning {
            line.push_str(&format!(", turning {}", age));
        }
        line.push(')');
        line
    }

    /// Formats a snapshot as sensor states.
    ///
    /// `limit` and `within_days` filter the per-contact sensors; the aggregate
    /// sensor is always present and reflects the whole snapshot.
    pub fn format_json(&self, snapshot: &BirthdaySnapshot) -> SensorSnapshot {
        let within = self.options.within_days;
        let limit = self.options.limit.unwrap_or(usize::MAX);
        let sensors = snapshot
            .results
            .iter()
            .zip(contact_unique_ids(&snapshot.results))
            .filter(|(r, _)| within.is_none_or(|days| r.days_until <= days))
            .take(limit)
            .map(|(r, id)| contact_sensor(r, id))
            .chain(std::iter::once(next_birthday_sensor(&snapshot.next)))
            .collect();

        SensorSnapshot {
            today: snapshot.today,
            sensors,
        }
    }

    fn selected<'a>(
        &self,
        snapshot: &'a BirthdaySnapshot,
    ) -> impl Iterator<Item = &'a OccurrenceResult> {
        let within = self.options.within_days;
        let limit = self.options.limit.unwrap_or(usize::MAX);
        snapshot
            .results
            .iter()
            .filter(move |r| within.is_none_or(|days| r.days_until <= days))
            .take(limit)
    }

    fn format_line(&self, result: &OccurrenceResult) -> String {
        let date = result.next_occurrence.format(&self.options.date_format);
        match result.age_turning {
            Some(age) => format!(
                "{}  {} ({}, turns {})",
                date,
                result.contact.name,
                relative_days(result.days_until),
                age
            ),
            None => format!(
                "{}  {} ({})",
                date,
                result.contact.name,
                relative_days(result.days_until)
            ),
        }
    }
}

/// Describes a day distance in words.
pub fn relative_days(days: i64) -> String {
    match days {
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        n => format!("in {} days", n),
    }
}
