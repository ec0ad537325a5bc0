//! Birthday occurrence engine.
//!
//! Pure functions that turn [`ContactRecord`]s into their next occurrence
//! relative to an explicit `today`, and reduce a collection to the soonest
//! birthday. Nothing here reads a clock: callers pass `today`, so the same
//! input always gives the same [`BirthdaySnapshot`].

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::date::{BirthDate, ContactRecord, InvalidBirthDate, LeapDayPolicy};

/// Options for the occurrence engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Where February 29 birthdays fall in non-leap years.
    pub leap_day: LeapDayPolicy,
}

impl EngineOptions {
    /// Builder method to set the leap day policy.
    pub fn with_leap_day(mut self, policy: LeapDayPolicy) -> Self {
        self.leap_day = policy;
        self
    }
}

/// The next birthday of one contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccurrenceResult {
    /// The contact this result belongs to.
    pub contact: ContactRecord,
    /// The next date the birthday falls on, on or after `today`.
    pub next_occurrence: NaiveDate,
    /// Whole days from `today` to `next_occurrence`.
    pub days_until: i64,
    /// Age reached on `next_occurrence`, if the birth year is known.
    pub age_turning: Option<i32>,
}

/// The soonest birthday across all contacts.
///
/// Contacts sharing the soonest date are all listed in `names`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalNextBirthday {
    /// Date of the soonest birthday, `None` when there are no contacts.
    pub date: Option<NaiveDate>,
    /// Everyone whose birthday is on `date`, in input order.
    pub names: Vec<String>,
    /// Shared age of the tied contacts, absent if unknown or not shared.
    pub age_turning: Option<i32>,
    /// Days until `date`.
    pub days_until: Option<i64>,
}

impl GlobalNextBirthday {
    /// The "no upcoming birthday" value.
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns true if this is the empty value.
    pub fn is_none(&self) -> bool {
        self.date.is_none()
    }
}

/// A contact the engine could not place on the calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedContact {
    /// Display name of the contact.
    pub name: String,
    /// The rejected birth date.
    pub birth_date: BirthDate,
}

/// Everything computed for one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BirthdaySnapshot {
    /// Reference date the snapshot was computed for.
    pub today: NaiveDate,
    /// Per-contact results, soonest first.
    pub results: Vec<OccurrenceResult>,
    /// The soonest birthday.
    pub next: GlobalNextBirthday,
    /// Contacts with impossible dates.
    pub skipped: Vec<SkippedContact>,
}

impl BirthdaySnapshot {
    /// Returns true if no contact produced a result.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Computes the next date on or after `today` that `birth` falls on.
///
/// # Errors
///
/// Returns [`InvalidBirthDate`] if the month/day does not exist.
pub fn next_occurrence(
    birth: &BirthDate,
    today: NaiveDate,
    policy: LeapDayPolicy,
) -> Result<NaiveDate, InvalidBirthDate> {
    birth.validate()?;

    let candidate = birth
        .in_year(today.year(), policy)
        .ok_or_else(|| birth.invalid())?;
    if candidate >= today {
        return Ok(candidate);
    }

    birth
        .in_year(today.year() + 1, policy)
        .ok_or_else(|| birth.invalid())
}

/// Computes the [`OccurrenceResult`] of a single contact.
///
/// # Errors
///
/// Returns [`InvalidBirthDate`] if the contact's birthday does not exist.
pub fn occurrence_for(
    contact: &ContactRecord,
    today: NaiveDate,
    options: EngineOptions,
) -> Result<OccurrenceResult, InvalidBirthDate> {
    let next = next_occurrence(&contact.birth_date, today, options.leap_day)?;
    let age_turning = contact.birth_date.year.map(|year| next.year() - year);

    Ok(OccurrenceResult {
        contact: contact.clone(),
        next_occurrence: next,
        days_until: (next - today).num_days(),
        age_turning,
    })
}

/// Reduces results to the soonest birthday, keeping every tied contact.
pub fn global_next_birthday(results: &[OccurrenceResult]) -> GlobalNextBirthday {
    let Some(min_days) = results.iter().map(|r| r.days_until).min() else {
        return GlobalNextBirthday::none();
    };

    let tied: Vec<&OccurrenceResult> = results
        .iter()
        .filter(|r| r.days_until == min_days)
        .collect();

    let mut names: Vec<String> = Vec::with_capacity(tied.len());
    for result in &tied {
        if !names.contains(&result.contact.name) {
            names.push(result.contact.name.clone());
        }
    }

    let first_age = tied.first().and_then(|r| r.age_turning);
    let age_turning = if tied.iter().all(|r| r.age_turning == first_age) {
        first_age
    } else {
        None
    };

    GlobalNextBirthday {
        date: tied.first().map(|r| r.next_occurrence),
        names,
        age_turning,
        days_until: Some(min_days),
    }
}

/// Runs the engine over a set of contacts.
///
/// Contacts with impossible dates are skipped and listed in
/// [`BirthdaySnapshot::skipped`]; they never abort the computation.
pub fn compute_snapshot(
    contacts: &[ContactRecord],
    today: NaiveDate,
    options: EngineOptions,
) -> BirthdaySnapshot {
    let mut results = Vec::with_capacity(contacts.len());
    let mut skipped = Vec::new();

    for contact in contacts {
        match occurrence_for(contact, today, options) {
            Ok(result) => results.push(result),
            Err(e) => {
                warn!(contact = %contact.name, error = %e, "Skipping contact");
                skipped.push(SkippedContact {
                    name: contact.name.clone(),
                    birth_date: contact.birth_date,
                });
            }
        }
    }

    // Stable: contacts sharing a day keep their input order.
    results.sort_by_key(|r| r.days_until);

    if results.is_empty() {
        debug!(today = %today, "No contacts, reporting no upcoming birthday");
    }

    let next = global_next_birthday(&results);

    BirthdaySnapshot {
        today,
        results,
        next,
        skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn born(name: &str, y: i32, m: u32, d: u32) -> ContactRecord {
        ContactRecord::new(name, BirthDate::new(Some(y), m, d).unwrap())
    }

    fn born_yearless(name: &str, m: u32, d: u32) -> ContactRecord {
        ContactRecord::new(name, BirthDate::month_day(m, d).unwrap())
    }

    #[test]
    fn birthday_today() {
        let today = date(2024, 3, 1);
        let alice = born("Alice", 1990, 3, 1);

        let result = occurrence_for(&alice, today, EngineOptions::default()).unwrap();

        assert_eq!(result.next_occurrence, date(2024, 3, 1));
        assert_eq!(result.days_until, 0);
        assert_eq!(result.age_turning, Some(34));
    }

    #[test]
    fn leap_day_in_leap_year() {
        let today = date(2024, 2, 28);
        let bob = born_yearless("Bob", 2, 29);

        let result = occurrence_for(&bob, today, EngineOptions::default()).unwrap();

        assert_eq!(result.next_occurrence, date(2024, 2, 29));
        assert_eq!(result.days_until, 1);
        assert_eq!(result.age_turning, None);
    }

    #[test]
    fn leap_day_in_common_year_defaults_to_feb_28() {
        let today = date(2025, 2, 28);
        let bob = born_yearless("Bob", 2, 29);

        let result = occurrence_for(&bob, today, EngineOptions::default()).unwrap();

        assert_eq!(result.next_occurrence, date(2025, 2, 28));
        assert_eq!(result.days_until, 0);
    }

    #[test]
    fn leap_day_with_march_first_policy() {
        let today = date(2025, 2, 28);
        let bob = born_yearless("Bob", 2, 29);
        let options = EngineOptions::default().with_leap_day(LeapDayPolicy::Mar1);

        let result = occurrence_for(&bob, today, options).unwrap();

        assert_eq!(result.next_occurrence, date(2025, 3, 1));
        assert_eq!(result.days_until, 1);
    }

    #[test]
    fn leap_day_rolls_into_next_year_with_policy() {
        // Past Feb 28 in 2026, so the next one is in 2027 (also a common year).
        let today = date(2026, 3, 10);
        let bob = born("Bob", 2000, 2, 29);

        let result = occurrence_for(&bob, today, EngineOptions::default()).unwrap();

        assert_eq!(result.next_occurrence, date(2027, 2, 28));
        assert_eq!(result.age_turning, Some(27));
    }

    #[test]
    fn passed_birthday_moves_to_next_year() {
        let today = date(2024, 12, 31);
        let eve = born("Eve", 1985, 1, 1);

        let result = occurrence_for(&eve, today, EngineOptions::default()).unwrap();

        assert_eq!(result.next_occurrence, date(2025, 1, 1));
        assert_eq!(result.days_until, 1);
        assert_eq!(result.age_turning, Some(40));
    }

    #[test]
    fn next_occurrence_never_before_today() {
        let today = date(2025, 6, 15);
        for month in 1..=12 {
            for day in [1, 15, 28] {
                let birth = BirthDate::month_day(month, day).unwrap();
                let next = next_occurrence(&birth, today, LeapDayPolicy::Feb28).unwrap();
                assert!(next >= today, "{} resolved to {}", birth, next);
                assert!((next - today).num_days() < 366);
            }
        }
    }

    #[test]
    fn invalid_birth_date_is_rejected() {
        let broken = BirthDate {
            year: None,
            month: 2,
            day: 30,
        };
        assert!(next_occurrence(&broken, date(2024, 1, 1), LeapDayPolicy::Feb28).is_err());
    }

    #[test]
    fn shared_birthday_is_a_tie() {
        let today = date(2024, 7, 1);
        let contacts = vec![born("Carol", 1980, 7, 15), born("Dave", 1992, 7, 15)];

        let snapshot = compute_snapshot(&contacts, today, EngineOptions::default());

        assert_eq!(snapshot.next.names, vec!["Carol", "Dave"]);
        assert_eq!(snapshot.next.date, Some(date(2024, 7, 15)));
        assert_eq!(snapshot.next.days_until, Some(14));
        assert_eq!(snapshot.results[0].days_until, snapshot.results[1].days_until);
        // Different ages cannot be summarised as one
        assert_eq!(snapshot.next.age_turning, None);
    }

    #[test]
    fn tie_with_same_age_keeps_age() {
        let today = date(2024, 7, 1);
        let contacts = vec![born("Twin A", 1990, 7, 15), born("Twin B", 1990, 7, 15)];

        let next = compute_snapshot(&contacts, today, EngineOptions::default()).next;

        assert_eq!(next.age_turning, Some(34));
    }

    #[test]
    fn duplicate_names_listed_once() {
        let today = date(2024, 7, 1);
        let contacts = vec![born("Sam", 1990, 7, 2), born("Sam", 1991, 7, 2)];

        let next = compute_snapshot(&contacts, today, EngineOptions::default()).next;

        assert_eq!(next.names, vec!["Sam"]);
    }

    #[test]
    fn today_is_part_of_global_minimum() {
        let today = date(2024, 3, 1);
        let contacts = vec![born("Later", 1970, 3, 2), born("Alice", 1990, 3, 1)];

        let snapshot = compute_snapshot(&contacts, today, EngineOptions::default());

        assert_eq!(snapshot.next.names, vec!["Alice"]);
        assert_eq!(snapshot.next.days_until, Some(0));
        assert_eq!(snapshot.next.age_turning, Some(34));
        assert_eq!(snapshot.results[0].contact.name, "Alice");
    }

    #[test]
    fn empty_collection_gives_sentinel() {
        let snapshot = compute_snapshot(&[], date(2024, 1, 1), EngineOptions::default());

        assert!(snapshot.is_empty());
        assert!(snapshot.next.is_none());
        assert!(snapshot.next.names.is_empty());
        assert_eq!(snapshot.next.days_until, None);
        assert_eq!(snapshot.next, GlobalNextBirthday::none());
    }

    #[test]
    fn invalid_contact_is_skipped() {
        let today = date(2024, 1, 1);
        let broken = ContactRecord::new(
            "Broken",
            BirthDate {
                year: Some(1990),
                month: 2,
                day: 30,
            },
        );
        let contacts = vec![broken, born("Alice", 1990, 3, 1)];

        let snapshot = compute_snapshot(&contacts, today, EngineOptions::default());

        assert_eq!(snapshot.results.len(), 1);
        assert_eq!(snapshot.skipped.len(), 1);
        assert_eq!(snapshot.skipped[0].name, "Broken");
        assert_eq!(snapshot.next.names, vec!["Alice"]);
    }

    #[test]
    fn results_sorted_soonest_first() {
        let today = date(2024, 1, 1);
        let contacts = vec![
            born("December", 1990, 12, 1),
            born_yearless("June", 6, 1),
            born("February", 1990, 2, 1),
        ];

        let snapshot = compute_snapshot(&contacts, today, EngineOptions::default());
        let names: Vec<_> = snapshot
            .results
            .iter()
            .map(|r| r.contact.name.as_str())
            .collect();

        assert_eq!(names, vec!["February", "June", "December"]);
    }

    #[test]
    fn computation_is_idempotent() {
        let today = date(2024, 7, 1);
        let contacts = vec![
            born("Carol", 1980, 7, 15),
            born_yearless("Bob", 2, 29),
            born("Dave", 1992, 7, 15),
        ];

        let first = compute_snapshot(&contacts, today, EngineOptions::default());
        let second = compute_snapshot(&contacts, today, EngineOptions::default());

        assert_eq!(first, second);
    }
}
