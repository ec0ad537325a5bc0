//! Sensor states exposed to the host platform.
//!
//! The engine works with typed results; this module is the one place they
//! are flattened into the loosely typed `state` + `attributes` shape a
//! home-automation entity model expects.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::date::ContactRecord;
use crate::occurrence::{BirthdaySnapshot, GlobalNextBirthday, OccurrenceResult};

/// Unique id of the aggregate sensor.
pub const NEXT_BIRTHDAY_UNIQUE_ID: &str = "carddav_next_birthday";

const DEVICE_CLASS_DATE: &str = "date";
const CONTACT_ICON: &str = "mdi:cake";
const NEXT_BIRTHDAY_ICON: &str = "mdi:calendar-star";
const NEXT_BIRTHDAY_NAME: &str = "Next Birthday";

/// One sensor as rendered by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorState {
    /// Stable identifier across poll cycles.
    pub unique_id: String,
    /// Display name.
    pub name: String,
    /// Material design icon.
    pub icon: String,
    /// Host device class.
    pub device_class: String,
    /// ISO date state, `None` when unknown.
    pub state: Option<String>,
    /// Extra state attributes.
    pub attributes: Map<String, Value>,
}

/// All sensors for one poll cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    /// Reference date of the cycle.
    pub today: NaiveDate,
    /// Per-contact sensors followed by the aggregate sensor.
    pub sensors: Vec<SensorState>,
}

impl SensorSnapshot {
    /// Builds the sensors of an engine snapshot.
    pub fn from_snapshot(snapshot: &BirthdaySnapshot) -> Self {
        Self {
            today: snapshot.today,
            sensors: snapshot_sensors(snapshot),
        }
    }

    /// Returns the sensor with the given unique id.
    pub fn get(&self, unique_id: &str) -> Option<&SensorState> {
        self.sensors.iter().find(|s| s.unique_id == unique_id)
    }
}

/// Returns the base id of a contact's sensor.
///
/// Uses the vCard UID; contacts without one fall back to a slug of their name.
/// The id may still be taken by another contact, see [`contact_unique_ids`].
pub fn contact_unique_id(contact: &ContactRecord) -> String {
    let base = match contact.uid.as_deref().map(str::trim) {
        Some(uid) if !uid.is_empty() => uid.to_string(),
        _ => slugify(&contact.name),
    };
    format!("{}_birthday", base)
}

/// Assigns a distinct sensor id to every result, in `results` order.
///
/// Contacts whose base id is already taken, or equals
/// [`NEXT_BIRTHDAY_UNIQUE_ID`], get a `_2`, `_3`, ... suffix. Claims are
/// made in birth date order rather than `results` order, so an id stays with
/// the same contact when the soonest birthday moves on.
pub fn contact_unique_ids(results: &[OccurrenceResult]) -> Vec<String> {
    let mut order: Vec<usize> = (0..results.len()).collect();
    order.sort_by(|&a, &b| {
        birth_order(&results[a].contact).cmp(&birth_order(&results[b].contact))
    });

    let mut taken: HashSet<String> = HashSet::from([NEXT_BIRTHDAY_UNIQUE_ID.to_string()]);
    let mut ids = vec![String::new(); results.len()];

    for i in order {
        let base = contact_unique_id(&results[i].contact);
        let mut id = base.clone();
        let mut n = 2;
        while taken.contains(&id) {
            id = format!("{}_{}", base, n);
            n += 1;
        }
        taken.insert(id.clone());
        ids[i] = id;
    }

    ids
}

fn birth_order(contact: &ContactRecord) -> (u32, u32, Option<i32>, &str, &str) {
    let date = &contact.birth_date;
    (date.month, date.day, date.year, &contact.name, &contact.original)
}

/// Builds the sensor of a single contact under the given id.
pub fn contact_sensor(result: &OccurrenceResult, unique_id: impl Into<String>) -> SensorState {
    let contact = &result.contact;

    let mut attributes = Map::new();
    attributes.insert("age".into(), json!(result.age_turning));
    attributes.insert("days_until".into(), json!(result.days_until));
    attributes.insert("friendly_name".into(), json!(contact.name));
    attributes.insert("original_birthdate".into(), json!(contact.original));

    SensorState {
        unique_id: unique_id.into(),
        name: format!("{} Birthday", contact.name),
        icon: CONTACT_ICON.to_string(),
        device_class: DEVICE_CLASS_DATE.to_string(),
        state: Some(result.next_occurrence.format("%Y-%m-%d").to_string()),
        attributes,
    }
}

/// Builds the aggregate "Next Birthday" sensor.
pub fn next_birthday_sensor(next: &GlobalNextBirthday) -> SensorState {
    let mut attributes = Map::new();
    attributes.insert("age_turning".into(), json!(next.age_turning));
    attributes.insert("days_until".into(), json!(next.days_until));
    attributes.insert("friendly_name".into(), json!(NEXT_BIRTHDAY_NAME));
    attributes.insert("names".into(), json!(next.names));

    SensorState {
        unique_id: NEXT_BIRTHDAY_UNIQUE_ID.to_string(),
        name: NEXT_BIRTHDAY_NAME.to_string(),
        icon: NEXT_BIRTHDAY_ICON.to_string(),
        device_class: DEVICE_CLASS_DATE.to_string(),
        state: next.date.map(|d| d.format("%Y-%m-%d").to_string()),
        attributes,
    }
}

/// Builds every sensor of a snapshot: one per contact, then the aggregate.
pub fn snapshot_sensors(snapshot: &BirthdaySnapshot) -> Vec<SensorState> {
    snapshot
        .results
        .iter()
        .zip(contact_unique_ids(&snapshot.results))
        .map(|(result, id)| contact_sensor(result, id))
        .chain(std::iter::once(next_birthday_sensor(&snapshot.next)))
        .collect()
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        "contact".to_string()
    } else {
        slug.to_string()
    }
}
