//! Core types: birth dates, occurrence engine, sensor states, formatting

pub mod date;
pub mod format;
pub mod occurrence;
pub mod sensor;
pub mod tracing;

pub use date::{BirthDate, ContactRecord, InvalidBirthDate, LeapDayPolicy, is_leap_year};
pub use format::{FormatOptions, OutputFormat, OutputFormatter, relative_days};
pub use occurrence::{
    BirthdaySnapshot, EngineOptions, GlobalNextBirthday, OccurrenceResult, SkippedContact,
    compute_snapshot, global_next_birthday, next_occurrence, occurrence_for,
};
pub use sensor::{
    NEXT_BIRTHDAY_UNIQUE_ID, SensorSnapshot, SensorState, contact_sensor, contact_unique_id,
    contact_unique_ids, next_birthday_sensor, snapshot_sensors,
};
pub use tracing::{LogFormat, TracingConfig, TracingError, init_tracing};
