//! Tracks which sensors have been announced to the host.
//!
//! Sensors are created the first time a contact shows up and are never
//! removed automatically; contacts that disappear are reported as stale.

use std::collections::BTreeSet;

use birthdays_core::SensorSnapshot;
use tracing::{debug, info};

/// Set of sensor ids seen so far.
#[derive(Debug, Clone, Default)]
pub struct SensorRegistry {
    known: BTreeSet<String>,
    current: BTreeSet<String>,
}

impl SensorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the sensors of one poll, returning ids seen for the first time.
    pub fn register(&mut self, snapshot: &SensorSnapshot) -> Vec<String> {
        self.current = snapshot
            .sensors
            .iter()
            .map(|s| s.unique_id.clone())
            .collect();

        let added: Vec<String> = snapshot
            .sensors
            .iter()
            .filter(|s| self.known.insert(s.unique_id.clone()))
            .map(|s| s.unique_id.clone())
            .collect();

        if !added.is_empty() {
            info!(count = added.len(), "Registered new sensors");
        }
        debug!(known = self.known.len(), "Sensor registry updated");
        added
    }

    /// Ids registered earlier but absent from the latest poll.
    pub fn stale(&self) -> Vec<String> {
        self.known.difference(&self.current).cloned().collect()
    }

    /// Returns true if the id has been registered.
    pub fn contains(&self, unique_id: &str) -> bool {
        self.known.contains(unique_id)
    }

    /// Number of registered sensors.
    pub fn len(&self) -> usize {
        self.known.len()
    }

    /// Returns true if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}
