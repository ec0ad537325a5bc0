//! Delivery of computed snapshots.
//!
//! A publisher receives every successful poll. The CLI prints to stdout,
//! the daemon additionally keeps a JSON state file current.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use birthdays_core::{BirthdaySnapshot, OutputFormat, OutputFormatter, SensorSnapshot};
use tracing::{debug, info};

use crate::error::{ServerError, ServerResult};

/// Receives the snapshot of each successful poll.
pub trait Publisher: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Delivers one snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot could not be written.
    fn publish(&self, snapshot: &BirthdaySnapshot) -> ServerResult<()>;
}

/// Prints snapshots to stdout.
#[derive(Debug, Clone)]
pub struct StdoutPublisher {
    formatter: OutputFormatter,
    format: OutputFormat,
}

impl StdoutPublisher {
    /// Creates a stdout publisher.
    pub fn new(formatter: OutputFormatter, format: OutputFormat) -> Self {
        Self { formatter, format }
    }

    /// Renders a snapshot the way [`Publisher::publish`] prints it.
    pub fn render(&self, snapshot: &BirthdaySnapshot) -> ServerResult<String> {
        match self.format {
            OutputFormat::Tty => {
                let mut lines = Vec::new();
                if !snapshot.next.is_none() {
                    lines.push(self.formatter.format_summary(&snapshot.next));
                }
                lines.extend(self.formatter.format_tty(snapshot));
                Ok(lines.join("\n"))
            }
            OutputFormat::Json => {
                let sensors = self.formatter.format_json(snapshot);
                Ok(serde_json::to_string_pretty(&sensors)?)
            }
        }
    }
}

impl Publisher for StdoutPublisher {
    fn name(&self) -> &str {
        "stdout"
    }

    fn publish(&self, snapshot: &BirthdaySnapshot) -> ServerResult<()> {
        let rendered = self.render(snapshot)?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", rendered)?;
        stdout.flush()?;
        Ok(())
    }
}

/// Keeps a JSON file with the latest sensor states.
///
/// The file is replaced atomically: written next to the target, then renamed.
#[derive(Debug, Clone)]
pub struct JsonFilePublisher {
    path: PathBuf,
}

impl JsonFilePublisher {
    /// Creates a publisher writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the target path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads back a state file.
    pub fn load(path: &Path) -> ServerResult<SensorSnapshot> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl Publisher for JsonFilePublisher {
    fn name(&self) -> &str {
        "json-file"
    }

    fn publish(&self, snapshot: &BirthdaySnapshot) -> ServerResult<()> {
        let sensors = SensorSnapshot::from_snapshot(snapshot);
        let json = serde_json::to_string_pretty(&sensors)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, json)?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(ServerError::publish(
                self.name(),
                format!("cannot replace {}: {}", self.path.display(), e),
            ));
        }

        debug!(path = %self.path.display(), sensors = sensors.sensors.len(), "Wrote state file");
        Ok(())
    }
}

/// Keeps every published snapshot in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryPublisher {
    snapshots: Arc<Mutex<Vec<BirthdaySnapshot>>>,
}

impl MemoryPublisher {
    /// Creates an empty memory publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// All snapshots published so far.
    pub fn snapshots(&self) -> Vec<BirthdaySnapshot> {
        self.snapshots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The most recent snapshot.
    pub fn latest(&self) -> Option<BirthdaySnapshot> {
        self.snapshots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }
}

impl Publisher for MemoryPublisher {
    fn name(&self) -> &str {
        "memory"
    }

    fn publish(&self, snapshot: &BirthdaySnapshot) -> ServerResult<()> {
        self.snapshots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(snapshot.clone());
        info!(contacts = snapshot.results.len(), "Snapshot stored in memory");
        Ok(())
    }
}
