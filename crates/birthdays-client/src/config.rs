//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/carddav-birthdays/config.toml` by default.
//!
//! `password` supports secret references:
//! - `pass::path/in/store`: resolved via `pass show`
//! - `env::VAR_NAME`: resolved from the environment
//! - plain text: used as-is

use std::path::{Path, PathBuf};
use std::time::Duration;

use birthdays_core::{EngineOptions, FormatOptions, LeapDayPolicy};
use birthdays_providers::carddav::CardDavConfig;
use serde::{Deserialize, Serialize};

const APP_DIR: &str = "carddav-birthdays";

// ---------------------------------------------------------------------------
// ClientConfig (config.toml)
// ---------------------------------------------------------------------------

/// Configuration for the birthdays client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Debug mode.
    pub debug: bool,

    /// CardDAV server settings.
    pub carddav: Option<CardDavSettings>,

    /// Polling settings.
    pub poll: PollSettings,

    /// Birthday computation and display settings.
    pub birthdays: BirthdaySettings,

    /// Output settings.
    pub output: OutputSettings,
}

/// CardDAV server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CardDavSettings {
    /// Address book collection URL.
    pub url: String,

    /// Username.
    pub username: Option<String>,

    /// Password (supports `pass::` and `env::` prefixes).
    pub password: Option<String>,

    /// Whether to verify TLS certificates.
    pub verify_tls: bool,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for CardDavSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: None,
            password: None,
            verify_tls: true,
            timeout_secs: CardDavConfig::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl CardDavSettings {
    /// Converts to provider configuration, resolving the password reference.
    pub fn to_provider_config(&self) -> Result<CardDavConfig, String> {
        if self.url.trim().is_empty() {
            return Err("[carddav] url is not set".to_string());
        }

        let mut config = CardDavConfig::new(self.url.trim())
            .map_err(|e| format!("invalid [carddav] url `{}`: {}", self.url, e))?
            .with_verify_tls(self.verify_tls)
            .with_timeout(Duration::from_secs(self.timeout_secs.max(1)));

        match (&self.username, &self.password) {
            (Some(username), Some(password)) => {
                let password = crate::secret::resolve(password)
                    .map_err(|e| format!("failed to resolve password: {}", e))?;
                config = config.with_credentials(username, password);
            }
            (Some(_), None) => {
                return Err("[carddav] username is set but password is missing".to_string());
            }
            (None, Some(_)) => {
                return Err("[carddav] password is set but username is missing".to_string());
            }
            (None, None) => {}
        }

        Ok(config)
    }
}

/// Polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    /// Hours between address book polls.
    pub interval_hours: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self { interval_hours: 12 }
    }
}

impl PollSettings {
    /// Poll interval as a duration.
    pub fn interval(&self) -> Result<Duration, String> {
        interval_from_hours(self.interval_hours)
    }
}

/// Longest accepted poll interval.
pub const MAX_INTERVAL_HOURS: u64 = 24 * 365;

/// Converts an hour count into a poll interval.
pub fn interval_from_hours(hours: u64) -> Result<Duration, String> {
    if hours == 0 {
        return Err("poll interval must be at least 1 hour".to_string());
    }
    hours
        .checked_mul(60 * 60)
        .filter(|_| hours <= MAX_INTERVAL_HOURS)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("poll interval must be at most {} hours", MAX_INTERVAL_HOURS))
}

/// Birthday computation and display settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BirthdaySettings {
    /// Where February 29 birthdays fall in non-leap years.
    pub leap_day: LeapDayPolicy,

    /// Maximum number of contacts to print.
    pub limit: Option<usize>,

    /// Only print birthdays within this many days.
    pub within_days: Option<i64>,

    /// Text to show when there are no birthdays.
    pub no_birthday_text: String,
}

impl Default for BirthdaySettings {
    fn default() -> Self {
        Self {
            leap_day: LeapDayPolicy::default(),
            limit: None,
            within_days: None,
            no_birthday_text: FormatOptions::default().no_birthday_text,
        }
    }
}

impl BirthdaySettings {
    /// Engine options derived from these settings.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions::default().with_leap_day(self.leap_day)
    }

    /// Format options derived from these settings.
    pub fn format_options(&self) -> FormatOptions {
        FormatOptions {
            limit: self.limit,
            within_days: self.within_days,
            no_birthday_text: self.no_birthday_text.clone(),
            ..Default::default()
        }
    }
}

/// Output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// JSON file kept current with the latest sensor states.
    pub state_file: Option<PathBuf>,
}

impl ClientConfig {
    /// Loads configuration from the default path, or defaults if it is absent.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        Self::parse(&content)
    }

    /// Parses configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("failed to parse config: {}", e))
    }

    /// Checks settings that deserialize fine but cannot work.
    pub fn validate(&self) -> Result<(), String> {
        self.poll
            .interval()
            .map_err(|e| format!("[poll] interval_hours: {}", e))?;
        if self.birthdays.within_days.is_some_and(|d| d < 0) {
            return Err("[birthdays] within_days must not be negative".to_string());
        }
        if let Some(ref carddav) = self.carddav {
            carddav.to_provider_config()?;
        }
        Ok(())
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }
}
