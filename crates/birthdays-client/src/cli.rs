//! Command-line interface definition.

use std::path::PathBuf;

use birthdays_core::LeapDayPolicy;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::config::{CardDavSettings, ClientConfig};

/// birthdays - upcoming birthdays from a CardDAV address book
#[derive(Debug, Parser)]
#[command(name = "birthdays")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, global = true, env = "BIRTHDAYS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    // --- Connection flags ---
    /// Address book collection URL
    #[arg(long, global = true, env = "BIRTHDAYS_URL")]
    pub url: Option<String>,

    /// CardDAV username
    #[arg(long, global = true, env = "BIRTHDAYS_USERNAME")]
    pub username: Option<String>,

    /// CardDAV password (supports `pass::` and `env::` references)
    #[arg(long, global = true, env = "BIRTHDAYS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    pub insecure: bool,

    // --- Engine flags ---
    /// Where February 29 birthdays fall in non-leap years (feb28 or mar1)
    #[arg(long, global = true)]
    pub leap_day: Option<LeapDayPolicy>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Applies command-line overrides on top of the file configuration.
    pub fn apply_to(&self, config: &mut ClientConfig) {
        if self.debug {
            config.debug = true;
        }

        if self.url.is_some() || self.username.is_some() || self.password.is_some() || self.insecure
        {
            let carddav = config.carddav.get_or_insert_with(CardDavSettings::default);
            if let Some(ref url) = self.url {
                carddav.url = url.clone();
            }
            if let Some(ref username) = self.username {
                carddav.username = Some(username.clone());
            }
            if let Some(ref password) = self.password {
                carddav.password = Some(password.clone());
            }
            if self.insecure {
                carddav.verify_tls = false;
            }
        }

        if let Some(policy) = self.leap_day {
            config.birthdays.leap_day = policy;
        }
    }

    /// Returns true when JSON logs were requested for the daemon.
    pub fn json_logs(&self) -> bool {
        matches!(self.command, Some(Command::Watch(ref args)) if args.json_logs)
    }
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch once and print upcoming birthdays (default)
    Show(ShowArgs),

    /// Poll periodically until interrupted
    Watch(WatchArgs),

    /// Verify the server is reachable and accepts the credentials
    Check,

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments of `show`.
#[derive(Debug, Clone, Default, Args)]
pub struct ShowArgs {
    /// Print sensor states as JSON
    #[arg(long)]
    pub json: bool,

    /// Compute occurrences as if today were this date (YYYY-MM-DD)
    #[arg(long)]
    pub today: Option<NaiveDate>,

    /// Read contacts from a .vcf file instead of the server
    #[arg(long)]
    pub vcf: Option<PathBuf>,

    /// Maximum number of contacts to print
    #[arg(long)]
    pub limit: Option<usize>,

    /// Only print birthdays within this many days
    #[arg(long)]
    pub within: Option<i64>,
}

/// Arguments of `watch`.
#[derive(Debug, Clone, Default, Args)]
pub struct WatchArgs {
    /// Hours between polls
    #[arg(long)]
    pub interval_hours: Option<u64>,

    /// Keep this JSON file current with the latest sensor states
    #[arg(long)]
    pub state_file: Option<PathBuf>,

    /// Print sensor states as JSON after each poll
    #[arg(long)]
    pub json: bool,

    /// Do not print after each poll
    #[arg(long, short)]
    pub quiet: bool,

    /// Log as JSON lines
    #[arg(long)]
    pub json_logs: bool,
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}
