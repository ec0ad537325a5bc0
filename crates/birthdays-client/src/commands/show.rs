//! `birthdays show`: one poll, printed.

use std::path::Path;
use std::sync::Arc;

use birthdays_core::{OutputFormat, OutputFormatter};
use birthdays_providers::{ContactProvider, StaticProvider, split_vcards};
use birthdays_server::{Clock, Coordinator, FixedClock, LocalClock, StdoutPublisher};
use tracing::debug;

use crate::cli::ShowArgs;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Fetches contacts once and prints the upcoming birthdays.
pub async fn run(args: &ShowArgs, config: &ClientConfig) -> ClientResult<()> {
    let coordinator = build(args, config)?;
    let report = coordinator.poll_once().await?;

    debug!(
        contacts = report.contacts,
        skipped = report.skipped_vcards + report.skipped_dates,
        "Show finished"
    );
    Ok(())
}

/// Builds the coordinator `show` runs: one stdout publisher, the
/// configured provider or a `.vcf` file, and a fixed clock with `--today`.
pub fn build(args: &ShowArgs, config: &ClientConfig) -> ClientResult<Coordinator> {
    let provider: Arc<dyn ContactProvider> = match args.vcf {
        Some(ref path) => Arc::new(vcf_provider(path)?),
        None => Arc::new(super::carddav_provider(config)?),
    };

    let clock: Arc<dyn Clock> = match args.today {
        Some(today) => Arc::new(FixedClock(today)),
        None => Arc::new(LocalClock),
    };

    let mut options = config.birthdays.format_options();
    if args.limit.is_some() {
        options.limit = args.limit;
    }
    if args.within.is_some() {
        options.within_days = args.within;
    }

    let format = if args.json {
        OutputFormat::Json
    } else {
        OutputFormat::Tty
    };

    Ok(Coordinator::new(provider)
        .with_clock(clock)
        .with_options(config.birthdays.engine_options())
        .with_publisher(StdoutPublisher::new(OutputFormatter::new(options), format)))
}

/// Loads every vCard of a `.vcf` file.
pub fn vcf_provider(path: &Path) -> ClientResult<StaticProvider> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        ClientError::Config(format!("failed to read {}: {}", path.display(), e))
    })?;

    let cards = split_vcards(&text);
    debug!(path = %path.display(), cards = cards.len(), "Loaded vCard file");

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "vcf".to_string());
    Ok(StaticProvider::from_vcards(name, cards))
}
