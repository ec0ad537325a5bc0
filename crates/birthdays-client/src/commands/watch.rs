//! `birthdays watch`: poll on a schedule until interrupted.

use std::sync::Arc;
use std::time::Duration;

use birthdays_core::{OutputFormat, OutputFormatter};
use birthdays_providers::ContactProvider;
use birthdays_server::{Coordinator, JsonFilePublisher, Scheduler, SchedulerConfig, StdoutPublisher};
use tracing::{info, warn};

use crate::cli::WatchArgs;
use crate::config::{ClientConfig, interval_from_hours};
use crate::error::{ClientError, ClientResult};

/// Runs the poll loop until Ctrl-C.
pub async fn run(args: &WatchArgs, config: &ClientConfig) -> ClientResult<()> {
    let provider = Arc::new(super::carddav_provider(config)?);
    let interval = poll_interval(args, config)?;
    let coordinator = build(args, config, provider.clone());

    let scheduler = Scheduler::new(SchedulerConfig::new(interval));
    let handle = scheduler.handle();

    info!(
        provider = provider.name(),
        interval_hours = interval.as_secs() / 3600,
        "Watching address book"
    );
    let task = tokio::spawn(Arc::new(coordinator).run(scheduler));

    tokio::signal::ctrl_c().await?;
    info!("Interrupt received, stopping");

    if let Err(e) = handle.stop().await {
        warn!(error = %e, "Scheduler already stopped");
    }
    task.await
        .map_err(|e| ClientError::Server(format!("poll loop panicked: {}", e)))?;

    let state = handle.state().await;
    info!(
        polls = state.polls,
        last_error = state.last_error.as_deref().unwrap_or("none"),
        "Stopped"
    );
    Ok(())
}

/// Builds the coordinator with the stdout and state file publishers.
pub fn build(
    args: &WatchArgs,
    config: &ClientConfig,
    provider: Arc<dyn ContactProvider>,
) -> Coordinator {
    let mut coordinator =
        Coordinator::new(provider).with_options(config.birthdays.engine_options());

    if !args.quiet {
        let format = if args.json {
            OutputFormat::Json
        } else {
            OutputFormat::Tty
        };
        let formatter = OutputFormatter::new(config.birthdays.format_options());
        coordinator = coordinator.with_publisher(StdoutPublisher::new(formatter, format));
    }

    if let Some(path) = args
        .state_file
        .clone()
        .or_else(|| config.output.state_file.clone())
    {
        info!(path = %path.display(), "Writing sensor states to file");
        coordinator = coordinator.with_publisher(JsonFilePublisher::new(path));
    }

    coordinator
}

/// Poll interval from `--interval-hours`, else `[poll] interval_hours`.
pub fn poll_interval(args: &WatchArgs, config: &ClientConfig) -> ClientResult<Duration> {
    let hours = args.interval_hours.unwrap_or(config.poll.interval_hours);
    interval_from_hours(hours).map_err(ClientError::Config)
}
