//! Background scheduler for address book polls.
//!
//! - fixed poll interval (12 hours by default) with jitter
//! - exponential backoff after failed polls, capped at the poll interval
//! - commands: poll now, stop

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};

/// Default time between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60);

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Base interval between polls.
    pub poll_interval: Duration,
    /// Maximum jitter, as a fraction of the interval (0.0-1.0).
    pub jitter_fraction: f64,
    /// Delay after the first failure.
    pub initial_backoff: Duration,
    /// Upper bound for the backoff delay.
    pub max_backoff: Duration,
    /// Growth factor per consecutive failure.
    pub backoff_multiplier: f64,
    /// Poll once as soon as the loop starts.
    pub poll_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            jitter_fraction: 0.05,
            initial_backoff: Duration::from_secs(60),
            max_backoff: Duration::from_secs(60 * 60),
            backoff_multiplier: 2.0,
            poll_on_start: true,
        }
    }
}

impl SchedulerConfig {
    /// Creates a new scheduler config with the given poll interval.
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            ..Default::default()
        }
    }

    /// Builder: set jitter fraction.
    pub fn with_jitter(mut self, fraction: f64) -> Self {
        self.jitter_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    /// Builder: set backoff parameters.
    pub fn with_backoff(mut self, initial: Duration, max: Duration, multiplier: f64) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self.backoff_multiplier = multiplier;
        self
    }

    /// Builder: whether to poll immediately on start.
    pub fn with_poll_on_start(mut self, poll_on_start: bool) -> Self {
        self.poll_on_start = poll_on_start;
        self
    }

    /// Delay until the next regular poll, with jitter applied.
    pub fn next_poll_delay(&self) -> Duration {
        let base = self.poll_interval.as_secs_f64();
        let range = base * self.jitter_fraction;
        let jitter = if range > 0.0 {
            rand::rng().random_range(-range..=range)
        } else {
            0.0
        };
        Duration::from_secs_f64((base + jitter).max(0.0))
    }

    /// Delay after `consecutive_failures` failed polls.
    ///
    /// Never exceeds `max_backoff` nor the poll interval, so a failing
    /// server is retried at least as often as a healthy one is polled.
    pub fn backoff_delay(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(consecutive_failures - 1).unwrap_or(i32::MAX);
        let delay = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let cap = self
            .max_backoff
            .min(self.poll_interval)
            .as_secs_f64();

        Duration::from_secs_f64(delay.min(cap))
    }
}

/// Commands that can be sent to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerCommand {
    /// Poll immediately.
    PollNow,
    /// Leave the loop.
    Stop,
}

/// Scheduler state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerState {
    /// Number of polls attempted.
    pub polls: u64,
    /// Number of consecutive failed polls.
    pub consecutive_failures: u32,
    /// Last successful poll.
    pub last_success: Option<DateTime<Utc>>,
    /// Last poll attempt.
    pub last_attempt: Option<DateTime<Utc>>,
    /// Error of the last failed poll, cleared on success.
    pub last_error: Option<String>,
}

impl SchedulerState {
    /// Creates a new scheduler state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful poll.
    pub fn record_success(&mut self) {
        let now = Utc::now();
        self.polls += 1;
        self.consecutive_failures = 0;
        self.last_success = Some(now);
        self.last_attempt = Some(now);
        self.last_error = None;
    }

    /// Records a failed poll.
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.polls += 1;
        self.consecutive_failures += 1;
        self.last_attempt = Some(Utc::now());
        self.last_error = Some(error.into());
    }
}

/// Shared scheduler state.
pub type SharedSchedulerState = Arc<RwLock<SchedulerState>>;

/// Creates a new shared scheduler state.
pub fn new_scheduler_state() -> SharedSchedulerState {
    Arc::new(RwLock::new(SchedulerState::new()))
}

/// Drives periodic polls.
pub struct Scheduler {
    config: SchedulerConfig,
    state: SharedSchedulerState,
    command_tx: mpsc::Sender<SchedulerCommand>,
    command_rx: mpsc::Receiver<SchedulerCommand>,
}

impl Scheduler {
    /// Creates a new scheduler with the given configuration.
    pub fn new(config: SchedulerConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(16);
        Self {
            config,
            state: new_scheduler_state(),
            command_tx,
            command_rx,
        }
    }

    /// Returns a handle for sending commands to the scheduler.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            command_tx: self.command_tx.clone(),
            state: self.state.clone(),
        }
    }

    /// Returns the shared state.
    pub fn state(&self) -> SharedSchedulerState {
        self.state.clone()
    }

    /// Runs the poll loop until [`SchedulerCommand::Stop`] is received.
    ///
    /// The scheduler keeps its own sender, so dropping every handle does
    /// not end the loop.
    ///
    /// `poll_fn` returns `Err` with a message when a poll fails.
    pub async fn run<F, Fut>(mut self, poll_fn: F)
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: std::future::Future<Output = Result<(), String>> + Send,
    {
        info!(
            interval_secs = self.config.poll_interval.as_secs(),
            "Scheduler started"
        );

        if self.config.poll_on_start {
            self.poll(&poll_fn).await;
        }

        loop {
            let delay = self.next_delay().await;
            debug!(delay_secs = delay.as_secs(), "Scheduling next poll");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    self.poll(&poll_fn).await;
                }
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SchedulerCommand::PollNow) => {
                            debug!("Received PollNow command");
                            self.poll(&poll_fn).await;
                        }
                        Some(SchedulerCommand::Stop) | None => {
                            info!("Scheduler stopping");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn next_delay(&self) -> Duration {
        let failures = self.state.read().await.consecutive_failures;
        if failures > 0 {
            let backoff = self.config.backoff_delay(failures);
            debug!(
                failures = failures,
                backoff_secs = backoff.as_secs(),
                "Using backoff delay"
            );
            return backoff;
        }
        self.config.next_poll_delay()
    }

    async fn poll<F, Fut>(&self, poll_fn: &F)
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<(), String>>,
    {
        debug!("Starting poll");
        match poll_fn().await {
            Ok(()) => {
                debug!("Poll completed");
                self.state.write().await.record_success();
            }
            Err(e) => {
                warn!(error = %e, "Poll failed");
                self.state.write().await.record_failure(e);
            }
        }
    }
}

/// Handle for sending commands to a running scheduler.
#[derive(Clone, Debug)]
pub struct SchedulerHandle {
    command_tx: mpsc::Sender<SchedulerCommand>,
    state: SharedSchedulerState,
}

impl SchedulerHandle {
    /// Requests an immediate poll.
    pub async fn poll_now(&self) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx.send(SchedulerCommand::PollNow).await
    }

    /// Stops the scheduler.
    pub async fn stop(&self) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx.send(SchedulerCommand::Stop).await
    }

    /// Returns a copy of the current scheduler state.
    pub async fn state(&self) -> SchedulerState {
        self.state.read().await.clone()
    }
}
