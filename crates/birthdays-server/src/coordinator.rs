//! One poll cycle: fetch, extract, compute, publish.

use std::sync::Arc;
use std::time::Instant;

use birthdays_core::{
    BirthdaySnapshot, EngineOptions, GlobalNextBirthday, SensorSnapshot, compute_snapshot,
};
use birthdays_providers::{ContactProvider, extract_contacts};
use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::clock::{Clock, LocalClock};
use crate::error::ServerResult;
use crate::publisher::Publisher;
use crate::registry::SensorRegistry;
use crate::scheduler::Scheduler;

/// Summary of one successful poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollReport {
    /// Date the occurrences were computed for.
    pub today: NaiveDate,
    /// vCards returned by the provider.
    pub fetched: usize,
    /// Contacts with a usable birthday.
    pub contacts: usize,
    /// vCards skipped during extraction.
    pub skipped_vcards: usize,
    /// Contacts skipped by the engine.
    pub skipped_dates: usize,
    /// Sensors seen for the first time.
    pub new_sensors: Vec<String>,
    /// Sensors whose contact is gone.
    pub stale_sensors: Vec<String>,
    /// The aggregate next birthday.
    pub next: GlobalNextBirthday,
}

/// Runs poll cycles against one provider.
pub struct Coordinator {
    provider: Arc<dyn ContactProvider>,
    clock: Arc<dyn Clock>,
    options: EngineOptions,
    publishers: Vec<Box<dyn Publisher>>,
    registry: Mutex<SensorRegistry>,
    latest: RwLock<Option<BirthdaySnapshot>>,
}

impl Coordinator {
    /// Creates a coordinator using the local clock and default engine options.
    pub fn new(provider: Arc<dyn ContactProvider>) -> Self {
        Self {
            provider,
            clock: Arc::new(LocalClock),
            options: EngineOptions::default(),
            publishers: Vec::new(),
            registry: Mutex::new(SensorRegistry::new()),
            latest: RwLock::new(None),
        }
    }

    /// Builder: set the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Builder: set engine options.
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Builder: add a publisher.
    pub fn with_publisher(mut self, publisher: impl Publisher + 'static) -> Self {
        self.publishers.push(Box::new(publisher));
        self
    }

    /// Returns the provider.
    pub fn provider(&self) -> &Arc<dyn ContactProvider> {
        &self.provider
    }

    /// Returns the snapshot of the last successful poll.
    pub async fn latest(&self) -> Option<BirthdaySnapshot> {
        self.latest.read().await.clone()
    }

    /// Runs one poll cycle.
    ///
    /// Provider failures abort the cycle and leave the previous snapshot in
    /// place. Bad vCards and impossible dates only skip the contact. Every
    /// publisher is tried; the first publish error is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails or a publisher fails.
    #[instrument(skip(self), fields(provider = %self.provider.name()))]
    pub async fn poll_once(&self) -> ServerResult<PollReport> {
        let started = Instant::now();
        let fetched = self.provider.fetch_contacts().await?;

        let extraction = extract_contacts(&fetched.contacts);
        let today = self.clock.today();
        let snapshot = compute_snapshot(&extraction.contacts, today, self.options);

        let sensors = SensorSnapshot::from_snapshot(&snapshot);
        let (new_sensors, stale_sensors) = {
            let mut registry = self.registry.lock().await;
            let added = registry.register(&sensors);
            (added, registry.stale())
        };
        if !stale_sensors.is_empty() {
            debug!(stale = ?stale_sensors, "Contacts no longer returned by the provider");
        }

        let mut first_error = None;
        for publisher in &self.publishers {
            if let Err(e) = publisher.publish(&snapshot) {
                warn!(publisher = publisher.name(), error = %e, "Publish failed");
                first_error.get_or_insert(e);
            }
        }

        let report = PollReport {
            today,
            fetched: fetched.len(),
            contacts: extraction.contacts.len(),
            skipped_vcards: extraction.skipped(),
            skipped_dates: snapshot.skipped.len(),
            new_sensors,
            stale_sensors,
            next: snapshot.next.clone(),
        };

        *self.latest.write().await = Some(snapshot);

        info!(
            fetched = report.fetched,
            contacts = report.contacts,
            skipped = report.skipped_vcards + report.skipped_dates,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Poll finished"
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Drives [`Coordinator::poll_once`] from a scheduler until it stops.
    pub async fn run(self: Arc<Self>, scheduler: Scheduler) {
        scheduler
            .run(move || {
                let coordinator = self.clone();
                async move {
                    coordinator
                        .poll_once()
                        .await
                        .map(|_| ())
                        .map_err(|e| e.to_string())
                }
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::ServerError;
    use crate::publisher::{JsonFilePublisher, MemoryPublisher};
    use crate::scheduler::SchedulerConfig;
    use birthdays_core::{LeapDayPolicy, NEXT_BIRTHDAY_UNIQUE_ID};
    use birthdays_providers::{ErrorProvider, ProviderError, StaticProvider};
    use std::time::Duration;

    fn vcard(uid: &str, name: &str, bday: &str) -> String {
        format!(
            "BEGIN:VCARD\r\nVERSION:3.0\r\nUID:{}\r\nFN:{}\r\nBDAY:{}\r\nEND:VCARD\r\n",
            uid, name, bday
        )
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 2, 20).unwrap()
    }

    fn provider() -> Arc<dyn ContactProvider> {
        Arc::new(StaticProvider::from_vcards(
            "test",
            vec![
                vcard("carol", "Carol", "1980-03-05"),
                vcard("leap", "Leap", "2000-02-29"),
                vcard("dave", "Dave", "--03-05"),
                "BEGIN:VCARD\r\nVERSION:3.0\r\nFN:No Birthday\r\nEND:VCARD\r\n".to_string(),
            ],
        ))
    }

    #[tokio::test]
    async fn poll_computes_and_publishes() {
        let memory = MemoryPublisher::new();
        let coordinator = Coordinator::new(provider())
            .with_clock(Arc::new(FixedClock(today())))
            .with_publisher(memory.clone());

        let report = coordinator.poll_once().await.unwrap();

        assert_eq!(report.fetched, 4);
        assert_eq!(report.contacts, 3);
        assert_eq!(report.skipped_vcards, 1);
        assert_eq!(report.new_sensors.len(), 4);
        assert_eq!(
            report.next.date,
            Some(NaiveDate::from_ymd_opt(2023, 2, 28).unwrap())
        );
        assert_eq!(report.next.names, vec!["Leap".to_string()]);

        let published = memory.latest().unwrap();
        assert_eq!(published.results.len(), 3);
        assert_eq!(coordinator.latest().await, Some(published));
    }

    #[tokio::test]
    async fn leap_day_policy_is_applied() {
        let coordinator = Coordinator::new(provider())
            .with_clock(Arc::new(FixedClock(today())))
            .with_options(EngineOptions::default().with_leap_day(LeapDayPolicy::Mar1));

        let report = coordinator.poll_once().await.unwrap();

        assert_eq!(
            report.next.date,
            Some(NaiveDate::from_ymd_opt(2023, 3, 1).unwrap())
        );
        assert_eq!(report.next.age_turning, Some(23));
    }

    #[tokio::test]
    async fn second_poll_reports_no_new_sensors() {
        let coordinator = Coordinator::new(provider()).with_clock(Arc::new(FixedClock(today())));

        coordinator.poll_once().await.unwrap();
        let report = coordinator.poll_once().await.unwrap();

        assert!(report.new_sensors.is_empty());
        assert!(report.stale_sensors.is_empty());
    }

    #[tokio::test]
    async fn provider_failure_keeps_previous_snapshot() {
        let memory = MemoryPublisher::new();
        let failing = Coordinator::new(Arc::new(ErrorProvider::new(
            "carddav",
            ProviderError::authentication("bad password"),
        )))
        .with_publisher(memory.clone());

        let err = failing.poll_once().await.unwrap_err();

        assert!(matches!(err, ServerError::Provider(_)));
        assert!(failing.latest().await.is_none());
        assert!(memory.latest().is_none());
    }

    #[tokio::test]
    async fn empty_address_book_publishes_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("birthdays.json");
        let coordinator = Coordinator::new(Arc::new(StaticProvider::new("empty", vec![])))
            .with_clock(Arc::new(FixedClock(today())))
            .with_publisher(JsonFilePublisher::new(&path));

        let report = coordinator.poll_once().await.unwrap();
        assert!(report.next.is_none());

        let state = JsonFilePublisher::load(&path).unwrap();
        let aggregate = state.get(NEXT_BIRTHDAY_UNIQUE_ID).unwrap();
        assert!(aggregate.state.is_none());
    }

    #[tokio::test]
    async fn run_polls_until_stopped() {
        let memory = MemoryPublisher::new();
        let coordinator = Arc::new(
            Coordinator::new(provider())
                .with_clock(Arc::new(FixedClock(today())))
                .with_publisher(memory.clone()),
        );
        let scheduler = Scheduler::new(SchedulerConfig::new(Duration::from_secs(3600)));
        let handle = scheduler.handle();

        let task = tokio::spawn(coordinator.clone().run(scheduler));

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.poll_now().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop().await.unwrap();
        task.await.unwrap();

        assert_eq!(memory.snapshots().len(), 2);
        assert_eq!(handle.state().await.polls, 2);
    }
}
