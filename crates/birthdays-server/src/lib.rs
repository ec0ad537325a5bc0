//! Poll loop for the CardDAV birthdays service.
//!
//! - [`scheduler`]: timing, backoff and control commands
//! - [`coordinator`]: one poll cycle from fetch to publish
//! - [`publisher`]: where snapshots go (stdout, JSON state file, memory)
//! - [`registry`]: which sensors have been announced
//! - [`clock`]: source of today's date

pub mod clock;
pub mod coordinator;
pub mod error;
pub mod publisher;
pub mod registry;
pub mod scheduler;

pub use clock::{Clock, FixedClock, LocalClock};
pub use coordinator::{Coordinator, PollReport};
pub use error::{ServerError, ServerResult};
pub use publisher::{JsonFilePublisher, MemoryPublisher, Publisher, StdoutPublisher};
pub use registry::SensorRegistry;
pub use scheduler::{
    DEFAULT_POLL_INTERVAL, Scheduler, SchedulerCommand, SchedulerConfig, SchedulerHandle,
    SchedulerState, SharedSchedulerState,
};
