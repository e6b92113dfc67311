//! Lifecycle events
//!
//! The task controller emits a [`LifecycleEvent`] for every transition of a
//! submission. Consumers subscribe to the [`EventBus`]:
//!
//! ```text
//!   TaskLifecycleController ──emit──► EventBus (tokio broadcast)
//!                                        │
//!                        ┌───────────────┴───────────────┐
//!                        ▼                               ▼
//!               App (navigation, results)        EventLogger (.jsonl)
//! ```
//!
//! Every event carries the [`SubmissionId`] it belongs to. Consumers drop
//! events whose submission has been superseded.

mod bus;
mod logger;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, create_event_bus};
pub use logger::{EventLogger, read_task_events, spawn_event_logger};
pub use types::{EventLogEntry, LifecycleEvent, SubmissionId};
