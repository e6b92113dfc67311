//! Lifecycle event types
//!
//! Every controller transition emits one of these. The app shell applies them
//! to navigation and the result store, and the event logger persists them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gateway::{TaskId, TaskStatus};
use crate::task::{GenerationResult, TaskFailure};

/// Identifies one lifecycle instance
///
/// Assigned by the controller on every submit. Events for a submission other
/// than the current one are stale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(pub u64);

impl SubmissionId {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LifecycleEvent {
    /// Task creation request sent
    Submitting { submission: SubmissionId },
    /// Task created, polling scheduled
    PollingStarted { submission: SubmissionId, task_id: TaskId },
    /// A poll observed a non-terminal status
    StatusObserved {
        submission: SubmissionId,
        task_id: TaskId,
        status: TaskStatus,
        attempt: u32,
    },
    /// A poll failed but will be retried
    TransientPollError {
        submission: SubmissionId,
        task_id: TaskId,
        attempt: u32,
        message: String,
    },
    Succeeded {
        submission: SubmissionId,
        task_id: TaskId,
        result: GenerationResult,
    },
    Failed {
        submission: SubmissionId,
        task_id: Option<TaskId>,
        failure: TaskFailure,
    },
    /// The lifecycle was abandoned before reaching a terminal state
    Cancelled {
        submission: SubmissionId,
        task_id: Option<TaskId>,
    },
}

impl LifecycleEvent {
    pub fn submission(&self) -> SubmissionId {
        match self {
            Self::Submitting { submission }
            | Self::PollingStarted { submission, .. }
            | Self::StatusObserved { submission, .. }
            | Self::TransientPollError { submission, .. }
            | Self::Succeeded { submission, .. }
            | Self::Failed { submission, .. }
            | Self::Cancelled { submission, .. } => *submission,
        }
    }

    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            Self::Submitting { .. } => None,
            Self::PollingStarted { task_id, .. }
            | Self::StatusObserved { task_id, .. }
            | Self::TransientPollError { task_id, .. }
            | Self::Succeeded { task_id, .. } => Some(task_id),
            Self::Failed { task_id, .. } | Self::Cancelled { task_id, .. } => task_id.as_ref(),
        }
    }

    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Submitting { .. } => "Submitting",
            Self::PollingStarted { .. } => "PollingStarted",
            Self::StatusObserved { .. } => "StatusObserved",
            Self::TransientPollError { .. } => "TransientPollError",
            Self::Succeeded { .. } => "Succeeded",
            Self::Failed { .. } => "Failed",
            Self::Cancelled { .. } => "Cancelled",
        }
    }

    /// Last event of a submission
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }
}

/// A timestamped event log entry for file persistence
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventLogEntry {
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    pub event: LifecycleEvent,
}

impl EventLogEntry {
    /// Create a new log entry with current timestamp
    pub fn new(event: LifecycleEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}
