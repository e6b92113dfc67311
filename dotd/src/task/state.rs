//! Controller state and failure types

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::GenerationResult;
use crate::gateway::{GatewayError, TaskId};

/// Lifecycle state of the current submission
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ControllerState {
    #[default]
    Idle,
    Submitting,
    Polling {
        task_id: TaskId,
        /// Status requests issued so far
        attempts: u32,
    },
    Succeeded {
        task_id: TaskId,
        result: GenerationResult,
    },
    Failed {
        task_id: Option<TaskId>,
        failure: TaskFailure,
    },
}

impl ControllerState {
    /// Submitting or polling
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Submitting | Self::Polling { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Failed { .. })
    }

    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            Self::Polling { task_id, .. } | Self::Succeeded { task_id, .. } => Some(task_id),
            Self::Failed { task_id, .. } => task_id.as_ref(),
            Self::Idle | Self::Submitting => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::Polling { .. } => "polling",
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Why a lifecycle ended in failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// Task creation failed
    Submission,
    /// The backend reported the task as failed
    Rejected,
    /// A status poll failed with a non-transient error
    Server,
    /// The polling budget ran out
    Timeout,
    /// The completed payload could not be read
    InvalidResult,
}

/// Failure as presented to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct TaskFailure {
    pub kind: FailureKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl TaskFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    /// Build from a gateway error, keeping its HTTP status
    pub fn from_gateway(kind: FailureKind, err: &GatewayError) -> Self {
        Self {
            kind,
            message: err.to_string(),
            status: err.status(),
        }
    }

    pub fn timeout(attempts: u32) -> Self {
        Self::new(
            FailureKind::Timeout,
            format!("Generation timed out after {} status checks", attempts),
        )
    }

    /// The backend reported the session as invalid
    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(401)
    }
}

/// Errors returned to the caller of `submit`
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    #[error("An image is required")]
    MissingImage,

    #[error(transparent)]
    Submission(#[from] GatewayError),
}
