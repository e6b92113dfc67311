//! Task lifecycle controller
//!
//! Creates a remote generation task, owns the poll schedule that tracks it,
//! and publishes every transition on the event bus. At most one task is
//! polled at a time: a new submit cancels whatever came before it.

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::poller::{Poller, Shared, lock};
use super::state::{ControllerState, FailureKind, TaskError, TaskFailure};
use crate::config::PollingConfig;
use crate::events::{EventBus, LifecycleEvent, SubmissionId};
use crate::gateway::{BackendGateway, GenerationRequest, TaskId};

pub struct TaskLifecycleController {
    gateway: Arc<dyn BackendGateway>,
    config: PollingConfig,
    bus: Arc<EventBus>,
    shared: Arc<Mutex<Shared>>,
    poll_task: Option<JoinHandle<()>>,
}

impl TaskLifecycleController {
    pub fn new(gateway: Arc<dyn BackendGateway>, config: PollingConfig, bus: Arc<EventBus>) -> Self {
        debug!(?config, "TaskLifecycleController::new: called");
        Self {
            gateway,
            config,
            bus,
            shared: Arc::new(Mutex::new(Shared::default())),
            poll_task: None,
        }
    }

    /// Create a task for `request` and start polling it
    ///
    /// Returns once the task exists; the outcome arrives on the event bus.
    pub async fn submit(&mut self, request: &GenerationRequest) -> Result<TaskId, TaskError> {
        debug!(prompt = %request.prompt, image = ?request.image, "submit: called");
        if request.image.is_empty() {
            debug!("submit: no image, rejecting");
            return Err(TaskError::MissingImage);
        }

        self.cancel();

        let submission = {
            let mut shared = lock(&self.shared);
            shared.submission = shared.submission.next();
            shared.state = ControllerState::Submitting;
            self.bus.emit(LifecycleEvent::Submitting {
                submission: shared.submission,
            });
            shared.submission
        };
        info!(%submission, "submit: creating task");

        let created = self.gateway.create_task(request).await;

        let mut shared = lock(&self.shared);
        if shared.submission != submission {
            // Nothing can bump the id while we hold &mut self, but never write over a newer submission
            warn!(%submission, current = %shared.submission, "submit: superseded while creating task");
            return created.map_err(TaskError::from);
        }

        match created {
            Ok(task_id) => {
                info!(%submission, %task_id, "submit: task created, polling");
                shared.state = ControllerState::Polling {
                    task_id: task_id.clone(),
                    attempts: 0,
                };
                self.bus.emit(LifecycleEvent::PollingStarted {
                    submission,
                    task_id: task_id.clone(),
                });
                drop(shared);

                let poller = Poller {
                    gateway: Arc::clone(&self.gateway),
                    config: self.config.clone(),
                    bus: Arc::clone(&self.bus),
                    shared: Arc::clone(&self.shared),
                    submission,
                    task_id: task_id.clone(),
                };
                self.poll_task = Some(tokio::spawn(poller.run()));
                Ok(task_id)
            }
            Err(err) => {
                warn!(%submission, error = %err, "submit: task creation failed");
                let failure = TaskFailure::from_gateway(FailureKind::Submission, &err);
                shared.state = ControllerState::Failed { task_id: None, failure: failure.clone() };
                self.bus.emit(LifecycleEvent::Failed {
                    submission,
                    task_id: None,
                    failure,
                });
                Err(TaskError::Submission(err))
            }
        }
    }

    /// Abandon the current submission
    ///
    /// Aborts the poll task and invalidates the submission id, so any
    /// in-flight response is dropped. Returns true if a lifecycle was active.
    pub fn cancel(&mut self) -> bool {
        debug!("cancel: called");
        if let Some(handle) = self.poll_task.take() {
            handle.abort();
        }

        let mut shared = lock(&self.shared);
        let cancelled = shared.submission;
        shared.submission = shared.submission.next();

        if !shared.state.is_active() {
            return false;
        }

        let task_id = shared.state.task_id().cloned();
        info!(submission = %cancelled, task_id = ?task_id, "cancel: lifecycle cancelled");
        shared.state = ControllerState::Idle;
        self.bus.emit(LifecycleEvent::Cancelled {
            submission: cancelled,
            task_id,
        });
        true
    }

    pub fn state(&self) -> ControllerState {
        lock(&self.shared).state.clone()
    }

    pub fn current_submission(&self) -> SubmissionId {
        lock(&self.shared).submission
    }

    pub fn is_active(&self) -> bool {
        lock(&self.shared).state.is_active()
    }
}

impl Drop for TaskLifecycleController {
    fn drop(&mut self) {
        if let Some(handle) = self.poll_task.take() {
            debug!("TaskLifecycleController::drop: aborting poll task");
            handle.abort();
        }
    }
}
