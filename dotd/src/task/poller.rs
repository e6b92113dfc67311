//! Poll schedule for one submitted task
//!
//! Runs as a spawned tokio task owned by the controller. Every transition is
//! applied under the shared lock and only while the poller's submission is
//! still current, so an aborted or superseded poller can never write state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::result::{GenerationResult, failure_reason};
use super::state::{ControllerState, FailureKind, TaskFailure};
use crate::config::PollingConfig;
use crate::events::{EventBus, LifecycleEvent, SubmissionId};
use crate::gateway::{BackendGateway, GatewayError, TaskId, TaskSnapshot, TaskStatus};

/// State shared between the controller and its poller
#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub(crate) submission: SubmissionId,
    pub(crate) state: ControllerState,
}

pub(crate) fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Floor for the poll period; `tokio::time::interval` rejects zero
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// What a single poll decided
enum Step {
    Continue,
    Done,
}

pub(crate) struct Poller {
    pub(crate) gateway: Arc<dyn BackendGateway>,
    pub(crate) config: PollingConfig,
    pub(crate) bus: Arc<EventBus>,
    pub(crate) shared: Arc<Mutex<Shared>>,
    pub(crate) submission: SubmissionId,
    pub(crate) task_id: TaskId,
}

impl Poller {
    pub(crate) async fn run(self) {
        debug!(submission = %self.submission, task_id = %self.task_id, "Poller::run: called");
        let started = Instant::now();
        let max_duration = self.config.max_duration();

        // First tick completes immediately
        let mut ticker = tokio::time::interval(self.config.interval().max(MIN_POLL_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut attempts: u32 = 0;
        loop {
            ticker.tick().await;

            let remaining = max_duration.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                self.time_out(attempts);
                return;
            }

            attempts += 1;
            if !self.record_attempt(attempts) {
                return;
            }

            let reply = match tokio::time::timeout(remaining, self.gateway.get_task_status(&self.task_id)).await {
                Ok(reply) => reply,
                Err(_) => {
                    debug!(attempt = attempts, "Poller::run: status request outlived the budget");
                    self.time_out(attempts);
                    return;
                }
            };

            let step = match reply {
                Ok(snapshot) => self.observe(snapshot, attempts),
                Err(err) => self.poll_failed(err, attempts),
            };
            if let Step::Done = step {
                return;
            }

            if attempts >= self.config.max_attempts {
                self.time_out(attempts);
                return;
            }
        }
    }

    /// Apply a transition if this poller's submission is still current
    ///
    /// Returns false when the submission was superseded or cancelled.
    fn transition<F>(&self, apply: F) -> bool
    where
        F: FnOnce(&mut ControllerState) -> Option<LifecycleEvent>,
    {
        let mut shared = lock(&self.shared);
        if shared.submission != self.submission {
            debug!(
                submission = %self.submission,
                current = %shared.submission,
                "Poller::transition: stale submission, dropping"
            );
            return false;
        }
        if let Some(event) = apply(&mut shared.state) {
            // Emitted under the lock so event order matches transition order
            self.bus.emit(event);
        }
        true
    }

    fn record_attempt(&self, attempt: u32) -> bool {
        self.transition(|state| {
            if let ControllerState::Polling { attempts, .. } = state {
                *attempts = attempt;
            }
            None
        })
    }

    fn observe(&self, snapshot: TaskSnapshot, attempt: u32) -> Step {
        if snapshot.id != self.task_id {
            warn!(
                expected = %self.task_id,
                got = %snapshot.id,
                attempt,
                "Poller::observe: snapshot for another task, discarding"
            );
            return Step::Continue;
        }

        debug!(task_id = %self.task_id, status = %snapshot.status, attempt, "Poller::observe: status observed");
        match snapshot.status {
            TaskStatus::Pending | TaskStatus::Processing => {
                let current = self.transition(|_| {
                    Some(LifecycleEvent::StatusObserved {
                        submission: self.submission,
                        task_id: self.task_id.clone(),
                        status: snapshot.status,
                        attempt,
                    })
                });
                if current { Step::Continue } else { Step::Done }
            }
            TaskStatus::Completed => {
                match GenerationResult::from_payload(&snapshot.result) {
                    Ok(result) => {
                        info!(task_id = %self.task_id, attempt, "Poller::observe: task completed");
                        self.finish(ControllerState::Succeeded {
                            task_id: self.task_id.clone(),
                            result,
                        });
                    }
                    Err(message) => {
                        warn!(task_id = %self.task_id, %message, "Poller::observe: unreadable result");
                        self.fail(TaskFailure::new(FailureKind::InvalidResult, message));
                    }
                }
                Step::Done
            }
            TaskStatus::Failed => {
                let reason = failure_reason(&snapshot.result);
                info!(task_id = %self.task_id, %reason, "Poller::observe: task failed");
                self.fail(TaskFailure::new(FailureKind::Rejected, reason));
                Step::Done
            }
        }
    }

    fn poll_failed(&self, err: GatewayError, attempt: u32) -> Step {
        if err.is_transient() {
            warn!(task_id = %self.task_id, attempt, error = %err, "Poller::poll_failed: transient, will retry");
            let current = self.transition(|_| {
                Some(LifecycleEvent::TransientPollError {
                    submission: self.submission,
                    task_id: self.task_id.clone(),
                    attempt,
                    message: err.to_string(),
                })
            });
            return if current { Step::Continue } else { Step::Done };
        }

        warn!(task_id = %self.task_id, attempt, error = %err, "Poller::poll_failed: fatal");
        self.fail(TaskFailure::from_gateway(FailureKind::Server, &err));
        Step::Done
    }

    fn time_out(&self, attempts: u32) {
        info!(task_id = %self.task_id, attempts, "Poller::time_out: polling budget exhausted");
        self.fail(TaskFailure::timeout(attempts));
    }

    fn fail(&self, failure: TaskFailure) {
        self.finish(ControllerState::Failed {
            task_id: Some(self.task_id.clone()),
            failure,
        });
    }

    /// Move to a terminal state, at most once per submission
    fn finish(&self, terminal: ControllerState) {
        self.transition(|state| {
            if state.is_terminal() {
                return None;
            }
            let event = match &terminal {
                ControllerState::Succeeded { task_id, result } => LifecycleEvent::Succeeded {
                    submission: self.submission,
                    task_id: task_id.clone(),
                    result: result.clone(),
                },
                ControllerState::Failed { task_id, failure } => LifecycleEvent::Failed {
                    submission: self.submission,
                    task_id: task_id.clone(),
                    failure: failure.clone(),
                },
                _ => return None,
            };
            *state = terminal;
            Some(event)
        });
    }
}
