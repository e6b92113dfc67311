//! Task lifecycle
//!
//! ```text
//!   Idle ──submit──► Submitting ──created──► Polling ──completed──► Succeeded
//!                        │                     │ │
//!                        └──create failed──────┤ └──failed / fatal / budget──► Failed
//!                                              ▼
//!                                   cancel: back to Idle
//! ```

mod controller;
mod poller;
mod result;
mod state;

pub use controller::TaskLifecycleController;
pub use result::{GenerationResult, failure_reason};
pub use state::{ControllerState, FailureKind, TaskError, TaskFailure};
