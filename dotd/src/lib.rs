//! DOTD - client core for an asynchronous outfit-analysis backend
//!
//! A user submits a photo and a prompt. The backend creates a generation task
//! that the client polls to completion under a bounded budget. The outcome is
//! reconciled into a result store and a navigation state machine, alongside an
//! authenticated session.
//!
//! # Modules
//!
//! - [`session`] - Shared bearer credential and the user model
//! - [`gateway`] - Backend gateway trait and the reqwest implementation
//! - [`task`] - Task lifecycle controller and poll schedule
//! - [`events`] - Lifecycle event bus and JSONL event log
//! - [`navigation`] - Navigation state machine
//! - [`store`] - Result store
//! - [`app`] - Application shell accepting user intents
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod app;
pub mod cli;
pub mod config;
pub mod events;
pub mod gateway;
pub mod navigation;
pub mod session;
pub mod store;
pub mod task;

// Re-export commonly used types
pub use app::{App, AppError, Intent, Outcome};
pub use config::Config;
pub use events::{EventBus, LifecycleEvent, SubmissionId};
pub use gateway::{BackendGateway, GatewayError, GenerationRequest, HttpGateway, ImageUpload, TaskId, TaskStatus};
pub use navigation::{NavigationView, Navigator};
pub use session::{Session, User};
pub use store::ResultStore;
pub use task::{ControllerState, FailureKind, GenerationResult, TaskError, TaskFailure, TaskLifecycleController};
