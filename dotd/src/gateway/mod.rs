//! Backend gateway
//!
//! Typed access to the backend's auth, user, and task endpoints.

use std::sync::Arc;

use tracing::debug;

pub mod client;
mod error;
mod http;
mod types;

pub use client::BackendGateway;
pub use error::GatewayError;
pub use http::{HttpGateway, failure_message};
pub use types::{
    CreateTaskResponse, GenerationRequest, ImageUpload, LoginResponse, TaskId, TaskSnapshot, TaskStatus, UserId,
    UserRecord,
};

use crate::config::BackendConfig;
use crate::session::Session;

/// Create the HTTP gateway as a shared trait object
pub fn create_gateway(config: &BackendConfig, session: Session) -> Result<Arc<dyn BackendGateway>, GatewayError> {
    debug!(base_url = %config.base_url, "create_gateway: called");
    Ok(Arc::new(HttpGateway::new(config, session)?))
}
