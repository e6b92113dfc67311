//! BackendGateway trait definition

use async_trait::async_trait;

use super::{GatewayError, GenerationRequest, LoginResponse, TaskId, TaskSnapshot, UserRecord};

/// Every backend call the client makes
///
/// Implementations read the session token at call time. `register` and
/// `login` are sent without a bearer token.
#[async_trait]
pub trait BackendGateway: Send + Sync {
    async fn register(&self, name: &str, email: &str, password: &str) -> Result<UserRecord, GatewayError>;

    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, GatewayError>;

    /// Look up the current user; every failure is swallowed into `None`
    async fn fetch_current_user(&self) -> Option<UserRecord>;

    /// Create a generation task and return its id
    async fn create_task(&self, request: &GenerationRequest) -> Result<TaskId, GatewayError>;

    async fn get_task_status(&self, task_id: &TaskId) -> Result<TaskSnapshot, GatewayError>;
}
