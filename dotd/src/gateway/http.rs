//! HTTP implementation of the backend gateway
//!
//! Talks to the backend's REST API with reqwest. The bearer token is read from
//! the shared [`Session`] on every call.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{
    BackendGateway, CreateTaskResponse, GatewayError, GenerationRequest, LoginResponse, TaskId, TaskSnapshot, UserRecord,
};
use crate::config::BackendConfig;
use crate::session::Session;

const REGISTER_FALLBACK: &str = "Failed to register";
const LOGIN_FALLBACK: &str = "Failed to log in";
const CREATE_TASK_FALLBACK: &str = "Failed to create task";
const TASK_STATUS_FALLBACK: &str = "Failed to get task status";

/// Message used when the error body parses but carries no detail
const GENERIC_SERVER_ERROR: &str = "Server error";

/// reqwest-backed gateway
pub struct HttpGateway {
    base_url: String,
    http: Client,
    session: Session,
}

impl HttpGateway {
    pub fn new(config: &BackendConfig, session: Session) -> Result<Self, GatewayError> {
        debug!(base_url = %config.base_url, timeout_ms = config.timeout_ms, "HttpGateway::new: called");
        let http = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attach the bearer token if the session holds one
    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.session.current_token() {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    /// JSON or bodiless request carrying the session credential
    fn authed_json(&self, builder: RequestBuilder) -> RequestBuilder {
        self.authorize(builder).header(CONTENT_TYPE, "application/json")
    }
}

/// Pull a user-facing message out of a failed response
///
/// A body that is not JSON yields `fallback`. A JSON body without a usable
/// `detail` yields the generic server error.
pub async fn failure_message(response: Response, fallback: &str) -> String {
    let text = match response.text().await {
        Ok(text) => text,
        Err(e) => {
            debug!(error = %e, "failure_message: could not read body");
            return fallback.to_string();
        }
    };
    detail_from_body(&text, fallback)
}

fn detail_from_body(text: &str, fallback: &str) -> String {
    let body: Value = match serde_json::from_str(text) {
        Ok(body) => body,
        Err(_) => return fallback.to_string(),
    };

    match body.get("detail") {
        Some(Value::String(detail)) if !detail.trim().is_empty() => detail.clone(),
        // FastAPI validation errors: [{"loc": [...], "msg": "...", "type": "..."}]
        Some(Value::Array(items)) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            if messages.is_empty() {
                GENERIC_SERVER_ERROR.to_string()
            } else {
                messages.join("; ")
            }
        }
        _ => GENERIC_SERVER_ERROR.to_string(),
    }
}

fn is_validation_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 400 | 409 | 422)
}

fn is_auth_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 400 | 401 | 403 | 422)
}

#[async_trait]
impl BackendGateway for HttpGateway {
    async fn register(&self, name: &str, email: &str, password: &str) -> Result<UserRecord, GatewayError> {
        debug!(%email, "register: called");
        let body = json!({ "name": name, "email": email, "password": password });
        // Account creation is anonymous even with a session in place
        let response = self
            .http
            .post(self.url("/auth/register"))
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = failure_message(response, REGISTER_FALLBACK).await;
            debug!(%status, %message, "register: rejected");
            return Err(if is_validation_status(status) {
                GatewayError::Validation {
                    status: status.as_u16(),
                    message,
                }
            } else {
                GatewayError::Server {
                    status: status.as_u16(),
                    message,
                }
            });
        }

        Ok(response.json().await?)
    }

    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, GatewayError> {
        debug!(%email, "login: called");
        let body = json!({ "email": email, "password": password });
        // Never carries a bearer token
        let response = self
            .http
            .post(self.url("/auth/login"))
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = failure_message(response, LOGIN_FALLBACK).await;
            debug!(%status, %message, "login: rejected");
            return Err(if is_auth_status(status) {
                GatewayError::Auth {
                    status: status.as_u16(),
                    message,
                }
            } else {
                GatewayError::Server {
                    status: status.as_u16(),
                    message,
                }
            });
        }

        Ok(response.json().await?)
    }

    async fn fetch_current_user(&self) -> Option<UserRecord> {
        debug!("fetch_current_user: called");
        let response = match self.authed_json(self.http.get(self.url("/users/me"))).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "fetch_current_user: request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            debug!(status = %response.status(), "fetch_current_user: not signed in");
            return None;
        }

        match response.json::<UserRecord>().await {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "fetch_current_user: unreadable user record");
                None
            }
        }
    }

    async fn create_task(&self, request: &GenerationRequest) -> Result<TaskId, GatewayError> {
        debug!(
            file_name = %request.image.file_name,
            bytes = request.image.bytes.len(),
            "create_task: called"
        );
        let image = Part::bytes(request.image.bytes.clone())
            .file_name(request.image.file_name.clone())
            .mime_str(&request.image.mime_type)?;
        let form = Form::new()
            .part("image", image)
            .text("text", request.prompt.clone())
            .text("gender", request.gender.clone())
            .text("age_group", request.age_group.clone());

        // reqwest sets the multipart content type with its boundary
        let response = self
            .authorize(self.http.post(self.url("/api/create_task")))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = failure_message(response, CREATE_TASK_FALLBACK).await;
            debug!(%status, %message, "create_task: rejected");
            return Err(GatewayError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let created: CreateTaskResponse = response.json().await?;
        debug!(task_id = %created.task_id, "create_task: created");
        Ok(created.task_id)
    }

    async fn get_task_status(&self, task_id: &TaskId) -> Result<TaskSnapshot, GatewayError> {
        debug!(%task_id, "get_task_status: called");
        let path = format!("/api/task_status/{}", task_id);
        let response = self.authed_json(self.http.get(self.url(&path))).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = failure_message(response, TASK_STATUS_FALLBACK).await;
            debug!(%status, %message, "get_task_status: rejected");
            return Err(GatewayError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}
