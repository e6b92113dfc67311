//! Application shell
//!
//! Wires the session, gateway, task controller, navigator and result store
//! together. The presentation layer sends [`Intent`]s in and reads state back
//! out. Lifecycle events from the controller are applied here, which keeps the
//! controller and the navigator unaware of each other.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{Config, PollingConfig};
use crate::events::{EventBus, LifecycleEvent, SubmissionId, create_event_bus};
use crate::gateway::{BackendGateway, GatewayError, GenerationRequest, TaskId, UserRecord, create_gateway};
use crate::navigation::{NavigationView, Navigator};
use crate::session::{Session, User};
use crate::store::ResultStore;
use crate::task::{ControllerState, GenerationResult, TaskError, TaskFailure, TaskLifecycleController};

/// User intents emitted by the presentation layer
#[derive(Debug, Clone)]
pub enum Intent {
    Navigate(NavigationView),
    OpenProfile,
    UploadToFeed,
    Submit(GenerationRequest),
    Recreate,
    Login { email: String, password: String },
    Logout,
    Register { name: String, email: String, password: String },
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Navigate(_) => "navigate",
            Self::OpenProfile => "open-profile",
            Self::UploadToFeed => "upload-to-feed",
            Self::Submit(_) => "submit",
            Self::Recreate => "recreate",
            Self::Login { .. } => "login",
            Self::Logout => "logout",
            Self::Register { .. } => "register",
        }
    }
}

/// How a submission ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded(GenerationResult),
    Failed(TaskFailure),
    Cancelled,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("There is no previous request to recreate")]
    NothingToRecreate,

    #[error("Timed out waiting for the generation to finish")]
    OutcomeTimeout,
}

pub struct App {
    session: Session,
    gateway: Arc<dyn BackendGateway>,
    bus: Arc<EventBus>,
    controller: TaskLifecycleController,
    navigator: Navigator,
    results: ResultStore,
    user: User,
    events: broadcast::Receiver<LifecycleEvent>,
    last_request: Option<GenerationRequest>,
    /// Submission whose terminal state has already been applied
    settled: Option<SubmissionId>,
}

impl App {
    pub fn new(
        session: Session,
        gateway: Arc<dyn BackendGateway>,
        polling: PollingConfig,
        bus: Arc<EventBus>,
    ) -> Self {
        debug!("App::new: called");
        let events = bus.subscribe();
        let controller = TaskLifecycleController::new(Arc::clone(&gateway), polling, Arc::clone(&bus));
        Self {
            session,
            gateway,
            bus,
            controller,
            navigator: Navigator::new(),
            results: ResultStore::new(),
            user: User::guest(),
            events,
            last_request: None,
            settled: None,
        }
    }

    /// Build an app talking HTTP to the configured backend
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        debug!(base_url = %config.backend.base_url, "App::from_config: called");
        let session = Session::new();
        let gateway = create_gateway(&config.backend, session.clone())?;
        let bus = create_event_bus(config.events.channel_capacity);
        Ok(Self::new(session, gateway, config.polling.clone(), bus))
    }

    // === Read side ===

    pub fn view(&self) -> NavigationView {
        self.navigator.current()
    }

    /// Message to show inline on the current view
    pub fn failure(&self) -> Option<&str> {
        self.navigator.failure()
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn result(&self) -> Option<&GenerationResult> {
        self.results.current()
    }

    pub fn task_state(&self) -> ControllerState {
        self.controller.state()
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    // === Intents ===

    pub async fn dispatch(&mut self, intent: Intent) -> Result<(), AppError> {
        debug!(intent = intent.name(), "dispatch: called");
        match intent {
            Intent::Navigate(view) => self.navigate(view),
            Intent::OpenProfile => self.open_profile(),
            Intent::UploadToFeed => self.upload_to_feed(),
            Intent::Submit(request) => {
                self.submit(request).await?;
            }
            Intent::Recreate => {
                self.recreate().await?;
            }
            Intent::Login { email, password } => {
                self.login(&email, &password).await?;
            }
            Intent::Logout => self.logout(),
            Intent::Register { name, email, password } => {
                self.register(&name, &email, &password).await?;
            }
        }
        Ok(())
    }

    /// Explicit user navigation
    ///
    /// Leaving the loading view abandons the task being polled. Entering the
    /// generate view discards the previous result.
    pub fn navigate(&mut self, view: NavigationView) {
        debug!(from = %self.navigator.current(), to = %view, "navigate: called");
        self.leave_view(view);
        if view == NavigationView::Generate {
            self.results.clear();
        }
        self.navigator.navigate(view);
    }

    /// Run before any move to `view`; abandons the in-flight task when leaving Loading
    fn leave_view(&mut self, view: NavigationView) {
        self.pump();
        if self.navigator.current() == NavigationView::Loading
            && view != NavigationView::Loading
            && self.controller.is_active()
        {
            info!(to = %view, "leave_view: leaving loading view, cancelling task");
            self.controller.cancel();
        }
    }

    /// Profile button: my page when signed in, login otherwise
    pub fn open_profile(&mut self) {
        let target = if self.user.is_logged_in {
            NavigationView::MyPage
        } else {
            NavigationView::Login
        };
        self.navigate(target);
    }

    pub fn upload_to_feed(&mut self) {
        self.navigate(NavigationView::Feed);
    }

    pub async fn submit(&mut self, request: GenerationRequest) -> Result<TaskId, AppError> {
        debug!(prompt = %request.prompt, "submit: called");
        let submitted = self.controller.submit(&request).await;
        self.pump();

        if !matches!(submitted, Err(TaskError::MissingImage)) {
            self.last_request = Some(request);
        }

        match submitted {
            Ok(task_id) => Ok(task_id),
            Err(TaskError::MissingImage) => {
                let view = self.navigator.current();
                self.navigator.fail_at(view, TaskError::MissingImage.to_string());
                Err(TaskError::MissingImage.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Start over with the last request
    pub async fn recreate(&mut self) -> Result<TaskId, AppError> {
        debug!("recreate: called");
        self.navigate(NavigationView::Generate);
        let request = self.last_request.clone().ok_or(AppError::NothingToRecreate)?;
        self.submit(request).await
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<User, AppError> {
        debug!(%email, "login: called");
        let response = match self.gateway.login(email, password).await {
            Ok(response) => response,
            Err(err) => {
                info!(%email, error = %err, "login: rejected");
                self.leave_view(NavigationView::Login);
                self.navigator.fail_at(NavigationView::Login, err.to_string());
                return Err(err.into());
            }
        };

        // Token and signed-in user change together; the profile lookup refines the user
        self.session.set_token(Some(response.access_token));
        self.user = User::signed_in(email);
        match self.gateway.fetch_current_user().await {
            Some(record) => self.user = User::from_record(record),
            None => warn!(%email, "login: profile unavailable, using email"),
        }
        info!(user_id = %self.user.id, "login: signed in");
        self.leave_view(NavigationView::Home);
        self.navigator.login_succeeded();
        Ok(self.user.clone())
    }

    pub fn logout(&mut self) {
        debug!("logout: called");
        self.session.set_token(None);
        self.user = User::guest();
        self.navigate(NavigationView::Login);
    }

    pub async fn register(&mut self, name: &str, email: &str, password: &str) -> Result<UserRecord, AppError> {
        debug!(%email, "register: called");
        match self.gateway.register(name, email, password).await {
            Ok(record) => {
                info!(user_id = %record.id, "register: account created");
                Ok(record)
            }
            Err(err) => {
                info!(%email, error = %err, "register: rejected");
                let view = self.navigator.current();
                self.navigator.fail_at(view, err.to_string());
                Err(err.into())
            }
        }
    }

    /// Install a stored token and check it still works
    ///
    /// Returns false, leaving the session cleared, if the backend rejects it.
    pub async fn restore_session(&mut self, token: SecretString) -> bool {
        debug!("restore_session: called");
        // The user stays the guest until the profile lookup confirms the token
        self.session.set_token(Some(token));
        match self.gateway.fetch_current_user().await {
            Some(record) => {
                self.user = User::from_record(record);
                info!(user_id = %self.user.id, "restore_session: session restored");
                true
            }
            None => {
                info!("restore_session: token rejected");
                self.invalidate_session();
                false
            }
        }
    }

    // === Lifecycle events ===

    /// Apply every queued lifecycle event without blocking
    ///
    /// Returns the number of events applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    if self.apply_event(event) {
                        applied += 1;
                    }
                }
                Err(TryRecvError::Lagged(missed)) => {
                    warn!(missed, "pump: lagged behind, reconciling from controller state");
                    self.reconcile();
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        applied
    }

    /// Wait until the current submission settles
    ///
    /// With nothing in flight this returns the last outcome immediately, or
    /// `Cancelled` if there is none.
    pub async fn wait_for_outcome(&mut self, timeout: Duration) -> Result<Outcome, AppError> {
        debug!(?timeout, "wait_for_outcome: called");
        let deadline = Instant::now() + timeout;
        loop {
            // Read state first: a terminal state's event is already queued
            let outcome = self.settled_outcome();
            self.pump();
            if let Some(outcome) = outcome {
                return Ok(outcome);
            }

            match tokio::time::timeout_at(deadline, self.events.recv()).await {
                Ok(Ok(event)) => {
                    self.apply_event(event);
                }
                Ok(Err(RecvError::Lagged(missed))) => {
                    warn!(missed, "wait_for_outcome: lagged behind, reconciling");
                    self.reconcile();
                }
                Ok(Err(RecvError::Closed)) => {
                    // The controller holds a sender for as long as we exist
                    return Ok(self.settled_outcome().unwrap_or(Outcome::Cancelled));
                }
                Err(_) => return Err(AppError::OutcomeTimeout),
            }
        }
    }

    fn settled_outcome(&self) -> Option<Outcome> {
        match self.controller.state() {
            ControllerState::Succeeded { result, .. } => Some(Outcome::Succeeded(result)),
            ControllerState::Failed { failure, .. } => Some(Outcome::Failed(failure)),
            ControllerState::Idle => Some(Outcome::Cancelled),
            ControllerState::Submitting | ControllerState::Polling { .. } => None,
        }
    }

    /// Returns false if the event was stale
    fn apply_event(&mut self, event: LifecycleEvent) -> bool {
        let current = self.controller.current_submission();
        if event.submission() != current {
            debug!(
                event_type = event.event_type(),
                submission = %event.submission(),
                %current,
                "apply_event: stale event, dropping"
            );
            return false;
        }

        self.navigator.apply(&event);
        match event {
            LifecycleEvent::Succeeded { submission, result, .. } => {
                self.results.set(result);
                self.settled = Some(submission);
            }
            LifecycleEvent::Failed { submission, failure, .. } => {
                self.results.clear();
                if failure.is_unauthorized() {
                    warn!("apply_event: backend rejected the session");
                    self.invalidate_session();
                }
                self.settled = Some(submission);
            }
            _ => {}
        }
        true
    }

    /// Bring navigation and results in line with the controller after missed events
    fn reconcile(&mut self) {
        let submission = self.controller.current_submission();
        let state = self.controller.state();
        debug!(%submission, state = state.name(), "reconcile: called");
        match state {
            ControllerState::Submitting | ControllerState::Polling { .. } => {
                if self.navigator.current() != NavigationView::Loading {
                    self.navigator.navigate(NavigationView::Loading);
                }
            }
            ControllerState::Succeeded { result, .. } if self.settled != Some(submission) => {
                self.results.set(result);
                self.navigator.navigate(NavigationView::Result);
                self.settled = Some(submission);
            }
            ControllerState::Failed { failure, .. } if self.settled != Some(submission) => {
                self.results.clear();
                self.navigator.fail_at(NavigationView::Generate, failure.message.clone());
                if failure.is_unauthorized() {
                    self.invalidate_session();
                }
                self.settled = Some(submission);
            }
            _ => {}
        }
    }

    fn invalidate_session(&mut self) {
        self.session.set_token(None);
        self.user = User::guest();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::client::mock::{MockGateway, snapshot};
    use crate::gateway::{ImageUpload, TaskStatus, UserId};
    use crate::task::FailureKind;
    use serde_json::{Value, json};

    const WAIT: Duration = Duration::from_secs(5);

    fn setup() -> (Arc<MockGateway>, App) {
        let session = Session::new();
        let gateway = Arc::new(MockGateway::new(session.clone()));
        let polling = PollingConfig {
            interval_ms: 10,
            max_attempts: 50,
            max_duration_ms: 5_000,
        };
        let app = App::new(session, gateway.clone(), polling, Arc::new(EventBus::new(64)));
        (gateway, app)
    }

    fn photo(prompt: &str) -> GenerationRequest {
        GenerationRequest::new(ImageUpload::new("photo.jpg", "image/jpeg", vec![0xff, 0xd8]), prompt)
    }

    fn record(id: &str, name: &str) -> UserRecord {
        UserRecord {
            id: UserId::new(id),
            name: name.to_string(),
            email: None,
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn test_cafe_outfit_scenario() {
        let (gateway, mut app) = setup();
        gateway.push_create(Ok(TaskId::new("t1")));
        gateway.push_status(Ok(snapshot("t1", TaskStatus::Pending, Value::Null)));
        gateway.push_status(Ok(snapshot("t1", TaskStatus::Processing, Value::Null)));
        gateway.push_status(Ok(snapshot(
            "t1",
            TaskStatus::Completed,
            json!({"analysis": "Soft neutrals", "recommendation": "Try a beige cardigan", "tags": ["Basic"]}),
        )));

        app.navigate(NavigationView::Generate);
        app.submit(photo("cafe outfit")).await.unwrap();
        assert_eq!(app.view(), NavigationView::Loading);

        let outcome = app.wait_for_outcome(WAIT).await.unwrap();
        let result = match outcome {
            Outcome::Succeeded(result) => result,
            other => panic!("Expected success, got {:?}", other),
        };
        assert_eq!(result.analysis, "Soft neutrals");
        assert_eq!(result.recommendation, "Try a beige cardigan");
        assert_eq!(result.tags, vec!["Basic".to_string()]);
        assert_eq!(app.result(), Some(&result));
        assert_eq!(app.view(), NavigationView::Result);
    }

    #[tokio::test]
    async fn test_create_failure_returns_to_generate() {
        let (gateway, mut app) = setup();
        gateway.push_create(Err(GatewayError::Server {
            status: 500,
            message: "quota exceeded".to_string(),
        }));

        app.navigate(NavigationView::Generate);
        let err = app.submit(photo("x")).await.unwrap_err();
        assert_eq!(err.to_string(), "quota exceeded");

        assert_eq!(app.view(), NavigationView::Generate);
        assert_eq!(app.failure(), Some("quota exceeded"));
        assert!(app.result().is_none());
        match app.wait_for_outcome(WAIT).await.unwrap() {
            Outcome::Failed(failure) => assert_eq!(failure.kind, FailureKind::Submission),
            other => panic!("Expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_image_stays_put() {
        let (gateway, mut app) = setup();
        app.navigate(NavigationView::Generate);

        let empty = GenerationRequest::new(ImageUpload::new("a.png", "image/png", Vec::new()), "prompt");
        let err = app.submit(empty).await.unwrap_err();
        assert!(matches!(err, AppError::Task(TaskError::MissingImage)));
        assert_eq!(app.view(), NavigationView::Generate);
        assert_eq!(app.failure(), Some("An image is required"));
        assert_eq!(gateway.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_unauthorized_poll_invalidates_session() {
        let (gateway, mut app) = setup();
        gateway.set_current_user(Some(record("7", "Kim")));
        app.login("kim@example.com", "pw").await.unwrap();
        assert!(app.session().is_authenticated());

        gateway.push_status(Err(GatewayError::Server {
            status: 401,
            message: "Not authenticated".to_string(),
        }));
        app.navigate(NavigationView::Generate);
        app.submit(photo("x")).await.unwrap();

        match app.wait_for_outcome(WAIT).await.unwrap() {
            Outcome::Failed(failure) => assert!(failure.is_unauthorized()),
            other => panic!("Expected failure, got {:?}", other),
        }
        assert_eq!(app.view(), NavigationView::Generate);
        assert_eq!(app.failure(), Some("Not authenticated"));
        assert!(!app.session().is_authenticated());
        assert!(!app.user().is_logged_in);
    }

    #[tokio::test]
    async fn test_leaving_loading_cancels_polling() {
        let (gateway, mut app) = setup();
        app.navigate(NavigationView::Generate);
        app.submit(photo("x")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        app.navigate(NavigationView::Home);
        assert_eq!(app.task_state(), ControllerState::Idle);

        let calls = gateway.status_calls();
        tokio::time::sleep(Duration::from_millis(50)).await;
        app.pump();
        assert_eq!(gateway.status_calls(), calls);
        assert_eq!(app.view(), NavigationView::Home);
        assert_eq!(app.wait_for_outcome(WAIT).await.unwrap(), Outcome::Cancelled);
    }

    #[tokio::test]
    async fn test_login_while_loading_cancels_polling() {
        let (gateway, mut app) = setup();
        app.navigate(NavigationView::Generate);
        app.submit(photo("x")).await.unwrap();
        assert_eq!(app.view(), NavigationView::Loading);

        app.login("a@b.c", "pw").await.unwrap();
        assert_eq!(app.view(), NavigationView::Home);
        assert_eq!(app.task_state(), ControllerState::Idle);

        let calls = gateway.status_calls();
        tokio::time::sleep(Duration::from_millis(60)).await;
        app.pump();
        assert_eq!(gateway.status_calls(), calls);
        assert_eq!(app.view(), NavigationView::Home);
    }

    #[tokio::test]
    async fn test_rejected_login_while_loading_cancels_polling() {
        let (gateway, mut app) = setup();
        gateway.push_login(Err(GatewayError::Auth {
            status: 401,
            message: "Incorrect email or password".to_string(),
        }));
        app.submit(photo("x")).await.unwrap();

        assert!(app.login("a@b.c", "wrong").await.is_err());
        assert_eq!(app.view(), NavigationView::Login);
        assert_eq!(app.failure(), Some("Incorrect email or password"));
        assert!(!app.task_state().is_active());
    }

    #[tokio::test]
    async fn test_stale_submission_never_reaches_navigation() {
        let (gateway, mut app) = setup();
        gateway.push_create(Ok(TaskId::new("old")));
        gateway.push_create(Ok(TaskId::new("new")));
        gateway.set_status_delay(Duration::from_millis(20));

        app.navigate(NavigationView::Generate);
        app.submit(photo("first")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        // A reply for the old task would be applied if the first poll survived
        gateway.push_status(Ok(snapshot("old", TaskStatus::Failed, json!("stale failure"))));
        gateway.push_status(Ok(snapshot(
            "new",
            TaskStatus::Completed,
            json!({"analysis": "fresh", "recommendation": "", "tags": []}),
        )));
        app.submit(photo("second")).await.unwrap();

        let outcome = app.wait_for_outcome(WAIT).await.unwrap();
        // The first reply (for "old") reaches the second poller and is discarded by id
        match outcome {
            Outcome::Succeeded(result) => assert_eq!(result.analysis, "fresh"),
            other => panic!("Expected success, got {:?}", other),
        }
        assert_eq!(app.view(), NavigationView::Result);
        assert!(app.failure().is_none());
    }

    #[tokio::test]
    async fn test_entering_generate_clears_result() {
        let (gateway, mut app) = setup();
        gateway.push_status(Ok(snapshot("task-1", TaskStatus::Completed, json!({"analysis": "a"}))));

        app.submit(photo("x")).await.unwrap();
        app.wait_for_outcome(WAIT).await.unwrap();
        assert!(app.result().is_some());

        app.navigate(NavigationView::Generate);
        assert!(app.result().is_none());
    }

    #[tokio::test]
    async fn test_recreate_resubmits_last_request() {
        let (gateway, mut app) = setup();
        gateway.push_status(Ok(snapshot("task-1", TaskStatus::Completed, json!({"analysis": "a"}))));
        gateway.push_status(Ok(snapshot("task-2", TaskStatus::Completed, json!({"analysis": "b"}))));

        app.submit(photo("look")).await.unwrap();
        app.wait_for_outcome(WAIT).await.unwrap();

        app.dispatch(Intent::Recreate).await.unwrap();
        assert_eq!(gateway.create_calls(), 2);
        match app.wait_for_outcome(WAIT).await.unwrap() {
            Outcome::Succeeded(result) => assert_eq!(result.analysis, "b"),
            other => panic!("Expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejected_request_is_not_recreated() {
        let (gateway, mut app) = setup();
        gateway.push_status(Ok(snapshot("task-1", TaskStatus::Completed, json!({"analysis": "a"}))));
        gateway.push_status(Ok(snapshot("task-2", TaskStatus::Completed, json!({"analysis": "b"}))));

        app.submit(photo("keep me")).await.unwrap();
        app.wait_for_outcome(WAIT).await.unwrap();

        let empty = GenerationRequest::new(ImageUpload::new("a.png", "image/png", Vec::new()), "drop me");
        assert!(app.submit(empty).await.is_err());

        app.recreate().await.unwrap();
        assert_eq!(gateway.create_calls(), 2);
        match app.wait_for_outcome(WAIT).await.unwrap() {
            Outcome::Succeeded(result) => assert_eq!(result.analysis, "b"),
            other => panic!("Expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_recreate_without_history() {
        let (_gateway, mut app) = setup();
        let err = app.recreate().await.unwrap_err();
        assert!(matches!(err, AppError::NothingToRecreate));
        assert_eq!(app.view(), NavigationView::Generate);
    }

    #[tokio::test]
    async fn test_login_success_builds_user_from_profile() {
        let (gateway, mut app) = setup();
        gateway.set_current_user(Some(record("42", "Min-ji")));
        app.navigate(NavigationView::Login);

        let user = app.login("minji@example.com", "pw").await.unwrap();
        assert_eq!(user.name, "Min-ji");
        assert!(user.is_logged_in);
        assert!(app.session().is_authenticated());
        assert_eq!(app.view(), NavigationView::Home);

        // Profile lookup went out with the fresh token
        assert_eq!(gateway.tokens_seen().last(), Some(&Some("mock-token".to_string())));
    }

    #[tokio::test]
    async fn test_token_and_user_stay_in_step() {
        let (gateway, mut app) = setup();
        assert_eq!(app.session().is_authenticated(), app.user().is_logged_in);

        app.login("a@b.c", "pw").await.unwrap();
        assert!(app.session().is_authenticated() && app.user().is_logged_in);

        app.logout();
        assert!(!app.session().is_authenticated() && !app.user().is_logged_in);

        assert!(!app.restore_session(SecretString::new("stale".to_string())).await);
        assert_eq!(app.session().is_authenticated(), app.user().is_logged_in);

        gateway.set_current_user(Some(record("3", "Park")));
        assert!(app.restore_session(SecretString::new("fresh".to_string())).await);
        assert!(app.session().is_authenticated() && app.user().is_logged_in);
    }

    #[tokio::test]
    async fn test_login_without_profile_falls_back_to_email() {
        let (_gateway, mut app) = setup();
        let user = app.login("jun@example.com", "pw").await.unwrap();
        assert_eq!(user.name, "jun");
        assert!(app.user().is_logged_in);
    }

    #[tokio::test]
    async fn test_login_failure_stays_on_login() {
        let (gateway, mut app) = setup();
        gateway.push_login(Err(GatewayError::Auth {
            status: 401,
            message: "Incorrect email or password".to_string(),
        }));
        app.navigate(NavigationView::Login);

        assert!(app.login("a@b.c", "wrong").await.is_err());
        assert_eq!(app.view(), NavigationView::Login);
        assert_eq!(app.failure(), Some("Incorrect email or password"));
        assert!(!app.session().is_authenticated());
        assert!(!app.user().is_logged_in);
    }

    #[tokio::test]
    async fn test_logout_and_profile_routing() {
        let (_gateway, mut app) = setup();
        app.open_profile();
        assert_eq!(app.view(), NavigationView::Login);

        app.dispatch(Intent::Login {
            email: "a@b.c".to_string(),
            password: "pw".to_string(),
        })
        .await
        .unwrap();
        app.dispatch(Intent::OpenProfile).await.unwrap();
        assert_eq!(app.view(), NavigationView::MyPage);

        app.dispatch(Intent::Logout).await.unwrap();
        assert_eq!(app.view(), NavigationView::Login);
        assert!(!app.session().is_authenticated());
        assert_eq!(app.user(), &User::guest());
    }

    #[tokio::test]
    async fn test_upload_to_feed() {
        let (_gateway, mut app) = setup();
        app.dispatch(Intent::UploadToFeed).await.unwrap();
        assert_eq!(app.view(), NavigationView::Feed);
    }

    #[tokio::test]
    async fn test_register_validation_is_inline() {
        let (gateway, mut app) = setup();
        gateway.push_register(Err(GatewayError::Validation {
            status: 409,
            message: "Email already registered".to_string(),
        }));
        app.navigate(NavigationView::Login);

        let err = app.register("Kim", "kim@example.com", "pw").await.unwrap_err();
        assert!(matches!(err, AppError::Gateway(GatewayError::Validation { .. })));
        assert_eq!(app.view(), NavigationView::Login);
        assert_eq!(app.failure(), Some("Email already registered"));

        let created = app.register("Kim", "kim2@example.com", "pw").await.unwrap();
        assert_eq!(created.name, "Kim");
    }

    #[tokio::test]
    async fn test_restore_session() {
        let (gateway, mut app) = setup();
        assert!(!app.restore_session(SecretString::new("expired".to_string())).await);
        assert!(!app.session().is_authenticated());

        gateway.set_current_user(Some(record("9", "Seo")));
        assert!(app.restore_session(SecretString::new("valid".to_string())).await);
        assert!(app.session().is_authenticated());
        assert_eq!(app.user().name, "Seo");
    }

    #[tokio::test]
    async fn test_wait_times_out_while_polling() {
        let (_gateway, mut app) = setup();
        app.submit(photo("x")).await.unwrap();
        let err = app.wait_for_outcome(Duration::from_millis(40)).await.unwrap_err();
        assert!(matches!(err, AppError::OutcomeTimeout));
        assert_eq!(app.view(), NavigationView::Loading);
    }
}
