//! Navigation state machine
//!
//! One current view, no history. User intents move it explicitly; lifecycle
//! events move it through `apply`.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::events::LifecycleEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NavigationView {
    #[default]
    Home,
    Feed,
    Generate,
    Loading,
    Result,
    Login,
    MyPage,
}

impl NavigationView {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Home => "HOME",
            Self::Feed => "FEED",
            Self::Generate => "GENERATE",
            Self::Loading => "LOADING",
            Self::Result => "RESULT",
            Self::Login => "LOGIN",
            Self::MyPage => "MY_PAGE",
        }
    }
}

impl fmt::Display for NavigationView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
pub struct Navigator {
    view: NavigationView,
    failure: Option<String>,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit user transition; clears any failure message
    pub fn navigate(&mut self, view: NavigationView) {
        debug!(from = %self.view, to = %view, "Navigator::navigate: called");
        self.view = view;
        self.failure = None;
    }

    /// Lifecycle-driven transition
    pub fn apply(&mut self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::Submitting { .. } => {
                self.navigate(NavigationView::Loading);
            }
            LifecycleEvent::Succeeded { .. } => {
                self.navigate(NavigationView::Result);
            }
            LifecycleEvent::Failed { failure, .. } => {
                debug!(message = %failure.message, "Navigator::apply: lifecycle failed");
                self.view = NavigationView::Generate;
                self.failure = Some(failure.message.clone());
            }
            _ => {}
        }
    }

    pub fn login_succeeded(&mut self) {
        self.navigate(NavigationView::Home);
    }

    /// Show `message` inline on `view`
    pub fn fail_at(&mut self, view: NavigationView, message: impl Into<String>) {
        let message = message.into();
        debug!(%view, %message, "Navigator::fail_at: called");
        self.view = view;
        self.failure = Some(message);
    }

    pub fn current(&self) -> NavigationView {
        self.view
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }
}
