//! Session handle and the signed-in user model
//!
//! The session holds the bearer credential for outbound calls. Every gateway
//! keeps a clone of the handle and reads the token at call time, so a token
//! installed after the gateway was built is still picked up.

use std::sync::{Arc, PoisonError, RwLock};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::gateway::{UserId, UserRecord};

/// Shared credential store
///
/// Cheap to clone. All clones observe the same token.
#[derive(Debug, Clone, Default)]
pub struct Session {
    token: Arc<RwLock<Option<SecretString>>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the credential; `None` clears it
    pub fn set_token(&self, token: Option<SecretString>) {
        debug!(present = token.is_some(), "Session::set_token: called");
        let mut guard = self.token.write().unwrap_or_else(PoisonError::into_inner);
        *guard = token;
    }

    pub fn current_token(&self) -> Option<SecretString> {
        self.token.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

/// The user as the presentation layer sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub avatar_url: Option<String>,
    pub is_logged_in: bool,
}

impl User {
    pub fn guest() -> Self {
        Self {
            id: UserId::new("guest"),
            name: "Guest User".to_string(),
            avatar_url: None,
            is_logged_in: false,
        }
    }

    /// Build a signed-in user from the backend's user record
    pub fn from_record(record: UserRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            avatar_url: record.avatar_url,
            is_logged_in: true,
        }
    }

    /// Fallback when login succeeded but the profile could not be fetched
    pub fn signed_in(email: &str) -> Self {
        let name = email.split('@').next().filter(|local| !local.is_empty()).unwrap_or(email);
        Self {
            id: UserId::new(email),
            name: name.to_string(),
            avatar_url: None,
            is_logged_in: true,
        }
    }
}

impl Default for User {
    fn default() -> Self {
        Self::guest()
    }
}
