//! Backend gateway error types

use thiserror::Error;

/// Errors from a backend call
///
/// Cloneable so failures can be carried inside lifecycle events.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The backend rejected the request payload (register)
    #[error("{message}")]
    Validation { status: u16, message: String },

    /// Credentials were rejected (login)
    #[error("{message}")]
    Auth { status: u16, message: String },

    /// Any other non-success status
    #[error("{message}")]
    Server { status: u16, message: String },

    /// Connection-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// The request timed out
    #[error("Request timed out")]
    Timeout,

    /// The response body could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Validation { status, .. } | Self::Auth { status, .. } | Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if this error is worth retrying on the next poll
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout => true,
            Self::Server { status, .. } => matches!(status, 408 | 429) || *status >= 500,
            _ => false,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}
