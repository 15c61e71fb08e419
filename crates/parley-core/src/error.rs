//! Client error taxonomy

use thiserror::Error;

/// Which half of the send pipeline failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStage {
    /// Posting the message to the backend
    Dispatch,
    /// Fetching authoritative history after a successful dispatch
    Reconcile,
}

impl std::fmt::Display for SendStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendStage::Dispatch => write!(f, "dispatch"),
            SendStage::Reconcile => write!(f, "reconcile"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Registration failed")]
    RegistrationFailed,

    /// The session token was missing or rejected; the session has been cleared
    #[error("Session expired, please log in again")]
    Unauthenticated,

    /// No response was received
    #[error("Network error: {0}")]
    NetworkFailure(String),

    #[error("Failed to send message ({stage}): {reason}")]
    SendFailed { stage: SendStage, reason: String },

    #[error("Unknown conversation: {0}")]
    UnknownConversation(String),

    /// Non-success status, or a success status carrying an `error` field
    #[error("Request rejected: HTTP {status} - {message}")]
    Rejected { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated)
    }

    /// Fold a backend error into the send taxonomy. `Unauthenticated` passes
    /// through untouched so the route guard still sees it.
    pub fn into_send_failure(self, stage: SendStage) -> Self {
        match self {
            Self::Unauthenticated => Self::Unauthenticated,
            other => Self::SendFailed {
                stage,
                reason: other.to_string(),
            },
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::NetworkFailure(e.to_string())
        }
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
