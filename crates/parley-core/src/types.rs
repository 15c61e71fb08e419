//! Wire and domain types shared by the backend client and local state

use serde::{Deserialize, Serialize};

/// Title shown until the backend names a conversation
pub const PLACEHOLDER_TITLE: &str = "New Chat";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single chat message. Never edited after it is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Login / registration payload
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartChatResponse {
    pub conversation_id: String,
}

/// One row of `GET /chat/conversations`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConversationSummary {
    pub conversation_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_message_time: Option<String>,
}

impl ConversationSummary {
    pub fn new(conversation_id: impl Into<String>, title: Option<&str>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            title: title.map(str::to_string),
            created_at: None,
            last_message_time: None,
        }
    }

    /// Title, or the placeholder when the backend has none yet
    pub fn display_title(&self) -> &str {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => title,
            _ => PLACEHOLDER_TITLE,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SendMessageRequest<'a> {
    pub conversation_id: &'a str,
    pub message: &'a str,
}

/// Acknowledgement of `POST /chat/message`. Never authoritative.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendAck {
    #[serde(default)]
    pub assistant_message: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl SendAck {
    pub fn reply(&self) -> Option<&str> {
        self.assistant_message
            .as_deref()
            .or(self.content.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct HistoryResponse {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub error: Option<String>,
}
