//! Parley client core: session, conversations and the send pipeline,
//! kept consistent with the chat backend.

pub mod auth;
pub mod backend;
pub mod controller;
pub mod error;
pub mod http;
pub mod pipeline;
pub mod registry;
pub mod route;
pub mod selector;
pub mod session;
pub mod types;

pub use auth::{AuthFlow, RegistrationResult};
pub use backend::{ChatBackend, SessionGuard};
pub use controller::{ChatController, Notification};
pub use error::{ClientError, ClientResult, SendStage};
pub use http::HttpBackend;
pub use pipeline::{
    dispatch_and_reconcile, Outcome, PendingSend, SendCompletion, Task, TaskResult, Work,
};
pub use registry::{Conversation, ConversationRegistry};
pub use route::{guard, guard_for, is_authenticated, resolve_path, Route};
pub use selector::{ActiveSelection, Selection};
pub use session::{FileTokenStorage, MemoryTokenStorage, Session, SessionStore, TokenStorage};
pub use types::{ConversationSummary, Credentials, Message, Role, SendAck, PLACEHOLDER_TITLE};

use std::sync::Arc;
use std::time::Duration;

/// HTTP backend behind the session guard, ready to share between tasks
pub fn connect(
    base_url: &str,
    session: SessionStore,
    timeout: Option<Duration>,
) -> ClientResult<Arc<dyn ChatBackend>> {
    let http = HttpBackend::with_timeout(base_url, session.clone(), timeout)?;
    Ok(SessionGuard::shared(http, session))
}
