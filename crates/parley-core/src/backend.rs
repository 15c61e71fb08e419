use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{ClientError, ClientResult};
use crate::session::SessionStore;
use crate::types::{ConversationSummary, Credentials, Message, RegisterResponse, SendAck, TokenResponse};

/// The remote chat backend.
///
/// `login` and `register` are unauthenticated. Every other call carries the
/// session's bearer token and reports a rejected token as
/// [`ClientError::Unauthenticated`].
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> ClientResult<TokenResponse>;

    async fn register(&self, credentials: &Credentials) -> ClientResult<RegisterResponse>;

    /// Allocate a new conversation and return its id
    async fn start_chat(&self) -> ClientResult<String>;

    async fn send_message(&self, conversation_id: &str, message: &str) -> ClientResult<SendAck>;

    /// Full authoritative history of one conversation
    async fn history(&self, conversation_id: &str) -> ClientResult<Vec<Message>>;

    async fn conversations(&self) -> ClientResult<Vec<ConversationSummary>>;
}

/// Wraps a backend so that an `Unauthenticated` answer from an
/// authenticated call clears the session the request was made with. This is
/// the one place that reacts to a rejected token; everything above it only
/// sees the error. A late rejection of an older token never clears a newer
/// session.
pub struct SessionGuard<B> {
    inner: B,
    session: SessionStore,
}

impl<B: ChatBackend + 'static> SessionGuard<B> {
    pub fn new(inner: B, session: SessionStore) -> Self {
        Self { inner, session }
    }

    /// Guarded backend behind a shareable handle
    pub fn shared(inner: B, session: SessionStore) -> Arc<dyn ChatBackend> {
        Arc::new(Self::new(inner, session))
    }

    fn intercept<T>(
        &self,
        call: &str,
        issued: Option<String>,
        result: ClientResult<T>,
    ) -> ClientResult<T> {
        if let (Err(ClientError::Unauthenticated), Some(token)) = (&result, issued) {
            if self.session.clear_if_current(&token) {
                warn!("{} rejected the session token, session cleared", call);
            } else {
                debug!("{} rejected a token that is no longer current", call);
            }
        }
        result
    }
}

#[async_trait]
impl<B: ChatBackend + 'static> ChatBackend for SessionGuard<B> {
    async fn login(&self, credentials: &Credentials) -> ClientResult<TokenResponse> {
        self.inner.login(credentials).await
    }

    async fn register(&self, credentials: &Credentials) -> ClientResult<RegisterResponse> {
        self.inner.register(credentials).await
    }

    async fn start_chat(&self) -> ClientResult<String> {
        let issued = self.session.get();
        let result = self.inner.start_chat().await;
        self.intercept("start_chat", issued, result)
    }

    async fn send_message(&self, conversation_id: &str, message: &str) -> ClientResult<SendAck> {
        let issued = self.session.get();
        let result = self.inner.send_message(conversation_id, message).await;
        self.intercept("send_message", issued, result)
    }

    async fn history(&self, conversation_id: &str) -> ClientResult<Vec<Message>> {
        let issued = self.session.get();
        let result = self.inner.history(conversation_id).await;
        self.intercept("history", issued, result)
    }

    async fn conversations(&self) -> ClientResult<Vec<ConversationSummary>> {
        let issued = self.session.get();
        let result = self.inner.conversations().await;
        self.intercept("conversations", issued, result)
    }
}

#[async_trait]
impl<T: ChatBackend + ?Sized> ChatBackend for Arc<T> {
    async fn login(&self, credentials: &Credentials) -> ClientResult<TokenResponse> {
        (**self).login(credentials).await
    }

    async fn register(&self, credentials: &Credentials) -> ClientResult<RegisterResponse> {
        (**self).register(credentials).await
    }

    async fn start_chat(&self) -> ClientResult<String> {
        (**self).start_chat().await
    }

    async fn send_message(&self, conversation_id: &str, message: &str) -> ClientResult<SendAck> {
        (**self).send_message(conversation_id, message).await
    }

    async fn history(&self, conversation_id: &str) -> ClientResult<Vec<Message>> {
        (**self).history(conversation_id).await
    }

    async fn conversations(&self) -> ClientResult<Vec<ConversationSummary>> {
        (**self).conversations().await
    }
}
