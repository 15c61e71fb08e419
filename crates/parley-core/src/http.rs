//! reqwest implementation of [`ChatBackend`]

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::ChatBackend;
use crate::error::{ClientError, ClientResult};
use crate::session::SessionStore;
use crate::types::{
    ConversationSummary, Credentials, HistoryResponse, Message, RegisterResponse, SendAck,
    SendMessageRequest, StartChatResponse, TokenResponse,
};

#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    client: Client,
    session: SessionStore,
}

/// FastAPI style error body
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

impl HttpBackend {
    pub fn new(base_url: &str, session: SessionStore) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
            session,
        }
    }

    /// Like [`HttpBackend::new`] with an overall request timeout
    pub fn with_timeout(
        base_url: &str,
        session: SessionStore,
        timeout: Option<Duration>,
    ) -> ClientResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base URL extended by `segments`, each percent-encoded on its own
    fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
        let invalid = || ClientError::NetworkFailure(format!("invalid server URL {}", self.base_url));
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn request<T: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&T>,
        authenticated: bool,
    ) -> ClientResult<Response> {
        let url = self.endpoint(segments)?;
        let path = url.path().to_string();
        let mut builder = self.client.request(method.clone(), url);

        if authenticated {
            // Without a token the backend can only say 401
            let token = self.session.get().ok_or(ClientError::Unauthenticated)?;
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        debug!("{} {} -> {}", method, path, status);

        if authenticated && status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthenticated);
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::rejected(status.as_u16(), error_message(&text)));
        }

        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
        response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

/// Pull a readable message out of an error body
fn error_message(text: &str) -> String {
    match serde_json::from_str::<ErrorBody>(text) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(detail),
        }) => detail,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) => text.to_string(),
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn login(&self, credentials: &Credentials) -> ClientResult<TokenResponse> {
        let response = self
            .request(Method::POST, &["login"], Some(credentials), false)
            .await?;
        Self::decode(response).await
    }

    async fn register(&self, credentials: &Credentials) -> ClientResult<RegisterResponse> {
        let response = self
            .request(Method::POST, &["register"], Some(credentials), false)
            .await?;
        // Some deployments answer 201 with an empty body
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(RegisterResponse::default());
        }
        serde_json::from_str(&text).map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn start_chat(&self) -> ClientResult<String> {
        let response = self
            .request::<()>(Method::POST, &["chat", "start"], None, true)
            .await?;
        let started: StartChatResponse = Self::decode(response).await?;
        Ok(started.conversation_id)
    }

    async fn send_message(&self, conversation_id: &str, message: &str) -> ClientResult<SendAck> {
        let body = SendMessageRequest {
            conversation_id,
            message,
        };
        let response = self
            .request(Method::POST, &["chat", "message"], Some(&body), true)
            .await?;
        let ack: SendAck = Self::decode(response).await?;
        match ack.error {
            Some(error) => Err(ClientError::rejected(StatusCode::OK.as_u16(), error)),
            None => Ok(ack),
        }
    }

    async fn history(&self, conversation_id: &str) -> ClientResult<Vec<Message>> {
        let response = self
            .request::<()>(Method::GET, &["chat", "history", conversation_id], None, true)
            .await?;
        let history: HistoryResponse = Self::decode(response).await?;
        match history.error {
            Some(error) => Err(ClientError::rejected(StatusCode::OK.as_u16(), error)),
            None => Ok(history.messages),
        }
    }

    async fn conversations(&self) -> ClientResult<Vec<ConversationSummary>> {
        let response = self
            .request::<()>(Method::GET, &["chat", "conversations"], None, true)
            .await?;
        Self::decode(response).await
    }
}
