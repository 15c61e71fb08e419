#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use parley_core::{
    ChatBackend, ClientError, ClientResult, ConversationSummary, Credentials, Message, SendAck,
};
use parley_core::types::{RegisterResponse, TokenResponse};

pub const VALID_EMAIL: &str = "ada@example.com";
pub const VALID_PASSWORD: &str = "correct horse";

#[derive(Default)]
struct Server {
    users: HashMap<String, String>,
    /// Conversation ids, most recent first
    order: Vec<String>,
    titles: HashMap<String, Option<String>>,
    histories: HashMap<String, Vec<Message>>,
    next_id: usize,
}

/// In-memory stand-in for the chat backend
pub struct MockBackend {
    server: Mutex<Server>,
    network_down: Mutex<bool>,
    token_revoked: Mutex<bool>,
    fail_history: Mutex<bool>,
    fail_send: Mutex<bool>,
    pub calls: AtomicUsize,
    pub send_calls: AtomicUsize,
    pub history_calls: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        let mut server = Server::default();
        server
            .users
            .insert(VALID_EMAIL.to_string(), VALID_PASSWORD.to_string());
        Self {
            server: Mutex::new(server),
            network_down: Mutex::new(false),
            token_revoked: Mutex::new(false),
            fail_history: Mutex::new(false),
            fail_send: Mutex::new(false),
            calls: AtomicUsize::new(0),
            send_calls: AtomicUsize::new(0),
            history_calls: AtomicUsize::new(0),
        }
    }

    /// Seed a conversation with an existing history
    pub fn with_conversation(self, id: &str, title: Option<&str>, history: Vec<Message>) -> Self {
        {
            let mut server = self.server.lock();
            server.order.push(id.to_string());
            server.titles.insert(id.to_string(), title.map(str::to_string));
            server.histories.insert(id.to_string(), history);
        }
        self
    }

    pub fn history_of(&self, id: &str) -> Vec<Message> {
        self.server
            .lock()
            .histories
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// Write directly to the server, as another client would
    pub fn push_server_message(&self, id: &str, message: Message) {
        self.server
            .lock()
            .histories
            .entry(id.to_string())
            .or_default()
            .push(message);
    }

    pub fn remove_conversation(&self, id: &str) {
        let mut server = self.server.lock();
        server.order.retain(|existing| existing != id);
        server.titles.remove(id);
        server.histories.remove(id);
    }

    pub fn set_network_down(&self, down: bool) {
        *self.network_down.lock() = down;
    }

    pub fn revoke_token(&self) {
        *self.token_revoked.lock() = true;
    }

    pub fn set_fail_history(&self, fail: bool) {
        *self.fail_history.lock() = fail;
    }

    pub fn set_fail_send(&self, fail: bool) {
        *self.fail_send.lock() = fail;
    }

    pub fn total_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self, authenticated: bool) -> ClientResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.network_down.lock() {
            return Err(ClientError::NetworkFailure("connection refused".to_string()));
        }
        if authenticated && *self.token_revoked.lock() {
            return Err(ClientError::Unauthenticated);
        }
        Ok(())
    }
}

pub fn reply_to(message: &str) -> String {
    format!("You said: {}", message)
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn login(&self, credentials: &Credentials) -> ClientResult<TokenResponse> {
        self.enter(false)?;
        let server = self.server.lock();
        match server.users.get(&credentials.email) {
            Some(password) if *password == credentials.password => Ok(TokenResponse {
                access_token: format!("token-for-{}", credentials.email),
                token_type: Some("bearer".to_string()),
            }),
            _ => Err(ClientError::rejected(401, "Incorrect email or password")),
        }
    }

    async fn register(&self, credentials: &Credentials) -> ClientResult<RegisterResponse> {
        self.enter(false)?;
        let mut server = self.server.lock();
        if server.users.contains_key(&credentials.email) {
            return Err(ClientError::rejected(400, "Email already registered"));
        }
        server
            .users
            .insert(credentials.email.clone(), credentials.password.clone());
        Ok(RegisterResponse {
            message: Some("User registered successfully".to_string()),
        })
    }

    async fn start_chat(&self) -> ClientResult<String> {
        self.enter(true)?;
        let mut server = self.server.lock();
        server.next_id += 1;
        let id = format!("conv-{}", server.next_id);
        server.order.insert(0, id.clone());
        server.titles.insert(id.clone(), None);
        server.histories.insert(id.clone(), Vec::new());
        Ok(id)
    }

    async fn send_message(&self, conversation_id: &str, message: &str) -> ClientResult<SendAck> {
        self.enter(true)?;
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_send.lock() {
            return Err(ClientError::rejected(500, "Internal Server Error"));
        }

        let mut server = self.server.lock();
        let history = server
            .histories
            .get_mut(conversation_id)
            .ok_or_else(|| ClientError::rejected(200, "Conversation not found"))?;
        let reply = reply_to(message);
        history.push(Message::user(message));
        history.push(Message::assistant(reply.clone()));

        Ok(SendAck {
            assistant_message: Some(reply),
            ..SendAck::default()
        })
    }

    async fn history(&self, conversation_id: &str) -> ClientResult<Vec<Message>> {
        self.enter(true)?;
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_history.lock() {
            return Err(ClientError::NetworkFailure("connection reset".to_string()));
        }
        self.server
            .lock()
            .histories
            .get(conversation_id)
            .cloned()
            .ok_or_else(|| ClientError::rejected(200, "Conversation not found"))
    }

    async fn conversations(&self) -> ClientResult<Vec<ConversationSummary>> {
        self.enter(true)?;
        let server = self.server.lock();
        Ok(server
            .order
            .iter()
            .map(|id| {
                let title = server.titles.get(id).cloned().flatten();
                ConversationSummary::new(id.clone(), title.as_deref())
            })
            .collect())
    }
}
