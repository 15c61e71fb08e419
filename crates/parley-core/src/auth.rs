//! Login and registration

use std::sync::Arc;

use tracing::{info, warn};

use crate::backend::ChatBackend;
use crate::error::{ClientError, ClientResult};
use crate::session::{Session, SessionStore};
use crate::types::Credentials;

/// Outcome of a successful registration. The user still has to log in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationResult {
    pub message: String,
}

/// One-shot, non-retrying auth operations. A failed call leaves the
/// session exactly as it was.
#[derive(Clone)]
pub struct AuthFlow {
    backend: Arc<dyn ChatBackend>,
    session: SessionStore,
}

impl AuthFlow {
    pub fn new(backend: Arc<dyn ChatBackend>, session: SessionStore) -> Self {
        Self { backend, session }
    }

    pub async fn login(&self, email: &str, password: &str) -> ClientResult<Session> {
        let credentials = credentials(email, password).ok_or(ClientError::InvalidCredentials)?;

        let tokens = match self.backend.login(&credentials).await {
            Ok(tokens) => tokens,
            // Transport trouble or a garbled answer says nothing about the password
            Err(e @ (ClientError::NetworkFailure(_) | ClientError::Decode(_))) => return Err(e),
            Err(e) => {
                warn!("Login rejected for {}: {}", credentials.email, e);
                return Err(ClientError::InvalidCredentials);
            }
        };

        if tokens.access_token.is_empty() {
            warn!("Login for {} returned an empty token", credentials.email);
            return Err(ClientError::InvalidCredentials);
        }

        self.session.set(tokens.access_token);
        info!("Logged in as {}", credentials.email);
        Ok(self.session.snapshot())
    }

    /// Register a new account. Does not touch the session.
    pub async fn register(&self, email: &str, password: &str) -> ClientResult<RegistrationResult> {
        let credentials = credentials(email, password).ok_or(ClientError::RegistrationFailed)?;

        match self.backend.register(&credentials).await {
            Ok(response) => {
                info!("Registered {}", credentials.email);
                Ok(RegistrationResult {
                    message: response
                        .message
                        .unwrap_or_else(|| "Registration successful".to_string()),
                })
            }
            Err(e @ (ClientError::NetworkFailure(_) | ClientError::Decode(_))) => Err(e),
            Err(e) => {
                warn!("Registration rejected for {}: {}", credentials.email, e);
                Err(ClientError::RegistrationFailed)
            }
        }
    }

    pub fn logout(&self) {
        self.session.clear();
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }
}

/// `None` when either field is blank
fn credentials(email: &str, password: &str) -> Option<Credentials> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return None;
    }
    Some(Credentials::new(email, password))
}
