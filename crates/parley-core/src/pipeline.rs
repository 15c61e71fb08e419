//! Backend work units.
//!
//! A [`Task`] owns everything it needs, so a front end can run it on a
//! spawned task and hand the [`TaskResult`] back to the controller on its
//! own loop. Running a task never touches local state.

use std::sync::Arc;

use tracing::debug;

use crate::backend::ChatBackend;
use crate::error::{ClientResult, SendStage};
use crate::types::{ConversationSummary, Message};

/// A message that has been optimistically appended and still has to reach
/// the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    pub conversation_id: String,
    pub content: String,
}

/// Outcome of dispatch plus reconciliation. `Ok` carries the authoritative
/// history read after the dispatch was accepted.
#[derive(Debug, Clone)]
pub struct SendCompletion {
    pub conversation_id: String,
    pub outcome: ClientResult<Vec<Message>>,
}

/// What a task asks of the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Work {
    LoadConversations,
    CreateConversation,
    FetchHistory(String),
    Send(PendingSend),
}

#[derive(Debug, Clone)]
pub enum Outcome {
    ConversationsLoaded(ClientResult<Vec<ConversationSummary>>),
    ConversationCreated(ClientResult<String>),
    HistoryFetched {
        conversation_id: String,
        outcome: ClientResult<Vec<Message>>,
    },
    Sent(SendCompletion),
}

/// Backend work stamped with the session epoch it was issued under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub epoch: u64,
    pub work: Work,
}

/// A finished [`Task`]. Carries the issuing epoch so results that outlive
/// their session can be told apart.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub epoch: u64,
    pub outcome: Outcome,
}

impl Work {
    pub fn name(&self) -> &'static str {
        match self {
            Work::LoadConversations => "load_conversations",
            Work::CreateConversation => "create_conversation",
            Work::FetchHistory(_) => "fetch_history",
            Work::Send(_) => "send",
        }
    }
}

impl Task {
    pub fn new(epoch: u64, work: Work) -> Self {
        Self { epoch, work }
    }

    pub fn name(&self) -> &'static str {
        self.work.name()
    }

    pub async fn run(self, backend: Arc<dyn ChatBackend>) -> TaskResult {
        debug!("Running task {} (epoch {})", self.name(), self.epoch);
        let outcome = match self.work {
            Work::LoadConversations => Outcome::ConversationsLoaded(backend.conversations().await),
            Work::CreateConversation => Outcome::ConversationCreated(backend.start_chat().await),
            Work::FetchHistory(conversation_id) => {
                let outcome = backend.history(&conversation_id).await;
                Outcome::HistoryFetched {
                    conversation_id,
                    outcome,
                }
            }
            Work::Send(pending) => {
                let outcome = dispatch_and_reconcile(backend.as_ref(), &pending).await;
                Outcome::Sent(SendCompletion {
                    conversation_id: pending.conversation_id,
                    outcome,
                })
            }
        };
        TaskResult {
            epoch: self.epoch,
            outcome,
        }
    }
}

/// Post the message, then read back the full history. The ack body is
/// ignored; only the history fetch is authoritative.
pub async fn dispatch_and_reconcile(
    backend: &dyn ChatBackend,
    pending: &PendingSend,
) -> ClientResult<Vec<Message>> {
    let ack = backend
        .send_message(&pending.conversation_id, &pending.content)
        .await
        .map_err(|e| e.into_send_failure(SendStage::Dispatch))?;
    debug!(
        "Dispatch to {} accepted (reply present: {})",
        pending.conversation_id,
        ack.reply().is_some()
    );

    backend
        .history(&pending.conversation_id)
        .await
        .map_err(|e| e.into_send_failure(SendStage::Reconcile))
}
