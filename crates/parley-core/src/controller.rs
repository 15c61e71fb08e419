//! Chat state controller.
//!
//! Owns the conversation registry, the active selection and the send
//! bookkeeping. Work is split in two phases: a `begin_*` call mutates local
//! state and hands back a [`Task`]; the task runs against the backend
//! anywhere; [`ChatController::apply`] folds its [`TaskResult`] back in and
//! may ask for a follow-up task. [`ChatController::run`] chains both phases
//! for callers that are happy to wait.

use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::backend::ChatBackend;
use crate::error::{ClientError, ClientResult};
use crate::pipeline::{Outcome, PendingSend, SendCompletion, Task, TaskResult, Work};
use crate::registry::{Conversation, ConversationRegistry};
use crate::selector::{ActiveSelection, Selection};
use crate::session::SessionStore;
use crate::types::{ConversationSummary, Message};

/// Dismissible failure shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub at: DateTime<Local>,
}

impl Notification {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            at: Local::now(),
        }
    }
}

pub struct ChatController {
    backend: Arc<dyn ChatBackend>,
    session: SessionStore,
    registry: ConversationRegistry,
    selection: ActiveSelection,
    /// Bumped on every reset; results from an older epoch are dropped
    epoch: u64,
    /// Sends dispatched but not yet resolved
    in_flight: usize,
    loading_conversations: bool,
    loaded: bool,
    notice: Option<Notification>,
}

impl ChatController {
    pub fn new(backend: Arc<dyn ChatBackend>, session: SessionStore) -> Self {
        Self {
            backend,
            session,
            registry: ConversationRegistry::new(),
            selection: ActiveSelection::new(),
            epoch: 0,
            in_flight: 0,
            loading_conversations: false,
            loaded: false,
            notice: None,
        }
    }

    pub fn backend(&self) -> Arc<dyn ChatBackend> {
        Arc::clone(&self.backend)
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Session epoch that new tasks are stamped with
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn registry(&self) -> &ConversationRegistry {
        &self.registry
    }

    pub fn conversations(&self) -> impl Iterator<Item = &Conversation> {
        self.registry.iter()
    }

    pub fn current(&self) -> Option<&str> {
        self.selection.current()
    }

    pub fn active_conversation(&self) -> Option<&Conversation> {
        self.selection.current().and_then(|id| self.registry.get(id))
    }

    /// Messages of the active conversation, empty when nothing is selected
    pub fn messages(&self) -> &[Message] {
        self.active_conversation()
            .map(|c| c.messages.as_slice())
            .unwrap_or(&[])
    }

    /// True while any send is awaiting its reconciliation. Display only.
    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    pub fn is_loading_conversations(&self) -> bool {
        self.loading_conversations
    }

    /// Whether the conversation list has been fetched at least once
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn notice(&self) -> Option<&Notification> {
        self.notice.as_ref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    pub fn begin_load(&mut self) -> Task {
        self.loading_conversations = true;
        self.task(Work::LoadConversations)
    }

    pub fn begin_create(&self) -> Task {
        self.task(Work::CreateConversation)
    }

    /// Move the selection. Returns the history fetch to run, if any.
    pub fn select(&mut self, id: Option<&str>) -> ClientResult<Option<Task>> {
        match self.selection.select(id, &self.registry)? {
            Selection::Changed {
                needs_history: true,
            } => Ok(self
                .selection
                .current()
                .map(|id| self.task(Work::FetchHistory(id.to_string())))),
            Selection::Changed { .. } | Selection::Unchanged | Selection::Cleared => Ok(None),
        }
    }

    /// Optimistically append `text` to the active conversation. `None` means
    /// there was nothing to send: blank text or no active conversation.
    pub fn begin_send(&mut self, text: &str) -> Option<Task> {
        if text.trim().is_empty() {
            return None;
        }
        let conversation_id = self.selection.current()?.to_string();

        if !self
            .registry
            .append_message(&conversation_id, Message::user(text))
        {
            return None;
        }
        self.in_flight += 1;

        Some(self.task(Work::Send(PendingSend {
            conversation_id,
            content: text.to_string(),
        })))
    }

    /// Fold a finished task into local state. Failures are recorded as the
    /// current notification and also returned. Results issued before the
    /// last [`reset`](Self::reset) are dropped without touching state.
    pub fn apply(&mut self, result: TaskResult) -> ClientResult<Option<Task>> {
        if result.epoch != self.epoch {
            debug!(
                "Dropping result from epoch {} (current {})",
                result.epoch, self.epoch
            );
            return Ok(None);
        }

        match result.outcome {
            Outcome::ConversationsLoaded(outcome) => {
                self.loading_conversations = false;
                self.loaded = true;
                let summaries = outcome.map_err(|e| self.fail(e))?;
                self.on_conversations_loaded(summaries)
            }
            Outcome::ConversationCreated(outcome) => {
                let id = outcome.map_err(|e| self.fail(e))?;
                self.registry.insert_new(id.clone());
                info!("Started conversation {}", id);
                self.select(Some(&id))
            }
            Outcome::HistoryFetched {
                conversation_id,
                outcome,
            } => {
                let messages = outcome.map_err(|e| self.fail(e))?;
                self.reconcile(&conversation_id, messages);
                Ok(None)
            }
            Outcome::Sent(SendCompletion {
                conversation_id,
                outcome,
            }) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                let messages = outcome.map_err(|e| self.fail(e))?;
                self.reconcile(&conversation_id, messages);
                Ok(None)
            }
        }
    }

    /// Run `task` and any follow-up it produces, in order
    pub async fn run(&mut self, task: Task) -> ClientResult<()> {
        let mut next = Some(task);
        while let Some(task) = next.take() {
            let result = task.run(self.backend()).await;
            next = self.apply(result)?;
        }
        Ok(())
    }

    pub async fn load_all(&mut self) -> ClientResult<()> {
        let task = self.begin_load();
        self.run(task).await
    }

    /// Allocate, register and select a new conversation. Returns its id.
    pub async fn create(&mut self) -> ClientResult<String> {
        let task = self.begin_create();
        self.run(task).await?;
        self.selection
            .current()
            .map(str::to_string)
            .ok_or_else(|| ClientError::Decode("backend returned no conversation id".to_string()))
    }

    pub async fn select_and_load(&mut self, id: Option<&str>) -> ClientResult<()> {
        match self.select(id)? {
            Some(task) => self.run(task).await,
            None => Ok(()),
        }
    }

    /// Full send: optimistic append, dispatch, reconcile
    pub async fn send(&mut self, text: &str) -> ClientResult<()> {
        match self.begin_send(text) {
            Some(task) => self.run(task).await,
            None => Ok(()),
        }
    }

    /// Forget everything tied to the previous session. Tasks still running
    /// for it will have their results ignored.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.registry.clear();
        self.selection.clear();
        self.in_flight = 0;
        self.loading_conversations = false;
        self.loaded = false;
        self.notice = None;
    }

    fn on_conversations_loaded(
        &mut self,
        summaries: Vec<ConversationSummary>,
    ) -> ClientResult<Option<Task>> {
        self.registry.replace_all(summaries);
        info!("Loaded {} conversations", self.registry.len());

        if self.selection.retain_valid(&self.registry) {
            debug!("Active conversation disappeared after reload");
        }

        match self.selection.current().map(str::to_string) {
            // The rebuilt entry has no messages yet
            Some(id) => Ok(Some(self.task(Work::FetchHistory(id)))),
            None => match self.registry.first_id().map(str::to_string) {
                Some(first) => self.select(Some(&first)),
                None => Ok(None),
            },
        }
    }

    fn task(&self, work: Work) -> Task {
        Task::new(self.epoch, work)
    }

    /// Write authoritative history, but only into the conversation that is
    /// still on screen.
    fn reconcile(&mut self, conversation_id: &str, messages: Vec<Message>) {
        if self.selection.is_active(conversation_id) {
            self.registry.replace_messages(conversation_id, messages);
        } else {
            debug!(
                "Discarding history for inactive conversation {}",
                conversation_id
            );
            self.registry.mark_stale(conversation_id);
        }
    }

    fn fail(&mut self, error: ClientError) -> ClientError {
        match &error {
            // Routing back to login is the session watcher's job
            ClientError::Unauthenticated => warn!("Request rejected: session expired"),
            other => {
                warn!("{}", other);
                self.notice = Some(Notification::new(other.to_string()));
            }
        }
        error
    }
}

impl std::fmt::Debug for ChatController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatController")
            .field("conversations", &self.registry.len())
            .field("current", &self.selection.current())
            .field("epoch", &self.epoch)
            .field("in_flight", &self.in_flight)
            .field("loaded", &self.loaded)
            .finish()
    }
}
