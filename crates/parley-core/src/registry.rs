//! Conversation registry: conversation id -> title and messages

use std::collections::HashMap;

use crate::types::{ConversationSummary, Message, PLACEHOLDER_TITLE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    history_loaded: bool,
}

impl Conversation {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            messages: Vec::new(),
            history_loaded: false,
        }
    }

    /// Whether `messages` came from an authoritative history fetch
    pub fn is_history_loaded(&self) -> bool {
        self.history_loaded
    }
}

/// Keyed store of conversations. `order` only drives listing; lookups go
/// through the map.
#[derive(Debug, Default, Clone)]
pub struct ConversationRegistry {
    entries: HashMap<String, Conversation>,
    order: Vec<String>,
}

impl ConversationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from the backend's list. Message bodies start empty.
    pub fn replace_all(&mut self, summaries: Vec<ConversationSummary>) {
        self.entries.clear();
        self.order.clear();

        for summary in summaries {
            if self.entries.contains_key(&summary.conversation_id) {
                continue;
            }
            let conversation =
                Conversation::new(summary.conversation_id.clone(), summary.display_title());
            self.order.push(summary.conversation_id.clone());
            self.entries.insert(summary.conversation_id, conversation);
        }
    }

    /// Register a backend-allocated conversation. It is known to be empty,
    /// so it counts as loaded.
    pub fn insert_new(&mut self, id: impl Into<String>) -> &Conversation {
        let id = id.into();
        let mut conversation = Conversation::new(id.clone(), PLACEHOLDER_TITLE);
        conversation.history_loaded = true;

        if !self.entries.contains_key(&id) {
            self.order.insert(0, id.clone());
        }
        self.entries.insert(id.clone(), conversation);
        &self.entries[&id]
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Conversations in listing order
    pub fn iter(&self) -> impl Iterator<Item = &Conversation> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    pub fn first_id(&self) -> Option<&str> {
        self.order.first().map(String::as_str)
    }

    /// Optimistic append. Returns false if the conversation is unknown.
    pub fn append_message(&mut self, id: &str, message: Message) -> bool {
        match self.entries.get_mut(id) {
            Some(conversation) => {
                conversation.messages.push(message);
                true
            }
            None => false,
        }
    }

    /// Replace the whole message list with authoritative history
    pub fn replace_messages(&mut self, id: &str, messages: Vec<Message>) -> bool {
        match self.entries.get_mut(id) {
            Some(conversation) => {
                conversation.messages = messages;
                conversation.history_loaded = true;
                true
            }
            None => false,
        }
    }

    /// Force the next selection of `id` to refetch its history
    pub fn mark_stale(&mut self, id: &str) {
        if let Some(conversation) = self.entries.get_mut(id) {
            conversation.history_loaded = false;
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
