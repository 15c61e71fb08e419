//! Active conversation pointer.
//!
//! The selector never fetches anything. It reports whether the newly
//! selected conversation still needs its history and leaves the fetch to
//! the controller.

use crate::error::{ClientError, ClientResult};
use crate::registry::ConversationRegistry;

/// What a call to [`ActiveSelection::select`] changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Same id as before; nothing to do
    Unchanged,
    Changed { needs_history: bool },
    Cleared,
}

#[derive(Debug, Default, Clone)]
pub struct ActiveSelection {
    current: Option<String>,
}

impl ActiveSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.current.as_deref() == Some(id)
    }

    /// Point at `id`, or at nothing. Unknown ids are refused and leave the
    /// selection as it was.
    pub fn select(
        &mut self,
        id: Option<&str>,
        registry: &ConversationRegistry,
    ) -> ClientResult<Selection> {
        let Some(id) = id else {
            return Ok(match self.current.take() {
                Some(_) => Selection::Cleared,
                None => Selection::Unchanged,
            });
        };

        let conversation = registry
            .get(id)
            .ok_or_else(|| ClientError::UnknownConversation(id.to_string()))?;

        if self.is_active(id) {
            return Ok(Selection::Unchanged);
        }

        self.current = Some(id.to_string());
        Ok(Selection::Changed {
            needs_history: !conversation.is_history_loaded(),
        })
    }

    /// Drop the selection if the registry no longer knows it. Returns true
    /// if it was dropped.
    pub fn retain_valid(&mut self, registry: &ConversationRegistry) -> bool {
        match self.current.as_deref() {
            Some(id) if !registry.contains(id) => {
                self.current = None;
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}
