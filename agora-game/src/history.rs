//! Per-agent running context.
//!
//! The history is what every decision request sends along: a persona system
//! message, then notifications (human) and the agent's own replies (ai).
//! The core never parses it. The only structure is the optional tag on a
//! message, used to find combat boundaries for compression.

use agora_llm::ChatMessage;
use serde::{Deserialize, Serialize};

/// An agent's message history, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentHistory {
    messages: Vec<ChatMessage>,
}

impl AgentHistory {
    /// A history that starts with `persona` as its system message.
    #[must_use]
    pub fn with_persona(persona: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(persona)],
        }
    }

    /// All messages.
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether there are no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The newest message.
    #[must_use]
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Append a message.
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Index of the newest message carrying `tag`.
    #[must_use]
    pub fn find_tag(&self, tag: &str) -> Option<usize> {
        self.messages.iter().rposition(|m| m.tag.as_deref() == Some(tag))
    }

    /// Replace everything from the newest `start_tag` message through the
    /// first `end_tag` message after it (both inclusive) with `replacement`.
    ///
    /// Returns `false`, leaving the history untouched, when either tag is
    /// missing or the end comes before the start.
    pub fn compress_between(&mut self, start_tag: &str, end_tag: &str, replacement: Vec<ChatMessage>) -> bool {
        let Some(start) = self.find_tag(start_tag) else {
            return false;
        };
        let Some(offset) = self.messages[start..]
            .iter()
            .position(|m| m.tag.as_deref() == Some(end_tag))
        else {
            return false;
        };
        self.messages.splice(start..=start + offset, replacement);
        true
    }

    /// Messages containing `needle`, oldest first.
    pub fn search<'a>(&'a self, needle: &'a str) -> impl Iterator<Item = &'a ChatMessage> + 'a {
        self.messages.iter().filter(move |m| m.content.contains(needle))
    }
}
