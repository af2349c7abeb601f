//! Append-only conversation history.

use async_trait::async_trait;

use crate::{chat::ChatMessage, error::LLMError};

use super::MemoryProvider;

/// Every message of a session, in order.
///
/// Nothing is evicted; [`ConversationHistory::recent`] bounds what gets
/// replayed.
///
/// # Examples
///
/// ```rust
/// use boardchat::chat::ChatMessage;
/// use boardchat::memory::{ConversationHistory, MemoryProvider};
///
/// let mut history = ConversationHistory::new();
/// for i in 0..10 {
///     history.push(ChatMessage::user().content(format!("q{i}")).build());
/// }
/// assert_eq!(history.size(), 10);
/// assert_eq!(history.recent(4).len(), 4);
/// assert_eq!(history.recent(4)[0].content, "q6");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    messages: Vec<ChatMessage>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// The last `limit` messages, oldest first.
    pub fn recent(&self, limit: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(limit);
        &self.messages[start..]
    }
}

#[async_trait]
impl MemoryProvider for ConversationHistory {
    async fn remember(&mut self, message: &ChatMessage) -> Result<(), LLMError> {
        self.push(message.clone());
        Ok(())
    }

    async fn recall(&self, limit: Option<usize>) -> Result<Vec<ChatMessage>, LLMError> {
        Ok(match limit {
            Some(limit) => self.recent(limit).to_vec(),
            None => self.messages.clone(),
        })
    }

    async fn clear(&mut self) -> Result<(), LLMError> {
        self.messages.clear();
        Ok(())
    }

    fn size(&self) -> usize {
        self.messages.len()
    }
}
