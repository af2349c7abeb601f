//! Conversation memory.
//!
//! The full history is kept for the session's lifetime; only a bounded
//! suffix of it is replayed to the model with each request.

pub mod history;

use async_trait::async_trait;

use crate::{chat::ChatMessage, error::LLMError};

pub use history::ConversationHistory;

/// Trait for memory providers that store and replay conversation turns.
#[async_trait]
pub trait MemoryProvider: Send + Sync {
    /// Store a message in memory.
    async fn remember(&mut self, message: &ChatMessage) -> Result<(), LLMError>;

    /// Retrieve stored messages, oldest first.
    ///
    /// With `limit`, only the most recent `limit` messages are returned.
    async fn recall(&self, limit: Option<usize>) -> Result<Vec<ChatMessage>, LLMError>;

    /// Clear all stored messages from memory.
    async fn clear(&mut self) -> Result<(), LLMError>;

    /// Get the current number of stored messages.
    fn size(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }
}
