//! Model input assembly.
//!
//! The board context goes into the system message, never into stored
//! history, so replayed turns stay small no matter how long the session runs.

use crate::chat::ChatMessage;

/// Default cap on the context embedded in the system message, in characters.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 15_000;
/// Contexts shorter than this (after trimming) are treated as no data.
pub const DEFAULT_MIN_CONTEXT_CHARS: usize = 20;
/// Default number of history messages replayed per request.
pub const DEFAULT_HISTORY_WINDOW: usize = 4;

/// Result of assembling one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt {
    /// The context is too short to ground an answer; no model call should be made.
    Insufficient,
    /// Messages to send, system message first and the question last.
    Messages(Vec<ChatMessage>),
}

/// Builds the message list for a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptAssembler {
    pub max_context_chars: usize,
    pub min_context_chars: usize,
    pub history_window: usize,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self {
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
            min_context_chars: DEFAULT_MIN_CONTEXT_CHARS,
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }
}

impl PromptAssembler {
    pub fn new(max_context_chars: usize, min_context_chars: usize, history_window: usize) -> Self {
        Self {
            max_context_chars,
            min_context_chars,
            history_window,
        }
    }

    /// Whether `context` carries enough text to be worth a model call.
    pub fn is_sufficient(&self, context: &str) -> bool {
        context.trim().chars().count() >= self.min_context_chars
    }

    /// Cuts `context` to at most `max_context_chars` characters.
    pub fn truncate<'a>(&self, context: &'a str) -> &'a str {
        match context.char_indices().nth(self.max_context_chars) {
            Some((idx, _)) => &context[..idx],
            None => context,
        }
    }

    /// Assembles the system message, the replay window of `history` and the question.
    pub fn assemble(&self, question: &str, context: &str, history: &[ChatMessage]) -> Prompt {
        if !self.is_sufficient(context) {
            return Prompt::Insufficient;
        }

        let start = history.len().saturating_sub(self.history_window);
        let mut messages = Vec::with_capacity(history.len() - start + 2);
        messages.push(
            ChatMessage::system()
                .content(system_message(self.truncate(context)))
                .build(),
        );
        messages.extend_from_slice(&history[start..]);
        messages.push(ChatMessage::user().content(question).build());
        Prompt::Messages(messages)
    }
}

const INSTRUCTIONS: &str = "\
You are a business assistant answering questions about work orders and deals.

Rules:
- Answer only from the board data below. Do not invent tasks, owners, dates or values.
- If the data does not contain the answer, say it is \"not available\".
- Treat items with High priority, an overdue or near due date, or a Stuck status as the most urgent.
- Treat \"Pending\", \"Unassigned\" and \"No deadline\" as placeholders for missing data.

Answer format: start with a short direct answer, then give supporting details as bullet points.";

fn system_message(context: &str) -> String {
    format!("{INSTRUCTIONS}\n\nBOARD DATA:\n{context}")
}

/// Byte offset where the context starts inside a system message built by
/// [`PromptAssembler::assemble`].
pub fn context_offset() -> usize {
    INSTRUCTIONS.len() + "\n\nBOARD DATA:\n".len()
}
