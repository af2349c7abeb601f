//! boardchat answers questions about project-management boards with an LLM.
//!
//! # Overview
//! Every user turn runs the same three steps:
//!
//! - fetch the configured boards over GraphQL and flatten them into a bounded
//!   text context ([`board`]), optionally served from a time-boxed cache
//! - assemble the model input: a grounded system message carrying the context,
//!   a bounded window of earlier turns, and the new question ([`prompt`])
//! - ask a chat-completions or text-generation provider, blocking or streamed,
//!   optionally rotating through several API keys ([`backends`], [`rotating_llm`])
//!
//! [`session::ChatSession`] ties the steps together and records each exchange.
//! It never fails past its own boundary: every failure becomes answer text.

// Re-export for convenience
pub use async_trait::async_trait;

/// Backend implementations for the supported LLM providers
pub mod backends;

/// Builder pattern for configuring and instantiating LLM providers
pub mod builder;

/// Board data model, GraphQL fetching and context formatting
pub mod board;

/// Chat-based interactions with language models
pub mod chat;

/// Single-prompt text generation
pub mod completion;

/// Runtime configuration
pub mod config;

/// Error types and handling
pub mod error;

/// Conversation history with a bounded replay window
pub mod memory;

/// Model input assembly
pub mod prompt;

/// Sequential fallback across several API keys
pub mod rotating_llm;

/// Secret store for storing API keys
pub mod secret_store;

/// Per-session orchestration of fetch, assembly and answering
pub mod session;

#[inline]
/// Initialize logging using env_logger if the "logging" feature is enabled.
/// This is a no-op if the feature is not enabled.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::try_init();
    }
}

/// Core trait that all LLM providers implement, combining chat and
/// single-prompt completion behind one object.
pub trait LLMProvider: chat::ChatProvider + completion::CompletionProvider {}
