//! Single-prompt text generation (the `inputs`/`generated_text` API shape).

use async_trait::async_trait;

use crate::{chat::ChatResponse, error::LLMError};

/// A prompt to continue, with optional per-request sampling overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// The full prompt text
    pub prompt: String,
    /// Overrides the provider's configured output budget
    pub max_tokens: Option<u32>,
    /// Overrides the provider's configured temperature
    pub temperature: Option<f32>,
}

/// Text produced for a [`CompletionRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResponse {
    pub text: String,
}

impl std::fmt::Display for CompletionResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

impl ChatResponse for CompletionResponse {
    fn text(&self) -> Option<String> {
        Some(self.text.clone())
    }
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn max_tokens(mut self, val: u32) -> Self {
        self.max_tokens = Some(val);
        self
    }

    pub fn temperature(mut self, val: f32) -> Self {
        self.temperature = Some(val);
        self
    }
}

/// Trait for providers that can continue a single prompt.
#[async_trait]
pub trait CompletionProvider {
    /// Generates a continuation of `req.prompt`.
    async fn complete(&self, req: &CompletionRequest) -> Result<CompletionResponse, LLMError>;
}
