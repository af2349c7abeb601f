//! Groq backend.
//!
//! Groq hands out several independent free-tier keys, which makes it the
//! usual target of [`crate::rotating_llm::RotatingLLM`].

use super::openai_compatible::{OpenAICompatibleConfig, OpenAICompatibleProvider};

/// Groq configuration for the generic provider
pub struct GroqConfig;

impl OpenAICompatibleConfig for GroqConfig {
    const PROVIDER_NAME: &'static str = "Groq";
    const DEFAULT_BASE_URL: &'static str = "https://api.groq.com/openai/v1/";
    const DEFAULT_MODEL: &'static str = "llama-3.1-8b-instant";
}

pub type Groq = OpenAICompatibleProvider<GroqConfig>;
