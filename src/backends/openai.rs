//! OpenAI chat-completions backend.

use super::openai_compatible::{OpenAICompatibleConfig, OpenAICompatibleProvider};

/// OpenAI configuration for the generic provider
pub struct OpenAIConfig;

impl OpenAICompatibleConfig for OpenAIConfig {
    const PROVIDER_NAME: &'static str = "OpenAI";
    const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1/";
    const DEFAULT_MODEL: &'static str = "gpt-4.1-nano";
}

pub type OpenAI = OpenAICompatibleProvider<OpenAIConfig>;
