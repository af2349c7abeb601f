//! OpenAI-compatible chat-completions client
//!
//! Generic base for every provider speaking the `chat/completions` wire
//! format (OpenAI, the HuggingFace router, Groq). Providers customise the
//! endpoint and defaults through [`OpenAICompatibleConfig`].

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::{
    chat::{sse::create_sse_stream, ChatMessage, ChatProvider, ChatResponse, ChatStream, Usage},
    completion::{CompletionProvider, CompletionRequest, CompletionResponse},
    error::LLMError,
    LLMProvider,
};

/// Configuration trait for OpenAI-compatible providers
pub trait OpenAICompatibleConfig: Send + Sync {
    /// The name of the provider, used in logs and error messages
    const PROVIDER_NAME: &'static str;

    /// Default base URL for the provider; must end with `/`
    const DEFAULT_BASE_URL: &'static str;

    /// Default model for the provider
    const DEFAULT_MODEL: &'static str;

    /// Chat completions endpoint path, relative to the base URL
    const CHAT_ENDPOINT: &'static str = "chat/completions";

    /// Extra headers sent with every request
    fn custom_headers() -> Option<Vec<(String, String)>> {
        None
    }
}

/// Generic OpenAI-compatible provider
pub struct OpenAICompatibleProvider<T: OpenAICompatibleConfig> {
    pub api_key: String,
    pub base_url: Url,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub timeout_seconds: Option<u64>,
    pub client: Client,
    _phantom: PhantomData<T>,
}

#[derive(Serialize, Debug)]
pub struct OpenAICompatibleChatMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

#[derive(Serialize, Debug)]
pub struct OpenAICompatibleChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<OpenAICompatibleChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub stream: bool,
}

#[derive(Deserialize, Debug)]
pub struct OpenAICompatibleChatResponse {
    #[serde(default)]
    pub choices: Vec<OpenAICompatibleChatChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Deserialize, Debug)]
pub struct OpenAICompatibleChatChoice {
    pub message: OpenAICompatibleChatMsg,
}

#[derive(Deserialize, Debug)]
pub struct OpenAICompatibleChatMsg {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ChatStreamChunk {
    #[serde(default)]
    choices: Vec<ChatStreamChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatStreamChoice {
    #[serde(default)]
    delta: ChatStreamDelta,
}

#[derive(Deserialize, Debug, Default)]
struct ChatStreamDelta {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse for OpenAICompatibleChatResponse {
    fn text(&self) -> Option<String> {
        self.choices.first().and_then(|c| c.message.content.clone())
    }

    fn usage(&self) -> Option<Usage> {
        self.usage.clone()
    }
}

impl std::fmt::Display for OpenAICompatibleChatResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text().unwrap_or_default())
    }
}

/// Extracts the text delta of one streamed `chat.completion.chunk` frame.
///
/// Returns `None` when the payload is not a decodable chunk.
pub fn parse_stream_delta(payload: &str) -> Option<String> {
    let chunk: ChatStreamChunk = serde_json::from_str(payload).ok()?;
    Some(
        chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .unwrap_or_default(),
    )
}

/// Parses a base URL, making sure relative endpoint joins keep its last segment.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url, LLMError> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized)
        .map_err(|e| LLMError::InvalidRequest(format!("Invalid base URL '{raw}': {e}")))
}

impl<T: OpenAICompatibleConfig> OpenAICompatibleProvider<T> {
    pub fn new(
        api_key: impl Into<String>,
        base_url: Option<String>,
        model: Option<String>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
        timeout_seconds: Option<u64>,
    ) -> Result<Self, LLMError> {
        // Idle timeouts only: a whole-request deadline would cut off long streams.
        let mut builder = Client::builder();
        if let Some(sec) = timeout_seconds {
            let timeout = Duration::from_secs(sec);
            builder = builder.connect_timeout(timeout).read_timeout(timeout);
        }
        let base_url = parse_base_url(base_url.as_deref().unwrap_or(T::DEFAULT_BASE_URL))?;

        Ok(Self {
            api_key: api_key.into(),
            base_url,
            model: model.unwrap_or_else(|| T::DEFAULT_MODEL.to_string()),
            max_tokens,
            temperature,
            timeout_seconds,
            client: builder.build()?,
            _phantom: PhantomData,
        })
    }

    async fn send_chat(
        &self,
        messages: &[ChatMessage],
        stream: bool,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<reqwest::Response, LLMError> {
        if self.api_key.is_empty() {
            return Err(LLMError::AuthError(format!(
                "Missing {} API key",
                T::PROVIDER_NAME
            )));
        }

        let body = OpenAICompatibleChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| OpenAICompatibleChatMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            max_tokens: max_tokens.or(self.max_tokens),
            temperature: temperature.or(self.temperature),
            stream,
        };

        let url = self
            .base_url
            .join(T::CHAT_ENDPOINT)
            .map_err(|e| LLMError::HttpError(e.to_string()))?;

        let mut request = self.client.post(url).bearer_auth(&self.api_key).json(&body);

        if let Some(headers) = T::custom_headers() {
            for (key, value) in headers {
                request = request.header(key, value);
            }
        }

        if log::log_enabled!(log::Level::Trace) {
            if let Ok(json) = serde_json::to_string(&body) {
                log::trace!("{} request payload: {}", T::PROVIDER_NAME, json);
            }
        }

        let response = request.send().await?;

        log::debug!("{} HTTP status: {}", T::PROVIDER_NAME, response.status());

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let raw_response = response.text().await.unwrap_or_default();
            return Err(LLMError::StatusError {
                status,
                raw_response,
            });
        }

        Ok(response)
    }

    async fn chat_with_overrides(
        &self,
        messages: &[ChatMessage],
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<OpenAICompatibleChatResponse, LLMError> {
        let response = self
            .send_chat(messages, false, max_tokens, temperature)
            .await?;
        let resp_text = response.text().await?;

        let decoded: OpenAICompatibleChatResponse =
            serde_json::from_str(&resp_text).map_err(|e| LLMError::ResponseFormatError {
                message: format!("Failed to decode {} API response: {e}", T::PROVIDER_NAME),
                raw_response: resp_text.clone(),
            })?;

        if decoded.text().is_none() {
            return Err(LLMError::ResponseFormatError {
                message: format!("{} API response has no message content", T::PROVIDER_NAME),
                raw_response: resp_text,
            });
        }
        Ok(decoded)
    }
}

#[async_trait]
impl<T: OpenAICompatibleConfig> ChatProvider for OpenAICompatibleProvider<T> {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<Box<dyn ChatResponse>, LLMError> {
        let response = self.chat_with_overrides(messages, None, None).await?;
        Ok(Box::new(response))
    }

    async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<ChatStream, LLMError> {
        let response = self.send_chat(messages, true, None, None).await?;
        Ok(create_sse_stream(
            response.bytes_stream(),
            parse_stream_delta,
        ))
    }
}

/// A completion is a chat with the prompt as the single user message.
#[async_trait]
impl<T: OpenAICompatibleConfig> CompletionProvider for OpenAICompatibleProvider<T> {
    async fn complete(&self, req: &CompletionRequest) -> Result<CompletionResponse, LLMError> {
        let messages = [ChatMessage::user().content(req.prompt.clone()).build()];
        let response = self
            .chat_with_overrides(&messages, req.max_tokens, req.temperature)
            .await?;
        Ok(CompletionResponse {
            text: response.text().unwrap_or_default(),
        })
    }
}

impl<T: OpenAICompatibleConfig> LLMProvider for OpenAICompatibleProvider<T> {}
