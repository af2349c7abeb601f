//! HuggingFace backends.
//!
//! Two API shapes are supported:
//! - the Inference Providers router, which speaks chat-completions
//!   ([`HuggingFace`]);
//! - the classic text-generation inference endpoint (`inputs` in,
//!   `generated_text` out) that answers `503` while a cold model loads
//!   ([`HuggingFaceInference`]).
//!
//! <https://huggingface.co/docs/inference-providers>

use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};

use super::openai_compatible::{parse_base_url, OpenAICompatibleConfig, OpenAICompatibleProvider};
use crate::{
    chat::{ChatMessage, ChatProvider, ChatResponse, ChatRole, ChatStream},
    completion::{CompletionProvider, CompletionRequest, CompletionResponse},
    error::LLMError,
    LLMProvider,
};

/// HuggingFace router configuration for the generic provider
pub struct HuggingFaceConfig;

impl OpenAICompatibleConfig for HuggingFaceConfig {
    const PROVIDER_NAME: &'static str = "HuggingFace Inference Providers";
    const DEFAULT_BASE_URL: &'static str = "https://router.huggingface.co/v1/";
    const DEFAULT_MODEL: &'static str = "meta-llama/Llama-3.1-8B-Instruct";
}

pub type HuggingFace = OpenAICompatibleProvider<HuggingFaceConfig>;

/// Base URL of the serverless text-generation endpoint; the model id is appended.
pub const DEFAULT_INFERENCE_BASE_URL: &str = "https://api-inference.huggingface.co/models/";

/// How long to wait for a cold model before giving up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmupPolicy {
    /// Total number of requests, including the first one
    pub max_attempts: usize,
    /// Fixed pause after each `503`
    pub delay: Duration,
}

impl Default for WarmupPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(15),
        }
    }
}

#[derive(Serialize, Debug)]
struct TextGenerationRequest<'a> {
    inputs: &'a str,
    parameters: TextGenerationParameters,
}

#[derive(Serialize, Debug)]
struct TextGenerationParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_new_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    return_full_text: bool,
}

#[derive(Deserialize, Debug)]
struct GeneratedText {
    generated_text: String,
}

/// Client for a single-credential text-generation endpoint.
pub struct HuggingFaceInference {
    pub api_key: String,
    pub endpoint: Url,
    pub max_new_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub warmup: WarmupPolicy,
    pub client: Client,
}

impl HuggingFaceInference {
    /// Creates a client for `model`, or for the full `endpoint` URL when given.
    pub fn new(
        api_key: impl Into<String>,
        endpoint: Option<String>,
        model: Option<String>,
        max_new_tokens: Option<u32>,
        temperature: Option<f32>,
        timeout_seconds: Option<u64>,
        warmup: WarmupPolicy,
    ) -> Result<Self, LLMError> {
        let endpoint = match endpoint {
            Some(url) => Url::parse(&url)
                .map_err(|e| LLMError::InvalidRequest(format!("Invalid endpoint '{url}': {e}")))?,
            None => {
                let model = model.unwrap_or_else(|| HuggingFaceConfig::DEFAULT_MODEL.to_string());
                parse_base_url(DEFAULT_INFERENCE_BASE_URL)?
                    .join(&model)
                    .map_err(|e| LLMError::InvalidRequest(e.to_string()))?
            }
        };

        let mut builder = Client::builder();
        if let Some(sec) = timeout_seconds {
            builder = builder.timeout(Duration::from_secs(sec));
        }

        Ok(Self {
            api_key: api_key.into(),
            endpoint,
            max_new_tokens,
            temperature,
            warmup,
            client: builder.build()?,
        })
    }

    async fn generate_once(&self, body: &TextGenerationRequest<'_>) -> Result<String, LLMError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        log::debug!("HuggingFace inference HTTP status: {}", response.status());

        let status = response.status();
        let resp_text = response.text().await?;
        if !status.is_success() {
            return Err(LLMError::StatusError {
                status: status.as_u16(),
                raw_response: resp_text,
            });
        }

        let generated: Vec<GeneratedText> =
            serde_json::from_str(&resp_text).map_err(|e| LLMError::ResponseFormatError {
                message: format!("Failed to decode text-generation response: {e}"),
                raw_response: resp_text.clone(),
            })?;
        generated
            .into_iter()
            .next()
            .map(|g| g.generated_text)
            .ok_or_else(|| LLMError::ResponseFormatError {
                message: "text-generation response is empty".to_string(),
                raw_response: resp_text,
            })
    }
}

/// Renders a message list as a single role-labelled transcript prompt.
pub fn transcript_prompt(messages: &[ChatMessage]) -> String {
    let mut prompt = String::new();
    for msg in messages {
        match msg.role {
            ChatRole::System => {
                prompt.push_str(&msg.content);
                prompt.push_str("\n\n");
            }
            ChatRole::User => {
                prompt.push_str("User: ");
                prompt.push_str(&msg.content);
                prompt.push('\n');
            }
            ChatRole::Assistant => {
                prompt.push_str("Assistant: ");
                prompt.push_str(&msg.content);
                prompt.push('\n');
            }
        }
    }
    prompt.push_str("Assistant:");
    prompt
}

#[async_trait]
impl CompletionProvider for HuggingFaceInference {
    async fn complete(&self, req: &CompletionRequest) -> Result<CompletionResponse, LLMError> {
        if self.api_key.is_empty() {
            return Err(LLMError::AuthError("Missing HuggingFace API key".to_string()));
        }

        let body = TextGenerationRequest {
            inputs: &req.prompt,
            parameters: TextGenerationParameters {
                max_new_tokens: req.max_tokens.or(self.max_new_tokens),
                temperature: req.temperature.or(self.temperature),
                return_full_text: false,
            },
        };

        let attempts = self.warmup.max_attempts.max(1);
        for attempt in 1..=attempts {
            match self.generate_once(&body).await {
                Err(e) if e.status() == Some(StatusCode::SERVICE_UNAVAILABLE.as_u16()) => {
                    if attempt == attempts {
                        break;
                    }
                    log::warn!(
                        "model is loading (attempt {attempt}/{attempts}), retrying in {:?}",
                        self.warmup.delay
                    );
                    tokio::time::sleep(self.warmup.delay).await;
                }
                Ok(text) => return Ok(CompletionResponse { text }),
                Err(e) => return Err(e),
            }
        }
        Err(LLMError::ModelLoading { attempts })
    }
}

#[async_trait]
impl ChatProvider for HuggingFaceInference {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<Box<dyn ChatResponse>, LLMError> {
        let req = CompletionRequest::new(transcript_prompt(messages));
        let response = self.complete(&req).await?;
        Ok(Box::new(response))
    }

    /// The endpoint has no incremental mode; the whole answer is one fragment.
    async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<ChatStream, LLMError> {
        let req = CompletionRequest::new(transcript_prompt(messages));
        let response = self.complete(&req).await?;
        Ok(Box::pin(stream::iter(vec![Ok(response.text)])))
    }
}

impl LLMProvider for HuggingFaceInference {}
