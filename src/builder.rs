//! Builder module for configuring and instantiating LLM providers.
//!
//! One API key yields a plain provider; several keys yield a
//! [`RotatingLLM`] holding one provider per key, tried in order.

use std::time::Duration;

use crate::{error::LLMError, rotating_llm::RotatingLLM, LLMProvider};

/// Supported LLM backend providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LLMBackend {
    /// OpenAI chat-completions API
    OpenAI,
    /// HuggingFace Inference Providers router (chat-completions)
    HuggingFace,
    /// HuggingFace text-generation inference endpoint
    HuggingFaceInference,
    /// Groq chat-completions API
    Groq,
}

impl LLMBackend {
    /// Prefix of the environment variables / secret names holding this backend's keys.
    pub fn key_name(&self) -> &'static str {
        match self {
            LLMBackend::OpenAI => "OPENAI_API_KEY",
            LLMBackend::HuggingFace | LLMBackend::HuggingFaceInference => "HF_API_KEY",
            LLMBackend::Groq => "GROQ_API_KEY",
        }
    }
}

/// Parses a backend name, case-insensitively.
///
/// # Examples
///
/// ```
/// use std::str::FromStr;
/// use boardchat::builder::LLMBackend;
///
/// let backend = LLMBackend::from_str("HF").unwrap();
/// assert_eq!(backend, LLMBackend::HuggingFace);
///
/// let err = LLMBackend::from_str("invalid").unwrap_err();
/// assert!(err.to_string().contains("Unknown LLM backend"));
/// ```
impl std::str::FromStr for LLMBackend {
    type Err = LLMError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LLMBackend::OpenAI),
            "huggingface" | "hf" => Ok(LLMBackend::HuggingFace),
            "huggingface-inference" | "hf-inference" => Ok(LLMBackend::HuggingFaceInference),
            "groq" => Ok(LLMBackend::Groq),
            _ => Err(LLMError::InvalidRequest(format!(
                "Unknown LLM backend: {s}"
            ))),
        }
    }
}

/// Builder for configuring and instantiating LLM providers.
#[derive(Debug, Default)]
pub struct LLMBuilder {
    /// Selected backend provider
    backend: Option<LLMBackend>,
    /// API keys, in rotation order
    api_keys: Vec<String>,
    /// Base URL (chat backends) or full endpoint URL (inference backend)
    base_url: Option<String>,
    /// Model identifier/name to use
    model: Option<String>,
    /// Maximum tokens to generate in responses
    max_tokens: Option<u32>,
    /// Sampling temperature
    temperature: Option<f32>,
    /// Request timeout duration in seconds
    timeout_seconds: Option<u64>,
    /// Total attempts while the inference model is loading
    warmup_attempts: Option<usize>,
    /// Pause between warm-up attempts
    warmup_delay: Option<Duration>,
}

impl LLMBuilder {
    /// Creates a new empty builder instance with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the backend provider to use.
    pub fn backend(mut self, backend: LLMBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Sets a single API key, replacing any previously set keys.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_keys = vec![key.into()];
        self
    }

    /// Sets the ordered list of API keys used for rotation.
    pub fn api_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.api_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the base URL for API requests.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model identifier to use.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the maximum number of tokens to generate.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Sets the temperature for controlling response randomness.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the request timeout in seconds.
    pub fn timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = Some(timeout_seconds);
        self
    }

    /// Sets how many requests the inference backend makes while the model loads.
    pub fn warmup_attempts(mut self, attempts: usize) -> Self {
        self.warmup_attempts = Some(attempts);
        self
    }

    /// Sets the pause between warm-up attempts.
    pub fn warmup_delay(mut self, delay: Duration) -> Self {
        self.warmup_delay = Some(delay);
        self
    }

    /// Builds and returns a configured LLM provider instance.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No backend is specified
    /// - The backend feature is not enabled
    /// - No API key is provided, or several keys are given to the inference backend
    /// - The base URL cannot be parsed
    pub fn build(self) -> Result<Box<dyn LLMProvider>, LLMError> {
        let backend = self
            .backend
            .ok_or_else(|| LLMError::InvalidRequest("No backend specified".to_string()))?;

        let keys: Vec<String> = self
            .api_keys
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        if keys.is_empty() {
            return Err(LLMError::InvalidRequest(format!(
                "No API key provided for {backend:?}"
            )));
        }
        if backend == LLMBackend::HuggingFaceInference && keys.len() > 1 {
            return Err(LLMError::InvalidRequest(
                "The inference endpoint takes a single API key".to_string(),
            ));
        }

        let mut providers = keys
            .into_iter()
            .map(|key| self.build_single(backend, key))
            .collect::<Result<Vec<_>, _>>()?;

        if providers.len() == 1 {
            Ok(providers.remove(0))
        } else {
            log::debug!("rotating across {} {backend:?} API keys", providers.len());
            Ok(Box::new(RotatingLLM::new(providers)?))
        }
    }

    #[allow(unused_variables, unreachable_code)]
    fn build_single(
        &self,
        backend: LLMBackend,
        key: String,
    ) -> Result<Box<dyn LLMProvider>, LLMError> {
        let provider: Box<dyn LLMProvider> = match backend {
            LLMBackend::OpenAI => {
                #[cfg(not(feature = "openai"))]
                return Err(LLMError::InvalidRequest(
                    "OpenAI feature not enabled".to_string(),
                ));

                #[cfg(feature = "openai")]
                Box::new(crate::backends::openai::OpenAI::new(
                    key,
                    self.base_url.clone(),
                    self.model.clone(),
                    self.max_tokens,
                    self.temperature,
                    self.timeout_seconds,
                )?)
            }
            LLMBackend::HuggingFace => {
                #[cfg(not(feature = "huggingface"))]
                return Err(LLMError::InvalidRequest(
                    "HuggingFace feature not enabled".to_string(),
                ));

                #[cfg(feature = "huggingface")]
                Box::new(crate::backends::huggingface::HuggingFace::new(
                    key,
                    self.base_url.clone(),
                    self.model.clone(),
                    self.max_tokens,
                    self.temperature,
                    self.timeout_seconds,
                )?)
            }
            LLMBackend::HuggingFaceInference => {
                #[cfg(not(feature = "huggingface"))]
                return Err(LLMError::InvalidRequest(
                    "HuggingFace feature not enabled".to_string(),
                ));

                #[cfg(feature = "huggingface")]
                {
                    use crate::backends::huggingface::{HuggingFaceInference, WarmupPolicy};

                    let defaults = WarmupPolicy::default();
                    let warmup = WarmupPolicy {
                        max_attempts: self.warmup_attempts.unwrap_or(defaults.max_attempts),
                        delay: self.warmup_delay.unwrap_or(defaults.delay),
                    };
                    Box::new(HuggingFaceInference::new(
                        key,
                        self.base_url.clone(),
                        self.model.clone(),
                        self.max_tokens,
                        self.temperature,
                        self.timeout_seconds,
                        warmup,
                    )?)
                }
            }
            LLMBackend::Groq => {
                #[cfg(not(feature = "groq"))]
                return Err(LLMError::InvalidRequest(
                    "Groq feature not enabled".to_string(),
                ));

                #[cfg(feature = "groq")]
                Box::new(crate::backends::groq::Groq::new(
                    key,
                    self.base_url.clone(),
                    self.model.clone(),
                    self.max_tokens,
                    self.temperature,
                    self.timeout_seconds,
                )?)
            }
        };

        Ok(provider)
    }
}
