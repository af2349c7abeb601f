//! Provider rotation across an ordered set of credentials.
//!
//! Each credential gets its own provider instance. A request goes to the
//! first one; on any error the next one is tried, strictly in order, with no
//! backoff and no retry of the same key. Every request starts again from the
//! first credential.
//!
//! # Example
//!
//! ```no_run
//! use boardchat::builder::{LLMBackend, LLMBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let llm = LLMBuilder::new()
//!         .backend(LLMBackend::Groq)
//!         .api_keys(["gsk_first", "gsk_second", "gsk_third"])
//!         .build()?;
//!
//!     let msgs = [boardchat::chat::ChatMessage::user().content("Say hi").build()];
//!     println!("{}", llm.chat(&msgs).await?);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;

use crate::chat::{ChatMessage, ChatProvider, ChatResponse, ChatStream};
use crate::completion::{CompletionProvider, CompletionRequest, CompletionResponse};
use crate::error::LLMError;
use crate::LLMProvider;

/// Wrapper that falls through a list of providers until one succeeds.
pub struct RotatingLLM {
    providers: Vec<Box<dyn LLMProvider>>,
}

impl RotatingLLM {
    /// Creates a rotation over `providers`, tried in the given order.
    pub fn new(providers: Vec<Box<dyn LLMProvider>>) -> Result<Self, LLMError> {
        if providers.is_empty() {
            return Err(LLMError::InvalidRequest(
                "Key rotation needs at least one provider".to_string(),
            ));
        }
        Ok(Self { providers })
    }

    fn exhausted(&self, last_err: Option<LLMError>) -> LLMError {
        LLMError::KeysExhausted {
            attempts: self.providers.len(),
            last_error: last_err.map(|e| e.to_string()).unwrap_or_default(),
        }
    }

    fn log_failure(&self, idx: usize, err: &LLMError) {
        let kind = if err.is_transient() {
            "is temporarily unavailable"
        } else {
            "was rejected"
        };
        log::warn!(
            "API key #{} of {} {kind}, rotating: {err}",
            idx + 1,
            self.providers.len()
        );
    }
}

impl LLMProvider for RotatingLLM {}

#[async_trait]
impl ChatProvider for RotatingLLM {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<Box<dyn ChatResponse>, LLMError> {
        let mut last_err: Option<LLMError> = None;
        for (idx, provider) in self.providers.iter().enumerate() {
            match provider.chat(messages).await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    self.log_failure(idx, &e);
                    last_err = Some(e);
                }
            }
        }
        Err(self.exhausted(last_err))
    }

    /// Only opening the stream is rotated; a stream that fails midway is not
    /// restarted with the next key.
    async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<ChatStream, LLMError> {
        let mut last_err: Option<LLMError> = None;
        for (idx, provider) in self.providers.iter().enumerate() {
            match provider.chat_stream(messages).await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    self.log_failure(idx, &e);
                    last_err = Some(e);
                }
            }
        }
        Err(self.exhausted(last_err))
    }
}

#[async_trait]
impl CompletionProvider for RotatingLLM {
    async fn complete(&self, req: &CompletionRequest) -> Result<CompletionResponse, LLMError> {
        let mut last_err: Option<LLMError> = None;
        for (idx, provider) in self.providers.iter().enumerate() {
            match provider.complete(req).await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    self.log_failure(idx, &e);
                    last_err = Some(e);
                }
            }
        }
        Err(self.exhausted(last_err))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    struct ScriptedProvider {
        answer: Option<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ChatProvider for ScriptedProvider {
        async fn chat(&self, _messages: &[ChatMessage]) -> Result<Box<dyn ChatResponse>, LLMError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.answer {
                Some(text) => Ok(Box::new(CompletionResponse { text: text.to_string() })),
                None => Err(LLMError::ProviderError("quota exceeded".into())),
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        async fn complete(&self, _req: &CompletionRequest) -> Result<CompletionResponse, LLMError> {
            Err(LLMError::ProviderError("unused".into()))
        }
    }

    impl LLMProvider for ScriptedProvider {}

    fn scripted(answers: &[Option<&'static str>]) -> (RotatingLLM, Vec<Arc<AtomicUsize>>) {
        let counters: Vec<Arc<AtomicUsize>> =
            answers.iter().map(|_| Arc::new(AtomicUsize::new(0))).collect();
        let providers = answers
            .iter()
            .zip(&counters)
            .map(|(answer, calls)| {
                Box::new(ScriptedProvider {
                    answer: *answer,
                    calls: calls.clone(),
                }) as Box<dyn LLMProvider>
            })
            .collect();
        (RotatingLLM::new(providers).unwrap(), counters)
    }

    fn calls(counters: &[Arc<AtomicUsize>]) -> Vec<usize> {
        counters.iter().map(|c| c.load(Ordering::SeqCst)).collect()
    }

    #[tokio::test]
    async fn third_key_answers_after_two_failures() {
        let (llm, counters) = scripted(&[None, None, Some("from key 3"), Some("from key 4")]);
        let msgs = [ChatMessage::user().content("hi").build()];
        let resp = llm.chat(&msgs).await.unwrap();
        assert_eq!(resp.text().as_deref(), Some("from key 3"));
        assert_eq!(calls(&counters), vec![1, 1, 1, 0]);
    }

    #[tokio::test]
    async fn every_request_restarts_from_first_key() {
        let (llm, counters) = scripted(&[None, Some("ok")]);
        let msgs = [ChatMessage::user().content("hi").build()];
        llm.chat(&msgs).await.unwrap();
        llm.chat(&msgs).await.unwrap();
        assert_eq!(calls(&counters), vec![2, 2]);
    }

    #[tokio::test]
    async fn all_failing_keys_report_exhaustion() {
        let (llm, counters) = scripted(&[None, None, None]);
        let msgs = [ChatMessage::user().content("hi").build()];
        let err = llm.chat(&msgs).await.unwrap_err();
        assert!(matches!(err, LLMError::KeysExhausted { attempts: 3, .. }));
        assert_eq!(calls(&counters), vec![1, 1, 1]);
    }

    #[test]
    fn empty_rotation_is_rejected() {
        assert!(RotatingLLM::new(Vec::new()).is_err());
    }
}
