//! Runtime configuration.
//!
//! Every value has a default, so a config file only needs the fields it
//! changes:
//!
//! ```json
//! { "backend": "groq", "stream": true, "history_window": 6 }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    board::{format::ColumnDefaults, BoardClient, BoardContextFetcher},
    builder::{LLMBackend, LLMBuilder},
    error::LLMError,
    prompt::{self, PromptAssembler},
    secret_store::{SecretStore, BOARD_API_KEY},
    session::ChatSession,
    LLMProvider,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// GraphQL endpoint of the board API
    pub board_api_url: String,
    /// Boards to summarise, in query order
    pub board_ids: Vec<u64>,
    /// Items fetched per board
    pub items_page_size: u32,
    pub board_timeout_seconds: u64,
    /// Lifetime of a fetched context; `0` disables caching
    pub cache_ttl_seconds: u64,

    /// Backend name, see [`LLMBackend`]
    pub backend: String,
    /// Model identifier; the backend's default when unset
    pub model: Option<String>,
    /// Base URL (chat backends) or full endpoint URL (inference backend)
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub llm_timeout_seconds: u64,
    /// Render answers progressively
    pub stream: bool,

    /// Characters of context embedded in the prompt
    pub max_context_chars: usize,
    /// Shorter contexts are answered without a model call
    pub min_context_chars: usize,
    /// History messages replayed per request
    pub history_window: usize,

    /// Inference-endpoint requests made while the model loads
    pub warmup_attempts: usize,
    pub warmup_delay_seconds: u64,

    /// Shown for blank columns that have no registered default
    pub missing_value_marker: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            board_api_url: "https://api.monday.com/v2".to_string(),
            board_ids: vec![5026839123, 5026839113],
            items_page_size: 50,
            board_timeout_seconds: 30,
            cache_ttl_seconds: 600,
            backend: "huggingface".to_string(),
            model: None,
            base_url: None,
            temperature: 0.3,
            max_tokens: 300,
            llm_timeout_seconds: 60,
            stream: false,
            max_context_chars: prompt::DEFAULT_MAX_CONTEXT_CHARS,
            min_context_chars: prompt::DEFAULT_MIN_CONTEXT_CHARS,
            history_window: prompt::DEFAULT_HISTORY_WINDOW,
            warmup_attempts: 3,
            warmup_delay_seconds: 15,
            missing_value_marker: None,
        }
    }
}

impl ChatConfig {
    /// `~/.boardchat/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".boardchat").join("config.json"))
    }

    /// Reads the config at `path`.
    pub fn load(path: &Path) -> Result<Self, LLMError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| LLMError::InvalidRequest(format!("{}: {e}", path.display())))?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Reads the config at `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, LLMError> {
        match fs::metadata(path) {
            Ok(_) => Self::load(path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("no config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(LLMError::InvalidRequest(format!("{}: {e}", path.display()))),
        }
    }

    pub fn llm_backend(&self) -> Result<LLMBackend, LLMError> {
        self.backend.parse()
    }

    pub fn assembler(&self) -> PromptAssembler {
        PromptAssembler::new(
            self.max_context_chars,
            self.min_context_chars,
            self.history_window,
        )
    }

    pub fn column_defaults(&self) -> ColumnDefaults {
        match &self.missing_value_marker {
            Some(marker) => ColumnDefaults::default().with_missing_marker(marker),
            None => ColumnDefaults::default(),
        }
    }

    /// Builds the board fetcher authenticated with `api_key`.
    pub fn board_fetcher(&self, api_key: &str) -> Result<BoardContextFetcher, LLMError> {
        let client = BoardClient::new(
            &self.board_api_url,
            api_key,
            self.board_ids.clone(),
            self.items_page_size,
            Duration::from_secs(self.board_timeout_seconds),
        )
        .map_err(|e| LLMError::InvalidRequest(e.to_string()))?;
        Ok(BoardContextFetcher::new(
            client,
            self.column_defaults(),
            Duration::from_secs(self.cache_ttl_seconds),
        ))
    }

    /// Builds the provider; several keys give a rotating provider.
    pub fn llm<I, S>(&self, api_keys: I) -> Result<Box<dyn LLMProvider>, LLMError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut builder = LLMBuilder::new()
            .backend(self.llm_backend()?)
            .api_keys(api_keys)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .timeout_seconds(self.llm_timeout_seconds)
            .warmup_attempts(self.warmup_attempts)
            .warmup_delay(Duration::from_secs(self.warmup_delay_seconds));
        if let Some(model) = &self.model {
            builder = builder.model(model);
        }
        if let Some(url) = &self.base_url {
            builder = builder.base_url(url);
        }
        builder.build()
    }

    /// Builds a ready session using the credentials found in `secrets`.
    pub fn session(&self, secrets: &SecretStore) -> Result<ChatSession, LLMError> {
        let board_key = secrets
            .lookup(BOARD_API_KEY)
            .ok_or_else(|| LLMError::AuthError(format!("Missing {BOARD_API_KEY}")))?;

        let backend = self.llm_backend()?;
        let keys = secrets.keys(backend.key_name());
        if keys.is_empty() {
            return Err(LLMError::AuthError(format!(
                "Missing {} (or {}_1, {}_2, ...)",
                backend.key_name(),
                backend.key_name(),
                backend.key_name()
            )));
        }
        log::debug!("using {} {backend:?} key(s)", keys.len());

        Ok(ChatSession::new(
            Box::new(self.board_fetcher(&board_key)?),
            self.assembler(),
            self.llm(keys)?,
        )
        .streaming(self.stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"backend": "groq", "history_window": 6, "stream": true}"#).unwrap();

        let config = ChatConfig::load(&path).unwrap();
        assert_eq!(config.backend, "groq");
        assert_eq!(config.history_window, 6);
        assert!(config.stream);
        assert_eq!(config.max_context_chars, 15_000);
        assert_eq!(config.board_ids, vec![5026839123, 5026839113]);
    }

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ChatConfig::load_or_default(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, ChatConfig::default());
    }

    #[test]
    fn malformed_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"history_window": "four"}"#).unwrap();
        assert!(matches!(
            ChatConfig::load_or_default(&path),
            Err(LLMError::JsonError(_))
        ));
    }

    #[test]
    fn session_requires_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let mut secrets = SecretStore::with_path(dir.path().join("secrets.json"))
            .unwrap()
            .without_env();
        let config = ChatConfig::default();
        assert!(matches!(config.session(&secrets), Err(LLMError::AuthError(_))));

        secrets.set(BOARD_API_KEY, "board").unwrap();
        assert!(matches!(config.session(&secrets), Err(LLMError::AuthError(_))));

        secrets.set("HF_API_KEY", "hf_x").unwrap();
        assert!(config.session(&secrets).is_ok());
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let config = ChatConfig {
            backend: "nope".into(),
            ..ChatConfig::default()
        };
        assert!(config.llm_backend().is_err());
    }
}
