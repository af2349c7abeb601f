use std::fmt;

/// Error types that can occur when interacting with LLM providers.
#[derive(Debug)]
pub enum LLMError {
    /// HTTP transport errors (connect, timeout, broken body)
    HttpError(String),
    /// Authentication and authorization errors
    AuthError(String),
    /// Invalid request parameters or configuration
    InvalidRequest(String),
    /// Errors reported by the LLM provider itself
    ProviderError(String),
    /// JSON serialization/deserialization errors
    JsonError(String),
    /// The provider answered with a body we could not decode
    ResponseFormatError {
        message: String,
        raw_response: String,
    },
    /// The provider answered with a non-success HTTP status
    StatusError { status: u16, raw_response: String },
    /// The inference endpoint kept answering 503 while the model loads
    ModelLoading { attempts: usize },
    /// Every credential of a rotation set failed
    KeysExhausted { attempts: usize, last_error: String },
    /// Anything else
    Generic(String),
}

impl LLMError {
    /// Whether retrying the same request later may succeed.
    ///
    /// Transport failures, rate limiting, server-side errors and model warm-up
    /// are transient; authentication, malformed requests and undecodable
    /// responses are terminal.
    pub fn is_transient(&self) -> bool {
        match self {
            LLMError::HttpError(_) => true,
            LLMError::StatusError { status, .. } => *status == 429 || *status >= 500,
            LLMError::ModelLoading { .. } => true,
            LLMError::AuthError(_)
            | LLMError::ProviderError(_)
            | LLMError::InvalidRequest(_)
            | LLMError::JsonError(_)
            | LLMError::ResponseFormatError { .. }
            | LLMError::KeysExhausted { .. }
            | LLMError::Generic(_) => false,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            LLMError::StatusError { status, .. } => Some(*status),
            LLMError::ModelLoading { .. } => Some(503),
            _ => None,
        }
    }
}

impl fmt::Display for LLMError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LLMError::HttpError(e) => write!(f, "HTTP Error: {e}"),
            LLMError::AuthError(e) => write!(f, "Auth Error: {e}"),
            LLMError::InvalidRequest(e) => write!(f, "Invalid Request: {e}"),
            LLMError::ProviderError(e) => write!(f, "Provider Error: {e}"),
            LLMError::JsonError(e) => write!(f, "JSON Parse Error: {e}"),
            LLMError::ResponseFormatError {
                message,
                raw_response,
            } => write!(f, "Response Format Error: {message}. Raw response: {raw_response}"),
            LLMError::StatusError {
                status,
                raw_response,
            } => write!(f, "Status Error: {status}: {raw_response}"),
            LLMError::ModelLoading { attempts } => {
                write!(f, "Model still loading after {attempts} attempts")
            }
            LLMError::KeysExhausted {
                attempts,
                last_error,
            } => write!(f, "All {attempts} API keys failed. Last error: {last_error}"),
            LLMError::Generic(e) => write!(f, "Generic Error: {e}"),
        }
    }
}

impl std::error::Error for LLMError {}

/// Converts reqwest HTTP errors into LLMErrors
impl From<reqwest::Error> for LLMError {
    fn from(err: reqwest::Error) -> Self {
        LLMError::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for LLMError {
    fn from(err: serde_json::Error) -> Self {
        LLMError::JsonError(format!(
            "{} at line {} column {}",
            err,
            err.line(),
            err.column()
        ))
    }
}
