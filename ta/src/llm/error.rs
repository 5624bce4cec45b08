//! LLM error types

use thiserror::Error;

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("LLM API key not found. Set the {0} environment variable.")]
    MissingApiKey(String),

    #[error("Unknown LLM provider: '{0}'. Supported: auto, openai, anthropic")]
    UnknownProvider(String),
}

impl LlmError {
    /// True when the provider rejected the credentials
    pub fn is_auth_error(&self) -> bool {
        matches!(self, LlmError::ApiError { status: 401 | 403, .. } | LlmError::MissingApiKey(_))
    }
}
