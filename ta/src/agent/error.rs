//! Agent error types

use thiserror::Error;

use crate::llm::LlmError;

/// Errors that end a chat turn
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Model kept calling tools after {0} rounds; turn abandoned")]
    TooManyToolRounds(u32),

    #[error("Empty input")]
    EmptyInput,
}

impl AgentError {
    /// True when the model provider rejected or lacked credentials
    pub fn is_auth_error(&self) -> bool {
        matches!(self, AgentError::Llm(e) if e.is_auth_error())
    }
}
