//! LLM client module
//!
//! One trait, two providers. Requests are stateless: the agent sends the
//! whole transcript every time.

use std::sync::Arc;

use tracing::debug;

mod anthropic;
pub mod client;
mod error;
mod openai;
pub(crate) mod sse;
mod types;

pub use anthropic::AnthropicClient;
pub use client::LlmClient;
pub use error::LlmError;
pub use openai::OpenAIClient;
pub use types::{
    CompletionRequest, CompletionResponse, ContentBlock, Message, MessageContent, Role, StopReason, StreamChunk,
    TokenUsage, ToolCall, ToolDefinition,
};

#[cfg(test)]
pub use client::mock;

use crate::config::{LlmConfig, ResolvedLlmConfig};

/// Create an LLM client for the configured provider and model
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    create_client_from_resolved(&config.resolve())
}

/// Create an LLM client from a resolved configuration
pub fn create_client_from_resolved(config: &ResolvedLlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client_from_resolved: called");
    match config.provider.as_str() {
        "anthropic" => Ok(Arc::new(AnthropicClient::from_config(config)?)),
        "openai" => Ok(Arc::new(OpenAIClient::from_config(config)?)),
        other => {
            debug!(provider = %other, "create_client_from_resolved: unknown provider");
            Err(LlmError::UnknownProvider(other.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(provider: &str, key_env: &str) -> ResolvedLlmConfig {
        ResolvedLlmConfig {
            provider: provider.to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: key_env.to_string(),
            base_url: "https://api.openai.com".to_string(),
            max_tokens: 1024,
            timeout_ms: 1000,
        }
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let err = create_client_from_resolved(&resolved("cohere", "PATH")).err().unwrap();
        assert!(matches!(err, LlmError::UnknownProvider(p) if p == "cohere"));
    }

    #[test]
    fn test_missing_key_is_reported_by_name() {
        let err = create_client_from_resolved(&resolved("openai", "TASKAGENT_TEST_UNSET_KEY"))
            .err()
            .unwrap();
        assert!(matches!(err, LlmError::MissingApiKey(env) if env == "TASKAGENT_TEST_UNSET_KEY"));
    }

    #[test]
    fn test_creates_client_when_key_present() {
        // PATH is always set, which is enough to construct a client
        let client = create_client_from_resolved(&resolved("openai", "PATH")).unwrap();
        assert_eq!(client.model(), "gpt-4o-mini");
    }
}
