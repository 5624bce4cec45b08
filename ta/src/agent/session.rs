//! AgentSession - one conversation with tool dispatch

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::AgentError;
use crate::config::Config;
use crate::llm::{CompletionRequest, CompletionResponse, ContentBlock, LlmClient, Message, StreamChunk, TokenUsage};
use crate::tools::{ToolContext, ToolExecutor, ToolResult};

/// Per-session limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentOptions {
    /// Tool rounds allowed in a single user turn
    pub max_tool_rounds: u32,

    /// Max tokens per model response
    pub max_tokens: u32,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            max_tool_rounds: 5,
            max_tokens: 4096,
        }
    }
}

impl From<&Config> for AgentOptions {
    fn from(config: &Config) -> Self {
        Self {
            max_tool_rounds: config.agent.max_tool_rounds,
            max_tokens: config.llm.max_tokens,
        }
    }
}

/// A tool call made during a turn, with its outcome
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub name: String,
    pub input: Value,
    pub result: ToolResult,
}

/// Outcome of one user turn
#[derive(Debug, Clone)]
pub struct AgentReply {
    /// Final assistant text (may be empty if the model only called tools)
    pub text: String,

    /// Every tool call made while producing the reply, in order
    pub tool_invocations: Vec<ToolInvocation>,

    /// Tokens summed over every model call in the turn
    pub usage: TokenUsage,
}

/// A chat session
///
/// The transcript lives only in memory and is gone when the session ends.
pub struct AgentSession {
    llm: Arc<dyn LlmClient>,
    executor: ToolExecutor,
    ctx: ToolContext,
    system_prompt: String,
    options: AgentOptions,
    transcript: Vec<Message>,
}

impl AgentSession {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        executor: ToolExecutor,
        ctx: ToolContext,
        system_prompt: impl Into<String>,
        options: AgentOptions,
    ) -> Self {
        debug!(model = %llm.model(), ?options, "AgentSession::new: called");
        Self {
            llm,
            executor,
            ctx,
            system_prompt: system_prompt.into(),
            options,
            transcript: Vec::new(),
        }
    }

    /// Send a user message and wait for the final reply
    pub async fn send(&mut self, input: &str) -> Result<AgentReply, AgentError> {
        self.turn(input, None).await
    }

    /// Like [`send`](Self::send), forwarding chunks of every model call to `chunk_tx`
    ///
    /// The sender is dropped when the turn ends, which closes the channel.
    pub async fn send_streaming(
        &mut self,
        input: &str,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<AgentReply, AgentError> {
        self.turn(input, Some(chunk_tx)).await
    }

    /// Forget the conversation
    pub fn clear(&mut self) {
        debug!(len = self.transcript.len(), "AgentSession::clear: called");
        self.transcript.clear();
    }

    /// Conversation so far
    pub fn history(&self) -> &[Message] {
        &self.transcript
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.executor.tool_names()
    }

    async fn turn(&mut self, input: &str, chunk_tx: Option<mpsc::Sender<StreamChunk>>) -> Result<AgentReply, AgentError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(AgentError::EmptyInput);
        }
        debug!(input_len = input.len(), streaming = chunk_tx.is_some(), "AgentSession::turn: called");

        let checkpoint = self.transcript.len();
        self.transcript.push(Message::user(input));

        match self.run_tool_loop(chunk_tx.as_ref()).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                warn!(error = %e, "AgentSession::turn: failed, rolling back transcript");
                self.transcript.truncate(checkpoint);
                Err(e)
            }
        }
    }

    async fn run_tool_loop(&mut self, chunk_tx: Option<&mpsc::Sender<StreamChunk>>) -> Result<AgentReply, AgentError> {
        let mut invocations = Vec::new();
        let mut usage = TokenUsage::default();
        let mut rounds = 0u32;

        loop {
            let response = self.call_model(chunk_tx).await?;
            usage.input_tokens += response.usage.input_tokens;
            usage.output_tokens += response.usage.output_tokens;

            if !response.has_tool_calls() {
                let text = response.content.unwrap_or_default();
                if !text.is_empty() {
                    self.transcript.push(Message::assistant(text.clone()));
                }
                info!(rounds, tool_calls = invocations.len(), "Turn complete");
                return Ok(AgentReply {
                    text,
                    tool_invocations: invocations,
                    usage,
                });
            }

            rounds += 1;
            if rounds > self.options.max_tool_rounds {
                return Err(AgentError::TooManyToolRounds(self.options.max_tool_rounds));
            }
            debug!(rounds, count = response.tool_calls.len(), "run_tool_loop: executing tool calls");

            self.transcript
                .push(Message::tool_use(response.content.as_deref(), &response.tool_calls));

            let mut results = Vec::with_capacity(response.tool_calls.len());
            for call in &response.tool_calls {
                let result = self.executor.execute(call, &self.ctx).await;
                results.push(ContentBlock::tool_result(&call.id, &result.content, result.is_error));
                invocations.push(ToolInvocation {
                    name: call.name.clone(),
                    input: call.input.clone(),
                    result,
                });
            }
            self.transcript.push(Message::user_blocks(results));
        }
    }

    async fn call_model(&self, chunk_tx: Option<&mpsc::Sender<StreamChunk>>) -> Result<CompletionResponse, AgentError> {
        let request = CompletionRequest {
            system_prompt: self.system_prompt.clone(),
            messages: self.transcript.clone(),
            tools: self.executor.definitions(),
            max_tokens: self.options.max_tokens,
        };

        let response = match chunk_tx {
            Some(tx) => self.llm.stream(request, tx.clone()).await?,
            None => self.llm.complete(request).await?,
        };
        Ok(response)
    }
}
