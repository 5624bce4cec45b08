//! OpenAI Chat Completions client
//!
//! Tool results are sent as one `tool` message per call; the system prompt
//! travels as the first message.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest_eventsource::Event;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::debug;

use super::{
    CompletionRequest, CompletionResponse, ContentBlock, LlmClient, LlmError, Message, MessageContent, StopReason,
    StreamChunk, TokenUsage, ToolCall, sse,
};
use crate::config::ResolvedLlmConfig;

/// OpenAI API client
pub struct OpenAIClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
}

impl OpenAIClient {
    /// Create a new client from resolved configuration
    pub fn from_config(config: &ResolvedLlmConfig) -> Result<Self, LlmError> {
        debug!(model = %config.model, base_url = %config.base_url, "OpenAIClient::from_config: called");
        let api_key = config
            .get_api_key()
            .map_err(|_| LlmError::MissingApiKey(config.api_key_env.clone()))?;

        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.clone(),
            http,
            max_tokens: config.max_tokens,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    /// Reasoning-series models take `max_completion_tokens`
    fn uses_completion_tokens(&self) -> bool {
        ["gpt-5", "o1", "o3", "o4"].iter().any(|p| self.model.starts_with(p))
    }

    /// Build the request body for the OpenAI API
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(%self.model, %request.max_tokens, "build_request_body: called");
        let mut messages = vec![serde_json::json!({
            "role": "system",
            "content": request.system_prompt,
        })];
        messages.extend(convert_messages(&request.messages));

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });

        let limit_key = if self.uses_completion_tokens() {
            "max_completion_tokens"
        } else {
            "max_tokens"
        };
        body[limit_key] = serde_json::json!(request.max_tokens.min(self.max_tokens));

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(request.tools.iter().map(|t| t.to_openai_schema()).collect::<Vec<_>>());
        }

        body
    }

    fn post(&self, body: &serde_json::Value) -> reqwest::RequestBuilder {
        self.http.post(self.endpoint()).bearer_auth(&self.api_key).json(body)
    }
}

/// Convert conversation messages to Chat Completions messages
fn convert_messages(messages: &[Message]) -> Vec<serde_json::Value> {
    let mut result = Vec::with_capacity(messages.len());

    for msg in messages {
        let blocks = match &msg.content {
            MessageContent::Text(text) => {
                result.push(serde_json::json!({ "role": msg.role.as_str(), "content": text }));
                continue;
            }
            MessageContent::Blocks(blocks) => blocks,
        };

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for block in blocks {
            match block {
                ContentBlock::Text { text: t } => text.push_str(t),
                ContentBlock::ToolUse { id, name, input } => tool_calls.push(serde_json::json!({
                    "id": id,
                    "type": "function",
                    "function": { "name": name, "arguments": input.to_string() },
                })),
                ContentBlock::ToolResult {
                    tool_use_id, content, ..
                } => result.push(serde_json::json!({
                    "role": "tool",
                    "tool_call_id": tool_use_id,
                    "content": content,
                })),
            }
        }

        if !tool_calls.is_empty() {
            let mut m = serde_json::json!({ "role": "assistant", "tool_calls": tool_calls });
            m["content"] = if text.is_empty() {
                serde_json::Value::Null
            } else {
                serde_json::json!(text)
            };
            result.push(m);
        } else if !text.is_empty() {
            result.push(serde_json::json!({ "role": msg.role.as_str(), "content": text }));
        }
    }

    result
}

fn parse_response(api_response: OpenAIResponse) -> Result<CompletionResponse, LlmError> {
    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::InvalidResponse("response has no choices".to_string()))?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| ToolCall::from_raw_arguments(tc.id, tc.function.name, &tc.function.arguments))
        .collect();

    Ok(CompletionResponse {
        content: choice.message.content.filter(|c| !c.is_empty()),
        tool_calls,
        stop_reason: choice
            .finish_reason
            .as_deref()
            .map(StopReason::from_openai)
            .unwrap_or(StopReason::EndTurn),
        usage: api_response.usage.map(TokenUsage::from).unwrap_or_default(),
    })
}

/// Accumulates streamed deltas into a complete response
#[derive(Default)]
struct StreamState {
    content: String,
    // index -> (id, name, arguments)
    calls: BTreeMap<usize, (String, String, String)>,
    stop_reason: Option<StopReason>,
    usage: TokenUsage,
}

impl StreamState {
    fn apply(&mut self, chunk: OpenAIStreamChunk) -> Vec<StreamChunk> {
        let mut out = Vec::new();

        if let Some(usage) = chunk.usage {
            self.usage = usage.into();
        }

        for choice in chunk.choices {
            if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                self.content.push_str(&text);
                out.push(StreamChunk::TextDelta(text));
            }

            for tc in choice.delta.tool_calls.unwrap_or_default() {
                let entry = self.calls.entry(tc.index).or_default();
                if let Some(id) = tc.id {
                    entry.0 = id;
                }
                let Some(function) = tc.function else { continue };
                if let Some(name) = function.name {
                    entry.1 = name.clone();
                    out.push(StreamChunk::ToolUseStart {
                        id: entry.0.clone(),
                        name,
                    });
                }
                if let Some(args) = function.arguments.filter(|a| !a.is_empty()) {
                    entry.2.push_str(&args);
                    out.push(StreamChunk::ToolUseDelta {
                        id: entry.0.clone(),
                        json_delta: args,
                    });
                }
            }

            if let Some(reason) = choice.finish_reason {
                self.stop_reason = Some(StopReason::from_openai(&reason));
            }
        }

        out
    }

    fn finish(self) -> (CompletionResponse, Vec<StreamChunk>) {
        let mut out = Vec::new();
        let tool_calls: Vec<ToolCall> = self
            .calls
            .into_values()
            .map(|(id, name, args)| {
                out.push(StreamChunk::ToolUseEnd { id: id.clone() });
                ToolCall::from_raw_arguments(id, name, &args)
            })
            .collect();

        let stop_reason = self.stop_reason.unwrap_or(if tool_calls.is_empty() {
            StopReason::EndTurn
        } else {
            StopReason::ToolUse
        });
        out.push(StreamChunk::MessageDone {
            stop_reason,
            usage: self.usage,
        });

        let response = CompletionResponse {
            content: if self.content.is_empty() { None } else { Some(self.content) },
            tool_calls,
            stop_reason,
            usage: self.usage,
        };
        (response, out)
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, message_count = request.messages.len(), "complete: called");
        let body = self.build_request_body(&request);
        let response = self.post(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            debug!(%status, "complete: API error");
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let api_response: OpenAIResponse = response.json().await?;
        parse_response(api_response)
    }

    async fn stream(
        &self,
        request: CompletionRequest,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, message_count = request.messages.len(), "stream: called");
        let mut body = self.build_request_body(&request);
        body["stream"] = serde_json::json!(true);
        body["stream_options"] = serde_json::json!({ "include_usage": true });

        let mut es = sse::open(self.post(&body))?;
        let mut state = StreamState::default();

        while let Some(event) = es.next().await {
            match event {
                Ok(Event::Open) => debug!("stream: opened"),
                Ok(Event::Message(msg)) => {
                    if msg.data.trim() == "[DONE]" {
                        break;
                    }
                    let chunk: OpenAIStreamChunk = match serde_json::from_str(&msg.data) {
                        Ok(chunk) => chunk,
                        Err(e) => return Err(sse::abort(&mut es, &chunk_tx, e.into()).await),
                    };
                    for out in state.apply(chunk) {
                        let _ = chunk_tx.send(out).await;
                    }
                }
                Err(e) => {
                    if let Some(err) = sse::map_error(e).await {
                        return Err(sse::abort(&mut es, &chunk_tx, err).await);
                    }
                    break;
                }
            }
        }
        es.close();

        let (response, tail) = state.finish();
        for out in tail {
            let _ = chunk_tx.send(out).await;
        }
        Ok(response)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// OpenAI API response types

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCall {
    id: String,
    function: OpenAIFunction,
}

#[derive(Debug, Deserialize)]
struct OpenAIFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

impl From<OpenAIUsage> for TokenUsage {
    fn from(u: OpenAIUsage) -> Self {
        TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        }
    }
}

// Streaming types

#[derive(Debug, Deserialize)]
struct OpenAIStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChoice {
    delta: OpenAIStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIStreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamToolCall {
    index: usize,
    id: Option<String>,
    function: Option<OpenAIStreamFunction>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}
