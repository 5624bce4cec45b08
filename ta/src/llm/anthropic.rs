//! Anthropic Messages API client

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest_eventsource::Event;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::debug;

use super::{
    CompletionRequest, CompletionResponse, LlmClient, LlmError, Message, MessageContent, StopReason, StreamChunk,
    TokenUsage, ToolCall, sse,
};
use crate::config::ResolvedLlmConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Claude API client
pub struct AnthropicClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
}

impl AnthropicClient {
    /// Create a new client from resolved configuration
    pub fn from_config(config: &ResolvedLlmConfig) -> Result<Self, LlmError> {
        debug!(model = %config.model, base_url = %config.base_url, "AnthropicClient::from_config: called");
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

    /// Build the request body for the Anthropic API
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(%self.model, %request.max_tokens, "build_request_body: called");
        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens.min(self.max_tokens),
            "system": request.system_prompt,
            "messages": request.messages.iter().map(convert_message).collect::<Vec<_>>(),
        });

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(
                request
                    .tools
                    .iter()
                    .map(|t| t.to_anthropic_schema())
                    .collect::<Vec<_>>()
            );
        }

        body
    }

    fn post(&self, body: &serde_json::Value) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
    }
}

/// Content blocks already match the Messages API shape
fn convert_message(msg: &Message) -> serde_json::Value {
    let content = match &msg.content {
        MessageContent::Text(text) => serde_json::json!(text),
        MessageContent::Blocks(blocks) => serde_json::json!(blocks),
    };
    serde_json::json!({
        "role": msg.role.as_str(),
        "content": content,
    })
}

fn parse_response(api_response: AnthropicResponse) -> CompletionResponse {
    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for block in api_response.content {
        match block {
            AnthropicContentBlock::Text { text: t } => text.push_str(&t),
            AnthropicContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall::new(id, name, input)),
            AnthropicContentBlock::Other => {}
        }
    }

    CompletionResponse {
        content: if text.is_empty() { None } else { Some(text) },
        tool_calls,
        stop_reason: api_response
            .stop_reason
            .as_deref()
            .map(StopReason::from_anthropic)
            .unwrap_or(StopReason::EndTurn),
        usage: TokenUsage {
            input_tokens: api_response.usage.input_tokens,
            output_tokens: api_response.usage.output_tokens,
        },
    }
}

/// Accumulates Messages API stream events
#[derive(Default)]
struct StreamState {
    content: String,
    tool_calls: Vec<ToolCall>,
    // (id, name, partial json)
    current_tool: Option<(String, String, String)>,
    stop_reason: Option<StopReason>,
    usage: TokenUsage,
    done: bool,
}

impl StreamState {
    fn apply(&mut self, data: &serde_json::Value) -> Vec<StreamChunk> {
        let mut out = Vec::new();

        match data["type"].as_str() {
            Some("message_start") => {
                self.usage.input_tokens = data["message"]["usage"]["input_tokens"].as_u64().unwrap_or(0);
            }
            Some("content_block_start") => {
                let block = &data["content_block"];
                if block["type"] == "tool_use" {
                    let id = block["id"].as_str().unwrap_or_default().to_string();
                    let name = block["name"].as_str().unwrap_or_default().to_string();
                    out.push(StreamChunk::ToolUseStart {
                        id: id.clone(),
                        name: name.clone(),
                    });
                    self.current_tool = Some((id, name, String::new()));
                }
            }
            Some("content_block_delta") => {
                let delta = &data["delta"];
                if let Some(text) = delta["text"].as_str() {
                    self.content.push_str(text);
                    out.push(StreamChunk::TextDelta(text.to_string()));
                }
                if let (Some(json), Some((id, _, acc))) = (delta["partial_json"].as_str(), self.current_tool.as_mut()) {
                    acc.push_str(json);
                    out.push(StreamChunk::ToolUseDelta {
                        id: id.clone(),
                        json_delta: json.to_string(),
                    });
                }
            }
            Some("content_block_stop") => {
                if let Some((id, name, json)) = self.current_tool.take() {
                    out.push(StreamChunk::ToolUseEnd { id: id.clone() });
                    self.tool_calls.push(ToolCall::from_raw_arguments(id, name, &json));
                }
            }
            Some("message_delta") => {
                if let Some(reason) = data["delta"]["stop_reason"].as_str() {
                    self.stop_reason = Some(StopReason::from_anthropic(reason));
                }
                if let Some(tokens) = data["usage"]["output_tokens"].as_u64() {
                    self.usage.output_tokens = tokens;
                }
            }
            Some("message_stop") => self.done = true,
            Some("error") => {
                let message = data["error"]["message"].as_str().unwrap_or("unknown stream error");
                out.push(StreamChunk::Error(message.to_string()));
            }
            _ => debug!("StreamState::apply: ignoring event"),
        }

        out
    }

    fn finish(self) -> CompletionResponse {
        let stop_reason = self.stop_reason.unwrap_or(if self.tool_calls.is_empty() {
            StopReason::EndTurn
        } else {
            StopReason::ToolUse
        });
        CompletionResponse {
            content: if self.content.is_empty() { None } else { Some(self.content) },
            tool_calls: self.tool_calls,
            stop_reason,
            usage: self.usage,
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
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

        let api_response: AnthropicResponse = response.json().await?;
        Ok(parse_response(api_response))
    }

    async fn stream(
        &self,
        request: CompletionRequest,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, message_count = request.messages.len(), "stream: called");
        let mut body = self.build_request_body(&request);
        body["stream"] = serde_json::json!(true);

        let mut es = sse::open(self.post(&body))?;
        let mut state = StreamState::default();

        while let Some(event) = es.next().await {
            match event {
                Ok(Event::Open) => debug!("stream: opened"),
                Ok(Event::Message(msg)) => {
                    let data: serde_json::Value = match serde_json::from_str(&msg.data) {
                        Ok(data) => data,
                        Err(e) => return Err(sse::abort(&mut es, &chunk_tx, e.into()).await),
                    };
                    for out in state.apply(&data) {
                        if let StreamChunk::Error(message) = &out {
                            es.close();
                            let _ = chunk_tx.send(out.clone()).await;
                            return Err(LlmError::Stream(message.clone()));
                        }
                        let _ = chunk_tx.send(out).await;
                    }
                    if state.done {
                        break;
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

        let response = state.finish();
        let _ = chunk_tx
            .send(StreamChunk::MessageDone {
                stop_reason: response.stop_reason,
                usage: response.usage,
            })
            .await;
        Ok(response)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// Anthropic API response types

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum AnthropicContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ContentBlock, ToolDefinition};
    use crate::stub_server::{serve, serve_json};

    fn client(max_tokens: u32) -> AnthropicClient {
        AnthropicClient {
            model: "claude-3-5-sonnet-latest".to_string(),
            api_key: "test-key".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            http: Client::new(),
            max_tokens,
        }
    }

    #[test]
    fn test_build_request_body_basic() {
        let request = CompletionRequest {
            system_prompt: "You are helpful".to_string(),
            messages: vec![Message::user("Hello")],
            tools: vec![],
            max_tokens: 1000,
        };

        let body = client(8192).build_request_body(&request);

        assert_eq!(body["model"], "claude-3-5-sonnet-latest");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["system"], "You are helpful");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Hello");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_build_request_body_with_tools_and_blocks() {
        let calls = vec![ToolCall::new("toolu_1", "create_asana_task", serde_json::json!({"task_name": "A"}))];
        let request = CompletionRequest {
            system_prompt: "sys".to_string(),
            messages: vec![
                Message::user("Plan it"),
                Message::tool_use(Some("Creating."), &calls),
                Message::user_blocks(vec![ContentBlock::tool_result("toolu_1", "ok", false)]),
            ],
            tools: vec![ToolDefinition::new(
                "create_asana_task",
                "Creates a task",
                serde_json::json!({"type": "object"}),
            )],
            max_tokens: 5000,
        };

        let body = client(1000).build_request_body(&request);

        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["tools"][0]["name"], "create_asana_task");
        assert_eq!(body["messages"][1]["content"][0]["type"], "text");
        assert_eq!(body["messages"][1]["content"][1]["type"], "tool_use");
        assert_eq!(body["messages"][1]["content"][1]["id"], "toolu_1");
        assert_eq!(body["messages"][2]["content"][0]["type"], "tool_result");
        assert_eq!(body["messages"][2]["content"][0]["tool_use_id"], "toolu_1");
    }

    #[test]
    fn test_parse_response_joins_text_and_collects_tools() {
        let json = r#"{
            "content": [
                {"type": "text", "text": "I'll create "},
                {"type": "text", "text": "that."},
                {"type": "tool_use", "id": "toolu_1", "name": "create_asana_task", "input": {"task_name": "Kickoff"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 40, "output_tokens": 20}
        }"#;

        let response = parse_response(serde_json::from_str(json).unwrap());
        assert_eq!(response.content.as_deref(), Some("I'll create that."));
        assert_eq!(response.stop_reason, StopReason::ToolUse);
        assert_eq!(response.tool_calls[0].input["task_name"], "Kickoff");
        assert_eq!(response.usage.output_tokens, 20);
    }

    #[test]
    fn test_stream_state_assembles_events() {
        let events = [
            serde_json::json!({"type": "message_start", "message": {"usage": {"input_tokens": 25}}}),
            serde_json::json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
            serde_json::json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Sure."}}),
            serde_json::json!({"type": "content_block_stop", "index": 0}),
            serde_json::json!({"type": "content_block_start", "index": 1, "content_block": {"type": "tool_use", "id": "toolu_9", "name": "create_asana_task"}}),
            serde_json::json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "{\"task_name\": "}}),
            serde_json::json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "\"Kickoff\"}"}}),
            serde_json::json!({"type": "content_block_stop", "index": 1}),
            serde_json::json!({"type": "message_delta", "delta": {"stop_reason": "tool_use"}, "usage": {"output_tokens": 17}}),
            serde_json::json!({"type": "message_stop"}),
        ];

        let mut state = StreamState::default();
        let mut emitted = Vec::new();
        for e in &events {
            emitted.extend(state.apply(e));
        }
        assert!(state.done);

        let response = state.finish();
        assert_eq!(emitted[0], StreamChunk::TextDelta("Sure.".to_string()));
        assert!(emitted.contains(&StreamChunk::ToolUseEnd {
            id: "toolu_9".to_string()
        }));
        assert_eq!(response.content.as_deref(), Some("Sure."));
        assert_eq!(response.tool_calls[0].input["task_name"], "Kickoff");
        assert_eq!(response.stop_reason, StopReason::ToolUse);
        assert_eq!(response.usage.input_tokens, 25);
        assert_eq!(response.usage.output_tokens, 17);
    }

    #[test]
    fn test_stream_state_surfaces_error_event() {
        let mut state = StreamState::default();
        let out = state.apply(&serde_json::json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}));
        assert_eq!(out, vec![StreamChunk::Error("Overloaded".to_string())]);
    }

    fn stub_client(base_url: &str) -> AnthropicClient {
        AnthropicClient {
            base_url: base_url.to_string(),
            http: Client::builder().no_proxy().build().unwrap(),
            ..client(4096)
        }
    }

    fn hello() -> CompletionRequest {
        CompletionRequest {
            system_prompt: "You are helpful".to_string(),
            messages: vec![Message::user("Hello")],
            tools: vec![],
            max_tokens: 256,
        }
    }

    #[tokio::test]
    async fn test_complete_over_http() {
        let (base_url, server) = serve_json(
            200,
            r#"{"content": [{"type": "text", "text": "Hi there"}], "stop_reason": "end_turn",
                "usage": {"input_tokens": 9, "output_tokens": 3}}"#,
        )
        .await;

        let response = stub_client(&base_url).complete(hello()).await.unwrap();
        assert_eq!(response.content.as_deref(), Some("Hi there"));
        assert_eq!(response.stop_reason, StopReason::EndTurn);

        let sent = server.await.unwrap();
        assert_eq!(sent.request_line, "POST /v1/messages HTTP/1.1");
        assert_eq!(sent.header("x-api-key"), Some("test-key"));
        assert_eq!(sent.header("anthropic-version"), Some(ANTHROPIC_VERSION));
        let body = sent.json();
        assert_eq!(body["system"], "You are helpful");
        assert_eq!(body["max_tokens"], 256);
    }

    #[tokio::test]
    async fn test_complete_maps_error_status() {
        let (base_url, server) =
            serve_json(529, r#"{"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}"#).await;

        let err = stub_client(&base_url).complete(hello()).await.unwrap_err();
        assert!(matches!(err, LlmError::ApiError { status: 529, ref message } if message.contains("Overloaded")));
        assert!(!err.is_auth_error());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_stream_malformed_event_notifies_listener() {
        let (base_url, server) = serve(200, "text/event-stream", "event: message_start\ndata: {not json\n\n").await;
        let (tx, mut rx) = mpsc::channel(16);

        let result = stub_client(&base_url).stream(hello(), tx).await;
        assert!(matches!(result, Err(LlmError::Json(_))));
        assert!(matches!(rx.recv().await, Some(StreamChunk::Error(_))));
        server.await.unwrap();
    }
}
