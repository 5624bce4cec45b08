//! TaskAgent - a vertical AI agent for project management
//!
//! Describe a project in plain language; the agent breaks it into tasks
//! with MoSCoW priorities and due dates and files one Asana ticket per
//! task.
//!
//! # Modules
//!
//! - [`llm`] - LLM client trait with OpenAI and Anthropic implementations
//! - [`asana`] - `TaskTracker` trait and the Asana REST client
//! - [`tools`] - Tools the model can call, starting with `create_asana_task`
//! - [`agent`] - Chat session with bounded tool rounds
//! - [`planning`] - One-shot decomposition and batch submission
//! - [`repl`] - Interactive terminal loop
//! - [`prompts`] - Handlebars prompt templates
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod agent;
pub mod asana;
pub mod cli;
pub mod config;
pub mod domain;
pub mod llm;
pub mod planning;
pub mod prompts;
pub mod repl;
pub mod tools;

#[cfg(test)]
pub(crate) mod stub_server;

// Re-export commonly used types
pub use agent::{AgentError, AgentOptions, AgentReply, AgentSession};
pub use asana::{AsanaClient, CreatedTask, NewTask, ProjectId, TaskTracker, TrackerError};
pub use config::{Config, LlmConfig};
pub use domain::{DomainError, Priority, Task, parse_due_on};
pub use llm::{AnthropicClient, CompletionRequest, CompletionResponse, LlmClient, LlmError, OpenAIClient, create_client};
pub use planning::{Decomposition, SubmitReport, TaskPlanner, submit};
pub use prompts::{PromptContext, PromptLoader};
pub use tools::{Tool, ToolContext, ToolExecutor, ToolResult};
