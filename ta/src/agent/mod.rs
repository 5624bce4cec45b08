//! Chat agent
//!
//! Owns the conversation, calls the model with the registered tools and
//! feeds tool results back until the model answers in plain text.

mod error;
mod session;

pub use error::AgentError;
pub use session::{AgentOptions, AgentReply, AgentSession, ToolInvocation};
