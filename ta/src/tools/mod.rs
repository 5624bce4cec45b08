//! Tool system for the chat agent
//!
//! Tools are what the model can do besides talk. Each call gets a
//! `ToolContext` holding the tracker and the target project.

mod context;
mod executor;
mod traits;

pub mod builtin;

pub use context::ToolContext;
pub use executor::ToolExecutor;
pub use traits::{Tool, ToolResult};
