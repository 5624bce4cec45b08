//! Built-in tools

mod create_task;

pub use create_task::CreateAsanaTaskTool;
