//! Prompt templates
//!
//! `.pmt` files rendered with Handlebars. Loading chain:
//! 1. `{prompts-dir}/{name}.pmt` when `agent.prompts-dir` is configured
//! 2. Embedded default compiled into the binary

pub mod embedded;
mod loader;

pub use loader::{PromptContext, PromptLoader};
