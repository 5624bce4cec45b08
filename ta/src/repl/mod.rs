//! Interactive chat loop
//!
//! Line editing via rustyline, model output streamed to the terminal,
//! slash commands for housekeeping.

mod session;

pub use session::ReplSession;

use std::sync::Arc;

use chrono::NaiveDate;
use eyre::{Context, Result};
use tracing::debug;

use crate::agent::{AgentOptions, AgentSession};
use crate::asana::{AsanaClient, TaskTracker};
use crate::config::Config;
use crate::llm;
use crate::prompts::{PromptContext, PromptLoader};
use crate::tools::{ToolContext, ToolExecutor};

/// Run the interactive chat
///
/// This is the entry point for `ta` and `ta chat`.
pub async fn run_interactive(config: &Config, initial_message: Option<String>, today: NaiveDate) -> Result<()> {
    debug!(has_initial = initial_message.is_some(), %today, "run_interactive: called");
    config.validate()?;

    let llm = llm::create_client(&config.llm).context("Failed to create LLM client")?;
    let tracker: Arc<dyn TaskTracker> =
        Arc::new(AsanaClient::from_config(&config.asana).context("Failed to create Asana client")?);
    let project = config
        .asana
        .project_id
        .clone()
        .ok_or_else(|| eyre::eyre!("Asana project id not set"))?;

    let prompts = PromptLoader::new(config.agent.prompts_dir.as_ref());
    let system_prompt = prompts.system_prompt(&PromptContext::new(
        today,
        &config.agent.company,
        tracker.service_name(),
    ))?;

    let ctx = ToolContext::new(tracker, project.clone(), today);
    let agent = AgentSession::new(
        llm,
        ToolExecutor::standard(),
        ctx,
        system_prompt,
        AgentOptions::from(config),
    );

    let mut session = ReplSession::new(agent, project, config.agent.stream);
    session.run(initial_message).await
}
