//! TaskPlanner - LLM-driven decomposition of a project description into tasks

use std::sync::{Arc, LazyLock};

use chrono::NaiveDate;
use eyre::{Context, Result, bail};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::domain::{Priority, Task, parse_due_on};
use crate::llm::{CompletionRequest, CompletionResponse, LlmClient, Message, ToolDefinition};

const SUBMIT_TOOL: &str = "submit_tasks";

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("static regex is valid"));

/// Planner limits
#[derive(Debug, Clone, Copy)]
pub struct PlannerOptions {
    pub max_tokens: u32,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self { max_tokens: 4096 }
    }
}

/// Tasks extracted from one model call
#[derive(Debug, Clone)]
pub struct Decomposition {
    pub tasks: Vec<Task>,

    /// Problems that were repaired rather than rejected
    pub warnings: Vec<String>,
}

/// Task as the model writes it
#[derive(Debug, Deserialize)]
struct TaskOutput {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    due_on: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DecompositionOutput {
    tasks: Vec<TaskOutput>,
}

/// Breaks a project description into tasks with a single model call
pub struct TaskPlanner {
    llm: Arc<dyn LlmClient>,
    prompt: String,
    options: PlannerOptions,
}

impl TaskPlanner {
    /// `prompt` is the rendered decomposition prompt
    pub fn new(llm: Arc<dyn LlmClient>, prompt: impl Into<String>, options: PlannerOptions) -> Self {
        Self {
            llm,
            prompt: prompt.into(),
            options,
        }
    }

    /// Ask the model for tasks and validate them
    pub async fn decompose(&self, description: &str, today: NaiveDate) -> Result<Decomposition> {
        let description = description.trim();
        if description.is_empty() {
            bail!("Project description is empty");
        }
        info!(model = %self.llm.model(), "Decomposing project description into tasks");

        let request = CompletionRequest {
            system_prompt: self.prompt.clone(),
            messages: vec![Message::user(format!(
                "Break this project down into tasks:\n\n{}",
                description
            ))],
            tools: vec![submit_tool()],
            max_tokens: self.options.max_tokens,
        };

        let response = self
            .llm
            .complete(request)
            .await
            .context("Failed to get LLM response for decomposition")?;

        let output = parse_response(&response)?;
        let decomposition = build_tasks(output, today);
        if decomposition.tasks.is_empty() {
            bail!("Decomposition produced zero tasks");
        }

        info!(
            tasks = decomposition.tasks.len(),
            warnings = decomposition.warnings.len(),
            "Decomposition complete"
        );
        Ok(decomposition)
    }
}

fn submit_tool() -> ToolDefinition {
    ToolDefinition::new(
        SUBMIT_TOOL,
        "Submit the project breakdown. Call this once with every task.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "tasks": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {
                                "type": "string",
                                "description": "Short imperative task title"
                            },
                            "description": {
                                "type": "string",
                                "description": "What done looks like"
                            },
                            "priority": {
                                "type": "string",
                                "enum": ["must", "should", "could", "wont"],
                                "description": "MoSCoW priority"
                            },
                            "due_on": {
                                "type": "string",
                                "description": "Due date in YYYY-MM-DD format"
                            },
                            "category": {
                                "type": "string",
                                "description": "Short label grouping related tasks"
                            }
                        },
                        "required": ["name", "description", "priority", "due_on"]
                    }
                }
            },
            "required": ["tasks"]
        }),
    )
}

/// Prefer the tool call; fall back to JSON in the text
fn parse_response(response: &CompletionResponse) -> Result<DecompositionOutput> {
    if let Some(call) = response.tool_calls.iter().find(|c| c.name == SUBMIT_TOOL) {
        debug!("parse_response: using submit_tasks tool call");
        return serde_json::from_value(call.input.clone()).context("Failed to parse tasks from submit_tasks call");
    }

    if let Some(content) = response.content.as_deref()
        && let Some(output) = parse_text(content)
    {
        debug!("parse_response: using JSON from text content");
        return Ok(output);
    }

    bail!("LLM did not produce a task list")
}

/// Accepts `{"tasks": [...]}` or a bare array, optionally inside a ```json fence
fn parse_text(content: &str) -> Option<DecompositionOutput> {
    let candidates = FENCED_BLOCK
        .captures_iter(content)
        .map(|c| c[1].trim().to_string())
        .chain(std::iter::once(content.trim().to_string()));

    for candidate in candidates {
        if let Ok(output) = serde_json::from_str::<DecompositionOutput>(&candidate) {
            return Some(output);
        }
        if let Ok(tasks) = serde_json::from_str::<Vec<TaskOutput>>(&candidate) {
            return Some(DecompositionOutput { tasks });
        }
    }
    None
}

fn build_tasks(output: DecompositionOutput, today: NaiveDate) -> Decomposition {
    let mut tasks = Vec::with_capacity(output.tasks.len());
    let mut warnings = Vec::new();

    for (idx, out) in output.tasks.into_iter().enumerate() {
        let mut task = match Task::new(&out.name, today) {
            Ok(task) => task,
            Err(_) => {
                warnings.push(format!("Task {} has no name, skipped", idx + 1));
                continue;
            }
        };

        task = task.with_description(out.description.trim());

        match parse_due_on(out.due_on.as_deref(), today) {
            Ok(due_on) => task = task.with_due_on(due_on),
            Err(e) => {
                warn!(name = %task.name, error = %e, "build_tasks: bad due date, using today");
                warnings.push(format!("Task '{}': {}, using {}", task.name, e, today));
            }
        }

        if let Some(raw) = out.priority.as_deref().filter(|p| !p.trim().is_empty()) {
            match raw.parse::<Priority>() {
                Ok(priority) => task = task.with_priority(priority),
                Err(e) => warnings.push(format!("Task '{}': {}, using {}", task.name, e, Priority::default())),
            }
        }

        if let Some(category) = out.category {
            task = task.with_category(category.trim());
        }

        tasks.push(task);
    }

    Decomposition { tasks, warnings }
}
