//! create_asana_task tool - turn one model decision into one ticket

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::asana::NewTask;
use crate::domain::parse_due_on;
use crate::tools::{Tool, ToolContext, ToolResult};

/// Creates a task in the configured Asana project
pub struct CreateAsanaTaskTool;

#[async_trait]
impl Tool for CreateAsanaTaskTool {
    fn name(&self) -> &'static str {
        "create_asana_task"
    }

    fn description(&self) -> &'static str {
        "Creates a task in Asana given the name of the task and when it is due."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task_name": {
                    "type": "string",
                    "description": "The name of the task in Asana"
                },
                "due_on": {
                    "type": "string",
                    "description": "The date the task is due in the format YYYY-MM-DD. If not given, the current day is used"
                },
                "notes": {
                    "type": "string",
                    "description": "Optional longer description, priority or context for the task"
                }
            },
            "required": ["task_name"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "CreateAsanaTaskTool::execute: called");
        let name = match input.get("task_name").and_then(|v| v.as_str()).map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => {
                debug!("CreateAsanaTaskTool::execute: missing task_name");
                return ToolResult::error("Missing required parameter: task_name");
            }
        };

        let raw_due = input.get("due_on").and_then(|v| v.as_str());
        let due_on = match parse_due_on(raw_due, ctx.today) {
            Ok(date) => date,
            Err(e) => {
                warn!(due_on = ?raw_due, error = %e, "CreateAsanaTaskTool::execute: rejected due date");
                return ToolResult::error(format!("Invalid date format for due_on: {}", raw_due.unwrap_or_default()));
            }
        };

        let mut task = NewTask::new(name, due_on, ctx.project.clone());
        if let Some(notes) = input.get("notes").and_then(|v| v.as_str()) {
            task = task.with_notes(notes);
        }

        match ctx.tracker.create_task(&task).await {
            Ok(created) => {
                debug!(gid = %created.gid, "CreateAsanaTaskTool::execute: created");
                match serde_json::to_string_pretty(&created) {
                    Ok(json) => ToolResult::success(json),
                    Err(e) => ToolResult::error(format!("Failed to serialize response: {}", e)),
                }
            }
            Err(e) => {
                warn!(error = %e, "CreateAsanaTaskTool::execute: tracker call failed");
                ToolResult::error(format!("API Exception: {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asana::mock::MockTracker;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 24).unwrap()
    }

    fn context(tracker: Arc<MockTracker>) -> ToolContext {
        ToolContext::new(tracker, "1207654321".parse().unwrap(), today())
    }

    #[tokio::test]
    async fn test_creates_task_due_today_by_default() {
        let tracker = Arc::new(MockTracker::new());
        let ctx = context(tracker.clone());

        let result = CreateAsanaTaskTool
            .execute(json!({"task_name": "Write launch post"}), &ctx)
            .await;

        assert!(!result.is_error, "{}", result.content);
        let created: Value = serde_json::from_str(&result.content).unwrap();
        assert_eq!(created["gid"], "gid-1");
        assert!(result.content.contains('\n'), "expected pretty-printed JSON");

        let sent = tracker.created();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].name, "Write launch post");
        assert_eq!(sent[0].due_on, today());
        assert_eq!(sent[0].projects[0].as_str(), "1207654321");
        assert_eq!(sent[0].notes, None);
    }

    #[tokio::test]
    async fn test_explicit_due_date_and_notes() {
        let tracker = Arc::new(MockTracker::new());
        let ctx = context(tracker.clone());

        let result = CreateAsanaTaskTool
            .execute(
                json!({"task_name": "Book venue", "due_on": "2024-07-01", "notes": "Priority: Must have"}),
                &ctx,
            )
            .await;

        assert!(!result.is_error);
        let sent = tracker.created();
        assert_eq!(sent[0].due_on, NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());
        assert_eq!(sent[0].notes.as_deref(), Some("Priority: Must have"));
    }

    #[tokio::test]
    async fn test_literal_today_is_accepted() {
        let tracker = Arc::new(MockTracker::new());
        let ctx = context(tracker.clone());

        let result = CreateAsanaTaskTool
            .execute(json!({"task_name": "Standup", "due_on": "Today"}), &ctx)
            .await;

        assert!(!result.is_error);
        assert_eq!(tracker.created()[0].due_on, today());
    }

    #[tokio::test]
    async fn test_invalid_date_skips_tracker() {
        let tracker = Arc::new(MockTracker::new());
        let ctx = context(tracker.clone());

        let result = CreateAsanaTaskTool
            .execute(json!({"task_name": "Ship", "due_on": "next friday"}), &ctx)
            .await;

        assert!(result.is_error);
        assert_eq!(result.content, "Invalid date format for due_on: next friday");
        assert!(tracker.created().is_empty());
    }

    #[tokio::test]
    async fn test_missing_name_is_error() {
        let tracker = Arc::new(MockTracker::new());
        let ctx = context(tracker.clone());

        let result = CreateAsanaTaskTool.execute(json!({"task_name": "   "}), &ctx).await;
        assert!(result.is_error);
        assert!(result.content.contains("task_name"));

        let result = CreateAsanaTaskTool.execute(json!({}), &ctx).await;
        assert!(result.is_error);
        assert!(tracker.created().is_empty());
    }

    #[tokio::test]
    async fn test_tracker_failure_is_reported() {
        let tracker = Arc::new(MockTracker::failing_on(&["Doomed"]));
        let ctx = context(tracker.clone());

        let result = CreateAsanaTaskTool.execute(json!({"task_name": "Doomed"}), &ctx).await;

        assert!(result.is_error);
        assert!(result.content.starts_with("API Exception: "));
        assert!(result.content.contains("rejected Doomed"));
    }
}
