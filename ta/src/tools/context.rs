//! ToolContext - execution context for tools

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use crate::asana::{ProjectId, TaskTracker};

/// What a tool call may touch: one tracker, one project, one "today"
#[derive(Clone)]
pub struct ToolContext {
    /// Ticket backend
    pub tracker: Arc<dyn TaskTracker>,

    /// Project every created task is attached to
    pub project: ProjectId,

    /// Date used when a due date is omitted
    pub today: NaiveDate,
}

impl ToolContext {
    pub fn new(tracker: Arc<dyn TaskTracker>, project: ProjectId, today: NaiveDate) -> Self {
        debug!(%project, %today, "ToolContext::new: called");
        Self { tracker, project, today }
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("tracker", &self.tracker.service_name())
            .field("project", &self.project)
            .field("today", &self.today)
            .finish()
    }
}
