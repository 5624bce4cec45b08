//! Sequential ticket submission

use tracing::{debug, info, warn};

use crate::asana::{CreatedTask, NewTask, ProjectId, TaskTracker};
use crate::domain::Task;

/// A task the tracker refused
#[derive(Debug, Clone)]
pub struct FailedTask {
    pub task: Task,
    pub error: String,
}

/// Outcome of filing a batch of tasks
#[derive(Debug, Clone, Default)]
pub struct SubmitReport {
    /// Tickets created, in submission order
    pub created: Vec<(Task, CreatedTask)>,

    /// Tasks that failed, in submission order
    pub failed: Vec<FailedTask>,
}

impl SubmitReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.created.len() + self.failed.len()
    }
}

/// File one ticket per task, in order, one request at a time
///
/// A failure is recorded and the remaining tasks are still submitted.
pub async fn submit(tracker: &dyn TaskTracker, project: &ProjectId, tasks: &[Task]) -> SubmitReport {
    debug!(count = tasks.len(), %project, "submit: called");
    let mut report = SubmitReport::default();

    for task in tasks {
        let new_task = NewTask::from_task(task, project.clone());
        match tracker.create_task(&new_task).await {
            Ok(created) => report.created.push((task.clone(), created)),
            Err(e) => {
                warn!(name = %task.name, error = %e, "submit: task failed");
                report.failed.push(FailedTask {
                    task: task.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        created = report.created.len(),
        failed = report.failed.len(),
        "Submitted tasks to {}",
        tracker.service_name()
    );
    report
}
