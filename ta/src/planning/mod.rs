//! One-shot planning
//!
//! Turns a free-text project description into tasks with a single model
//! call, then files one ticket per task.

mod planner;
mod report;

pub use planner::{Decomposition, PlannerOptions, TaskPlanner};
pub use report::{FailedTask, SubmitReport, submit};
