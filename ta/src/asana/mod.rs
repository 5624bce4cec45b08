//! Asana integration
//!
//! Only task creation is needed: every generated task becomes exactly one
//! `POST /tasks` against a single project.

mod client;
mod error;
mod types;

pub use client::{AsanaClient, TaskTracker};
pub use error::TrackerError;
pub use types::{CreatedTask, NewTask, ProjectId};

#[cfg(test)]
pub use client::mock;
