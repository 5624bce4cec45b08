//! Domain error types

use thiserror::Error;

/// Errors raised while validating task fields
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid date format for due_on: {0}")]
    InvalidDueDate(String),

    #[error("Unknown priority: {0}. Use: must, should, could, wont")]
    InvalidPriority(String),

    #[error("Invalid project id: {0}")]
    InvalidProjectId(String),

    #[error("Task name must not be empty")]
    EmptyName,
}
