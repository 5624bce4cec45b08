//! Task record produced by the model

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DomainError, Priority};

/// Due date wire format used by the model and by Asana
pub const DUE_DATE_FORMAT: &str = "%Y-%m-%d";

/// A unit of work generated from a project description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub due_on: NaiveDate,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Task {
    /// Create a task due `today` with default priority
    pub fn new(name: impl Into<String>, today: NaiveDate) -> Result<Self, DomainError> {
        let name = name.into();
        debug!(%name, %today, "Task::new: called");
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::EmptyName);
        }
        Ok(Self {
            name,
            description: String::new(),
            due_on: today,
            priority: Priority::default(),
            category: None,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_due_on(mut self, due_on: NaiveDate) -> Self {
        self.due_on = due_on;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        let category = category.into();
        self.category = if category.trim().is_empty() { None } else { Some(category) };
        self
    }

    /// Ticket body text: priority, optional category, then description
    pub fn notes(&self) -> String {
        let mut notes = format!("Priority: {}", self.priority.label());
        if let Some(category) = &self.category {
            notes.push_str(&format!("\nCategory: {}", category));
        }
        if !self.description.trim().is_empty() {
            notes.push_str("\n\n");
            notes.push_str(self.description.trim());
        }
        notes
    }
}

/// Resolve a due date as supplied by the user or the model
///
/// Missing, empty and `today` resolve to `today`; `tomorrow` adds one day.
/// Anything else must be `YYYY-MM-DD`.
pub fn parse_due_on(input: Option<&str>, today: NaiveDate) -> Result<NaiveDate, DomainError> {
    debug!(?input, %today, "parse_due_on: called");
    let raw = match input.map(str::trim) {
        None | Some("") => {
            debug!("parse_due_on: no date given, using today");
            return Ok(today);
        }
        Some(raw) => raw,
    };

    match raw.to_lowercase().as_str() {
        "today" => Ok(today),
        "tomorrow" => today
            .checked_add_days(Days::new(1))
            .ok_or_else(|| DomainError::InvalidDueDate(raw.to_string())),
        _ => NaiveDate::parse_from_str(raw, DUE_DATE_FORMAT).map_err(|e| {
            debug!(%raw, error = %e, "parse_due_on: unparseable date");
            DomainError::InvalidDueDate(raw.to_string())
        }),
    }
}
