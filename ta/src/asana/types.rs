//! Asana request/response bodies

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::domain::{DomainError, Task};

static PROJECT_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/project/(\d+)").expect("static regex is valid"));

static LEGACY_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://[^/]+/0/(\d+)").expect("static regex is valid"));

static ANY_NUMERIC_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d{2,})(?:/|$|\?|#)").expect("static regex is valid"));

/// Numeric Asana project gid
///
/// Accepts a bare id or a project URL copied from the browser:
/// `https://app.asana.com/0/1207654321/list` or
/// `https://app.asana.com/1/1111/project/1207654321/board`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl<'de> Deserialize<'de> for ProjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // YAML writes bare ids as integers
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(u64),
            Str(String),
        }

        let raw = match Raw::deserialize(deserializer)? {
            Raw::Num(n) => n.to_string(),
            Raw::Str(s) => s,
        };
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl ProjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ProjectId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "ProjectId::from_str: called");
        let s = s.trim();
        if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
            return Ok(Self(s.to_string()));
        }

        let found = [&*PROJECT_SEGMENT, &*LEGACY_SEGMENT, &*ANY_NUMERIC_SEGMENT]
            .iter()
            .find_map(|re| re.captures(s).map(|c| c[1].to_string()));

        match found {
            Some(id) => {
                debug!(%id, "ProjectId::from_str: extracted from url");
                Ok(Self(id))
            }
            None => Err(DomainError::InvalidProjectId(s.to_string())),
        }
    }
}

/// Body of `POST /tasks`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTask {
    pub name: String,
    pub due_on: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub projects: Vec<ProjectId>,
}

impl NewTask {
    pub fn new(name: impl Into<String>, due_on: NaiveDate, project: ProjectId) -> Self {
        Self {
            name: name.into(),
            due_on,
            notes: None,
            projects: vec![project],
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        let notes = notes.into();
        self.notes = if notes.trim().is_empty() { None } else { Some(notes) };
        self
    }

    /// Build the ticket for a generated task
    pub fn from_task(task: &Task, project: ProjectId) -> Self {
        Self::new(task.name.clone(), task.due_on, project).with_notes(task.notes())
    }

    /// Wrap in the `{"data": ...}` envelope Asana expects
    pub fn to_body(&self) -> serde_json::Value {
        serde_json::json!({ "data": self })
    }
}

/// Task as returned by Asana after creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedTask {
    pub gid: String,
    pub name: String,
    #[serde(default)]
    pub due_on: Option<String>,
    #[serde(default)]
    pub permalink_url: Option<String>,
}

/// `{"data": ...}` response envelope
#[derive(Debug, Deserialize)]
pub(crate) struct DataEnvelope<T> {
    pub data: T,
}

/// `{"errors": [{"message": ...}]}` error envelope
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    pub message: String,
}
