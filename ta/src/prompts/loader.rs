//! Prompt Loader
//!
//! Loads prompt templates from an override directory or falls back to
//! embedded defaults.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::{debug, info};

use super::embedded;
use crate::domain::DUE_DATE_FORMAT;

/// Variables available to every template
#[derive(Debug, Clone, Serialize)]
pub struct PromptContext {
    /// Current date as YYYY-MM-DD
    pub today: String,

    /// Company name for the persona
    pub company: String,

    /// Ticket service name
    pub tracker: String,
}

impl PromptContext {
    pub fn new(today: NaiveDate, company: impl Into<String>, tracker: impl Into<String>) -> Self {
        Self {
            today: today.format(DUE_DATE_FORMAT).to_string(),
            company: company.into(),
            tracker: tracker.into(),
        }
    }
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    hbs: Handlebars<'static>,
    override_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader that checks `dir` before the embedded defaults
    pub fn new(dir: Option<impl AsRef<Path>>) -> Self {
        let override_dir = dir.map(|d| d.as_ref().to_path_buf());
        debug!(?override_dir, "PromptLoader::new: called");
        Self {
            hbs: engine(),
            override_dir,
        }
    }

    /// Create a loader that only uses embedded prompts
    pub fn embedded_only() -> Self {
        debug!("PromptLoader::embedded_only: called");
        Self {
            hbs: engine(),
            override_dir: None,
        }
    }

    fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "PromptLoader::load_template: called");
        if let Some(dir) = &self.override_dir {
            let path = dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found override");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read prompt {}: {}", path.display(), e));
            }
        }

        embedded::get_embedded(name)
            .map(str::to_string)
            .ok_or_else(|| eyre!("Prompt template not found: {}", name))
    }

    /// Render a template with the given context
    pub fn render(&self, template_name: &str, context: &PromptContext) -> Result<String> {
        let template = self.load_template(template_name)?;
        info!(template = %template_name, today = %context.today, "Rendering prompt");
        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", template_name, e))
    }

    /// System prompt for the chat agent
    pub fn system_prompt(&self, context: &PromptContext) -> Result<String> {
        self.render("system", context)
    }

    /// Prompt for one-shot decomposition
    pub fn decompose_prompt(&self, context: &PromptContext) -> Result<String> {
        self.render("decompose", context)
    }
}

// Prompts are plain text, not HTML
fn engine() -> Handlebars<'static> {
    let mut hbs = Handlebars::new();
    hbs.register_escape_fn(handlebars::no_escape);
    hbs
}
