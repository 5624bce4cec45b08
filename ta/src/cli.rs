//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::config::Config;

/// TaskAgent - turn project descriptions into Asana tickets
#[derive(Parser)]
#[command(
    name = "ta",
    about = "Chat with an AI project manager that files tasks in Asana",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Model override (beats LLM_MODEL and the config file)
    #[arg(short, long, global = true, help = "LLM model to use")]
    pub model: Option<String>,

    /// Asana project id or URL (beats ASANA_PROJECT_ID and the config file)
    #[arg(short, long, global = true, help = "Asana project id or project URL")]
    pub project: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive chat (the default)
    Chat {
        /// First message to send before prompting
        message: Option<String>,

        /// Print replies in one piece instead of streaming them
        #[arg(long)]
        no_stream: bool,
    },

    /// Break a project description into tasks and file them in one shot
    Plan {
        /// Project description, or "-" to read it from stdin
        #[arg(value_name = "DESCRIPTION")]
        description: String,

        /// Show the tasks without creating tickets
        #[arg(long)]
        dry_run: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Create a single ticket directly, without the LLM
    Create {
        /// Task name
        name: String,

        /// Due date (YYYY-MM-DD, "today" or "tomorrow"; default today)
        #[arg(short, long)]
        due: Option<String>,

        /// Task notes
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Print the resolved configuration
    Config,
}

/// Whether a credential the agent needs is available
pub struct CredentialCheck {
    pub name: String,
    pub present: bool,
}

impl CredentialCheck {
    /// Check a secret held in an environment variable
    pub fn env(name: &str) -> Self {
        let present = std::env::var(name).map(|v| !v.trim().is_empty()).unwrap_or(false);
        debug!(name, present, "CredentialCheck::env: called");
        Self {
            name: name.to_string(),
            present,
        }
    }
}

/// Check the credentials the resolved configuration will ask for
pub fn check_credentials(config: &Config) -> Vec<CredentialCheck> {
    let llm = config.llm.resolve();
    vec![
        CredentialCheck::env(&llm.api_key_env),
        CredentialCheck::env(&config.asana.token_env),
        CredentialCheck {
            name: "ASANA_PROJECT_ID".to_string(),
            present: config.asana.project_id.is_some(),
        },
    ]
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskagent")
        .join("logs")
        .join("taskagent.log")
}

/// Generate the after_help text with credential checks
pub fn generate_after_help(config: &Config) -> String {
    debug!("generate_after_help: called");
    let mut help = String::new();

    help.push_str(&format!("Environment (model {}):\n", config.llm.model));
    for check in check_credentials(config) {
        let icon = if check.present { "\u{2705}" } else { "\u{274C}" };
        let status = if check.present { "set" } else { "not set" };
        help.push_str(&format!("  {} {:<18} {}\n", icon, check.name, status));
    }

    help.push('\n');
    help.push_str(&format!("Logs are written to: {}\n", get_log_path().display()));
    help
}

/// Output format for plan results
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}
