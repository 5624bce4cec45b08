//! TaskAgent - AI project manager for Asana
//!
//! CLI entry point: interactive chat, one-shot planning and direct ticket
//! creation.

use std::fs;
use std::io::Read;
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{CommandFactory, FromArgMatches};
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use taskagent::asana::{AsanaClient, NewTask, ProjectId, TaskTracker};
use taskagent::cli::{Cli, Command, OutputFormat, generate_after_help, get_log_path};
use taskagent::config::Config;
use taskagent::domain::{Task, parse_due_on};
use taskagent::llm::create_client;
use taskagent::planning::{Decomposition, PlannerOptions, SubmitReport, TaskPlanner, submit};
use taskagent::prompts::{PromptContext, PromptLoader};
use taskagent::repl;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level).map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Existing environment variables win over .env
    let dotenv = dotenvy::dotenv().ok();

    let cmd = Cli::command().after_help(generate_after_help(&help_config()));
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;
    if let Some(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.apply_env()?;
    apply_cli_overrides(&mut config, &cli)?;
    info!(model = %config.llm.model, "TaskAgent loaded config");

    let today = chrono::Local::now().date_naive();

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        None => repl::run_interactive(&config, None, today).await,
        Some(Command::Chat { message, no_stream }) => {
            if no_stream {
                config.agent.stream = false;
            }
            repl::run_interactive(&config, message, today).await
        }
        Some(Command::Plan {
            description,
            dry_run,
            format,
        }) => cmd_plan(&config, &description, dry_run, format, today).await,
        Some(Command::Create { name, due, notes }) => cmd_create(&config, &name, due.as_deref(), notes, today).await,
        Some(Command::Config) => {
            print!("{}", config.to_yaml()?);
            Ok(())
        }
    }
}

/// Best-effort config for the help text, honouring an explicit --config
fn help_config() -> Config {
    let args: Vec<String> = std::env::args().collect();
    let path = args
        .windows(2)
        .find(|w| w[0] == "-c" || w[0] == "--config")
        .map(|w| PathBuf::from(&w[1]))
        .or_else(|| args.iter().find_map(|a| a.strip_prefix("--config=").map(PathBuf::from)));

    let mut config = Config::load(path.as_ref()).unwrap_or_default();
    let _ = config.apply_env();
    config
}

fn apply_cli_overrides(config: &mut Config, cli: &Cli) -> Result<()> {
    if let Some(model) = &cli.model {
        config.llm.model = model.clone();
    }
    if let Some(project) = &cli.project {
        let project: ProjectId = project.parse().context("--project is not a valid Asana project id or URL")?;
        config.asana.project_id = Some(project);
    }
    Ok(())
}

/// One-shot decomposition, then one ticket per task
async fn cmd_plan(
    config: &Config,
    description: &str,
    dry_run: bool,
    format: OutputFormat,
    today: NaiveDate,
) -> Result<()> {
    debug!(dry_run, %format, "cmd_plan: called");
    if !dry_run {
        config.validate()?;
    }

    let description = read_description(description)?;
    let llm = create_client(&config.llm).context("Failed to create LLM client")?;

    let prompts = PromptLoader::new(config.agent.prompts_dir.as_ref());
    let prompt = prompts.decompose_prompt(&PromptContext::new(today, &config.agent.company, "Asana"))?;
    let planner = TaskPlanner::new(
        llm,
        prompt,
        PlannerOptions {
            max_tokens: config.llm.max_tokens,
        },
    );

    let decomposition = planner.decompose(&description, today).await?;

    if dry_run {
        match format {
            OutputFormat::Text => print_tasks(&decomposition),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&decomposition.tasks)?),
        }
        return Ok(());
    }

    let project = config
        .asana
        .project_id
        .clone()
        .ok_or_else(|| eyre::eyre!("Asana project id not set"))?;
    let tracker = AsanaClient::from_config(&config.asana).context("Failed to create Asana client")?;
    let report = submit(&tracker, &project, &decomposition.tasks).await;

    match format {
        OutputFormat::Text => {
            print_tasks(&decomposition);
            print_report(&report);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report_json(&report))?),
    }

    if report.is_success() {
        Ok(())
    } else {
        Err(eyre::eyre!(
            "{} of {} tasks could not be created",
            report.failed.len(),
            report.total()
        ))
    }
}

/// Create one ticket without the LLM
async fn cmd_create(
    config: &Config,
    name: &str,
    due: Option<&str>,
    notes: Option<String>,
    today: NaiveDate,
) -> Result<()> {
    debug!(%name, ?due, "cmd_create: called");
    config.validate_tracker()?;

    let task = Task::new(name, today)?;
    let due_on = parse_due_on(due, today)?;
    let project = config
        .asana
        .project_id
        .clone()
        .ok_or_else(|| eyre::eyre!("Asana project id not set"))?;

    let mut new_task = NewTask::new(task.name, due_on, project);
    if let Some(notes) = notes {
        new_task = new_task.with_notes(notes);
    }

    let tracker = AsanaClient::from_config(&config.asana).context("Failed to create Asana client")?;
    let created = match tracker.create_task(&new_task).await {
        Ok(created) => created,
        Err(e) if e.is_unauthorized() => {
            return Err(eyre::Report::new(e).wrap_err(format!(
                "Asana rejected the access token. Check {}",
                config.asana.token_env
            )));
        }
        Err(e) => return Err(eyre::Report::new(e).wrap_err("Failed to create Asana task")),
    };

    println!("{}", serde_json::to_string_pretty(&created)?);
    Ok(())
}

fn read_description(arg: &str) -> Result<String> {
    if arg != "-" {
        return Ok(arg.to_string());
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read description from stdin")?;
    Ok(buf)
}

fn print_tasks(decomposition: &Decomposition) {
    println!("{}", "Tasks:".bright_cyan());
    for (i, task) in decomposition.tasks.iter().enumerate() {
        let category = task.category.as_deref().map(|c| format!(" [{}]", c)).unwrap_or_default();
        println!(
            "  {:>2}. {:<6} {} {}{}",
            i + 1,
            task.priority.to_string().yellow(),
            task.due_on,
            task.name.bold(),
            category.dimmed()
        );
        if !task.description.is_empty() {
            println!("      {}", task.description.dimmed());
        }
    }
    for warning in &decomposition.warnings {
        println!("{} {}", "warning:".yellow(), warning);
    }
}

fn print_report(report: &SubmitReport) {
    println!();
    for (task, created) in &report.created {
        let url = created.permalink_url.as_deref().unwrap_or("");
        println!("{} {} {}", "✓".green(), task.name, url.dimmed());
    }
    for failed in &report.failed {
        println!("{} {}: {}", "✗".red(), failed.task.name, failed.error);
    }
    println!(
        "Created {} of {} tasks",
        report.created.len().to_string().bold(),
        report.total()
    );
}

fn report_json(report: &SubmitReport) -> serde_json::Value {
    serde_json::json!({
        "created": report.created.iter().map(|(task, created)| serde_json::json!({
            "task": task,
            "ticket": created,
        })).collect::<Vec<_>>(),
        "failed": report.failed.iter().map(|f| serde_json::json!({
            "task": f.task,
            "error": f.error,
        })).collect::<Vec<_>>(),
    })
}

