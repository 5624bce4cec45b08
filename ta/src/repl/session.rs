//! REPL session management

use std::io::{self, Write};

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::agent::{AgentError, AgentReply, AgentSession};
use crate::asana::ProjectId;
use crate::llm::{Role, StreamChunk};

const PROMPT: &str = "Chat with AI (type 'q' to quit): ";

/// Interactive chat session on top of an [`AgentSession`]
pub struct ReplSession {
    agent: AgentSession,
    project: ProjectId,
    stream: bool,
}

/// Result of handling a slash command
#[derive(Debug, PartialEq, Eq)]
enum SlashResult {
    Continue,
    Quit,
}

impl ReplSession {
    pub fn new(agent: AgentSession, project: ProjectId, stream: bool) -> Self {
        Self { agent, project, stream }
    }

    /// Run the REPL main loop
    pub async fn run(&mut self, initial_message: Option<String>) -> Result<()> {
        self.print_welcome();

        if let Some(message) = initial_message {
            println!("{}{}", PROMPT.bright_green(), message);
            if is_quit(message.trim()) {
                println!("Goodbye!");
                return Ok(());
            }
            self.process_user_input(&message).await;
        }

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            match rl.readline(&PROMPT.bright_green().to_string()) {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(input);

                    if is_quit(input) {
                        break;
                    }
                    if input.starts_with('/') {
                        match self.handle_slash_command(input) {
                            SlashResult::Continue => continue,
                            SlashResult::Quit => break,
                        }
                    }
                    self.process_user_input(input).await;
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => return Err(eyre::eyre!("Readline error: {}", err)),
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "TaskAgent".bright_cyan().bold());
        println!("Model: {}  Project: {}", self.agent.model(), self.project);
        println!("Type {} for help, {} to quit", "/help".yellow(), "q".yellow());
        println!();
    }

    fn handle_slash_command(&mut self, input: &str) -> SlashResult {
        let cmd = input.split_whitespace().next().unwrap_or("");
        debug!(%cmd, "handle_slash_command: called");

        match cmd {
            "/help" | "/h" => {
                self.print_help();
                SlashResult::Continue
            }
            "/quit" | "/q" | "/exit" => SlashResult::Quit,
            "/clear" | "/c" => {
                self.agent.clear();
                println!("{}", "Conversation cleared.".dimmed());
                SlashResult::Continue
            }
            "/history" => {
                self.print_history();
                SlashResult::Continue
            }
            _ => {
                println!("{} Unknown command: {}", "?".yellow(), cmd);
                println!("Type {} for available commands", "/help".yellow());
                SlashResult::Continue
            }
        }
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:14} Show this help", "/help".yellow());
        println!("  {:14} Exit (also q, /exit, Ctrl-D)", "/quit".yellow());
        println!("  {:14} Forget the conversation so far", "/clear".yellow());
        println!("  {:14} Show conversation history", "/history".yellow());
        println!();
        println!("{}", "Available Tools:".bright_cyan());
        for name in self.agent.tool_names() {
            println!("  {}", name.yellow());
        }
        println!();
    }

    fn print_history(&self) {
        let history = self.agent.history();
        if history.is_empty() {
            println!("{}", "No conversation history.".dimmed());
            return;
        }

        println!();
        println!("{}", "Conversation History:".bright_cyan());
        for (i, msg) in history.iter().enumerate() {
            let role = match msg.role {
                Role::User => "User".bright_green(),
                Role::Assistant => "Assistant".bright_blue(),
            };
            println!("  {}. {}: {}", i + 1, role, msg.preview(60));
        }
        println!();
    }

    /// One chat turn. Errors are shown and the loop keeps going.
    async fn process_user_input(&mut self, input: &str) {
        let result = if self.stream {
            self.send_streaming(input).await
        } else {
            self.agent.send(input).await.map(|reply| {
                println!("{}", reply.text);
                reply
            })
        };

        match result {
            Ok(reply) => print_tool_summary(&reply),
            Err(e) => {
                warn!(error = %e, "process_user_input: turn failed");
                eprintln!("{} {}", "Error:".red(), e);
                if let Some(hint) = error_hint(&e) {
                    eprintln!("{}", hint.dimmed());
                }
            }
        }
        println!();
    }

    async fn send_streaming(&mut self, input: &str) -> Result<AgentReply, AgentError> {
        let (tx, mut rx) = mpsc::channel::<StreamChunk>(100);

        let print_handle = tokio::spawn(async move {
            while let Some(chunk) = rx.recv().await {
                match chunk {
                    StreamChunk::TextDelta(text) => {
                        print!("{}", text);
                        let _ = io::stdout().flush();
                    }
                    StreamChunk::ToolUseStart { name, .. } => {
                        print!("\n{} ", format!("[calling {}]", name).dimmed());
                        let _ = io::stdout().flush();
                    }
                    StreamChunk::ToolUseDelta { .. } | StreamChunk::ToolUseEnd { .. } => {}
                    StreamChunk::MessageDone { .. } => {}
                    StreamChunk::Error(err) => {
                        eprintln!("\n{} {}", "Stream error:".red(), err);
                    }
                }
            }
        });

        let result = self.agent.send_streaming(input, tx).await;
        let _ = print_handle.await;
        println!();
        result
    }
}

fn is_quit(input: &str) -> bool {
    input.eq_ignore_ascii_case("q")
}

fn error_hint(err: &AgentError) -> Option<&'static str> {
    err.is_auth_error()
        .then_some("The model provider rejected the API key. Check the key variable in your environment or .env file.")
}

fn print_tool_summary(reply: &AgentReply) {
    for invocation in &reply.tool_invocations {
        if invocation.result.is_error {
            println!("{} {}: {}", "✗".red(), invocation.name, invocation.result.content);
            continue;
        }
        let created: serde_json::Value = serde_json::from_str(&invocation.result.content).unwrap_or_default();
        let name = created["name"].as_str().unwrap_or("task");
        let due = created["due_on"].as_str().unwrap_or("-");
        match created["permalink_url"].as_str() {
            Some(url) => println!("{} {} (due {}) {}", "✓".green(), name, due, url.dimmed()),
            None => println!("{} {} (due {})", "✓".green(), name, due),
        }
    }
}
