//! autotask: autonomous task-driven agent for local LLMs
//!
//! Asks for an objective, then plans, executes and reviews tasks against an
//! Ollama model until the objective can be answered.

mod agent;
mod config;
mod error;
mod llm;
mod memory;
mod tools;

#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use llm_core::{OllamaClient, OllamaStatus};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::agent::{AgentConfig, AgentLoop, LoopStatus, TaskExecutor};
use crate::config::UserConfig;
use crate::llm::{OllamaEmbedder, OllamaModel};
use crate::memory::VectorMemory;
use crate::tools::{ToolContext, Toolbox};

// ANSI colors
const YELLOW: &str = "\x1b[93m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Parser)]
#[command(name = "autotask")]
#[command(about = "Autonomous task-driven agent for local LLMs", version)]
struct Cli {
    /// Show task progress and debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (defaults to ~/.config/autotask/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Completion model (overrides config)
    #[arg(short, long)]
    model: Option<String>,

    /// Ollama base URL (overrides config)
    #[arg(long, env = "OLLAMA_HOST")]
    url: Option<String>,

    /// Stop after this many tasks
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Objective to pursue (skips the prompt)
    #[arg(short, long)]
    objective: Option<String>,
}

fn read_objective() -> Result<Option<String>> {
    let mut rl = DefaultEditor::new()?;
    loop {
        match rl.readline("What is my purpose? ") {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => return Ok(Some(line.trim().to_string())),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return Ok(None),
            Err(e) => return Err(e.into()),
        }
    }
}

/// Warn early when Ollama is down or the model is not pulled
async fn check_model(client: &OllamaClient, model: &str) {
    if client.status().await == OllamaStatus::Stopped {
        warn!(url = client.base_url(), "Ollama is not running");
        println!(
            "{}Ollama is not reachable at {}{}",
            YELLOW,
            client.base_url(),
            RESET
        );
        return;
    }

    match client.list_models().await {
        Ok(models) => {
            let found = models
                .iter()
                .any(|m| m.name == model || m.name == format!("{}:latest", model));
            if !found {
                warn!(model, available = models.len(), "Model not found in Ollama");
                println!(
                    "{}Model '{}' is not available. Run: ollama pull {}{}",
                    YELLOW, model, model, RESET
                );
            }
        }
        Err(e) => warn!(error = %e, "Could not list Ollama models"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = match &cli.config {
        Some(path) => UserConfig::load_from(path)?,
        None => UserConfig::load()?,
    };
    if let Some(model) = cli.model {
        config.model.name = model;
    }
    if let Some(url) = cli.url {
        config.model.url = url;
    }
    if cli.max_iterations.is_some() {
        config.agent.max_iterations = cli.max_iterations;
    }

    let objective = match cli.objective {
        Some(objective) if !objective.trim().is_empty() => objective.trim().to_string(),
        Some(_) => anyhow::bail!("Objective must not be empty"),
        None => match read_objective()? {
            Some(objective) => objective,
            None => return Ok(()),
        },
    };

    let client = OllamaClient::new(config.model.url.as_str())
        .context("Failed to create Ollama client")?
        .with_retry(config.retry);
    check_model(&client, &config.model.name).await;

    let model = Arc::new(
        OllamaModel::new(client.clone(), config.model.name.as_str())
            .with_temperature(config.model.temperature)
            .with_timeout(Duration::from_secs(config.model.timeout_secs)),
    );
    let memory = Arc::new(VectorMemory::new(Arc::new(OllamaEmbedder::new(
        client,
        config.model.embedding.as_str(),
    ))));

    let working_dir = match &config.tools.working_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let tool_ctx = ToolContext::new(working_dir)
        .with_command_timeout(config.tools.command_timeout_secs)
        .with_http_timeout(config.tools.http_timeout_secs)
        .with_max_output_len(config.tools.max_output_len)
        .with_retry(config.retry);
    let toolbox = Toolbox::from_kinds(&config.tools.enabled);
    if toolbox.is_empty() {
        warn!("No tools enabled, tasks will be answered by the model alone");
    }
    info!(tools = toolbox.len(), model = %model.model(), "Agent configured");

    let executor = TaskExecutor::new(model.clone(), memory.clone(), toolbox, tool_ctx)
        .with_memory_k(config.agent.memory_k)
        .with_max_tool_steps(config.agent.max_tool_steps)
        .with_verbose(cli.verbose);
    let agent_config = AgentConfig::default()
        .with_max_iterations(config.agent.max_iterations)
        .with_compose_answer(config.agent.compose_answer)
        .with_verbose(cli.verbose);

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{}Stopping after the current task...{}", DIM, RESET);
            signal_token.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });

    let agent = AgentLoop::new(model, executor, memory, agent_config).with_cancellation(cancel);
    let state = agent.run(&objective).await?;

    match state.status {
        LoopStatus::Answerable => {
            // Verbose runs already printed it
            if !cli.verbose {
                if let Some(answer) = &state.final_answer {
                    println!("{}", answer);
                }
            }
            Ok(())
        }
        _ => anyhow::bail!(
            "Run stopped after {} task(s): {}",
            state.completed.len(),
            state.error.as_deref().unwrap_or("unknown error")
        ),
    }
}
