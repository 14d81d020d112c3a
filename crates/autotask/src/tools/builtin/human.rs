//! Ask the operator for input

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::{self, IsTerminal, Write};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use crate::tools::{Tool, ToolContext};

/// Tool that prints a question and waits for one line from stdin
pub struct HumanTool;

#[async_trait]
impl Tool for HumanTool {
    fn name(&self) -> &str {
        "human"
    }

    fn description(&self) -> &str {
        "Ask a human for guidance when you are stuck or unsure. Input is the question to ask."
    }

    async fn invoke(&self, input: &str, _ctx: &ToolContext) -> Result<String> {
        if !io::stdin().is_terminal() {
            warn!("Non-interactive mode: cannot ask the operator");
            anyhow::bail!("stdin is not a terminal; no human is available to answer");
        }

        println!();
        println!("\x1b[93m[Question]\x1b[0m {}", input.trim());
        print!("> ");
        io::stdout().flush()?;

        // Use async stdin to avoid blocking the runtime
        let mut reader = BufReader::new(tokio::io::stdin());
        let mut answer = String::new();
        let read = reader
            .read_line(&mut answer)
            .await
            .context("Failed to read answer from stdin")?;
        if read == 0 {
            anyhow::bail!("stdin closed before an answer was given");
        }

        debug!(answer_len = answer.len(), "Operator answered");
        Ok(answer.trim().to_string())
    }
}
