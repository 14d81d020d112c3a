//! Shell command execution tool

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, instrument};

use crate::tools::{truncate_output, Tool, ToolContext};

/// Tool for executing shell commands
pub struct TerminalTool;

#[async_trait]
impl Tool for TerminalTool {
    fn name(&self) -> &str {
        "terminal"
    }

    fn description(&self) -> &str {
        "Run a shell command on this machine. Input is the command line; output is stdout and stderr."
    }

    #[instrument(skip(self, ctx), fields(tool = "terminal"))]
    async fn invoke(&self, input: &str, ctx: &ToolContext) -> Result<String> {
        let command = strip_code_fence(input);
        if command.is_empty() {
            anyhow::bail!("Empty command");
        }

        let (shell, shell_arg) = if cfg!(target_os = "windows") {
            ("cmd", "/C")
        } else {
            ("bash", "-c")
        };

        let mut cmd = Command::new(shell);
        cmd.arg(shell_arg).arg(command);
        run_command(cmd, ctx).await
    }
}

/// Run a prepared command in the context's working directory with its timeout.
///
/// A non-zero exit is reported in the output, not as an error; spawn failures
/// and timeouts are errors.
pub(crate) async fn run_command(mut cmd: Command, ctx: &ToolContext) -> Result<String> {
    if !ctx.working_dir.exists() {
        anyhow::bail!(
            "Working directory does not exist: {}",
            ctx.working_dir.display()
        );
    }

    cmd.current_dir(&ctx.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = timeout(Duration::from_secs(ctx.command_timeout_secs), cmd.output())
        .await
        .map_err(|_| {
            anyhow::anyhow!("Command timed out after {} seconds", ctx.command_timeout_secs)
        })?
        .context("Failed to execute command")?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    let mut combined = String::new();
    if !stdout.is_empty() {
        combined.push_str(&stdout);
    }
    if !stderr.is_empty() {
        if !combined.is_empty() {
            combined.push_str("\n--- stderr ---\n");
        }
        combined.push_str(&stderr);
    }

    if !output.status.success() {
        let exit_code = output
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        debug!(exit_code = %exit_code, "Command exited unsuccessfully");
        combined.push_str(&format!("\n[exit code {}]", exit_code));
    }

    Ok(truncate_output(combined, ctx.max_output_len))
}

/// Models often wrap commands in markdown fences or backticks
pub(crate) fn strip_code_fence(input: &str) -> &str {
    let trimmed = input.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let body = rest.strip_suffix("```").unwrap_or(rest);
        // Drop a language tag on the opening fence line
        return match body.split_once('\n') {
            Some((first, tail)) if !first.trim().contains(' ') => tail.trim(),
            _ => body.trim(),
        };
    }
    trimmed.trim_matches('`').trim()
}
