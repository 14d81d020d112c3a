//! Python code execution tool

use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::terminal::{run_command, strip_code_fence};
use crate::tools::{Tool, ToolContext};

/// Tool for running Python snippets in a fresh interpreter
pub struct PythonReplTool {
    interpreter: Option<PathBuf>,
}

impl PythonReplTool {
    /// Locate `python3` (or `python`) on PATH
    pub fn new() -> Self {
        let interpreter = which::which("python3")
            .or_else(|_| which::which("python"))
            .ok();
        debug!(interpreter = ?interpreter, "Python interpreter");
        Self { interpreter }
    }

    #[cfg(test)]
    fn is_available(&self) -> bool {
        self.interpreter.is_some()
    }
}

impl Default for PythonReplTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for PythonReplTool {
    fn name(&self) -> &str {
        "python_repl"
    }

    fn description(&self) -> &str {
        "Run a Python script. Input is valid Python code; use print() to see values in the output."
    }

    #[instrument(skip(self, input, ctx), fields(tool = "python_repl", code_len = input.len()))]
    async fn invoke(&self, input: &str, ctx: &ToolContext) -> Result<String> {
        let Some(interpreter) = &self.interpreter else {
            anyhow::bail!("No Python interpreter found on PATH");
        };

        let code = strip_code_fence(input);
        let code = code.strip_prefix("python\n").unwrap_or(code);
        if code.trim().is_empty() {
            anyhow::bail!("Empty script");
        }

        let mut cmd = Command::new(interpreter);
        cmd.arg("-c").arg(code);
        run_command(cmd, ctx).await
    }
}
