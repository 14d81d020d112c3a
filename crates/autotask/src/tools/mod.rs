//! Tool capabilities available to the task executor
//!
//! Every tool takes a single free-text input and returns free text. The set of
//! tools is closed ([`ToolKind`]) and fixed when the [`Toolbox`] is built.

pub mod builtin;
pub mod registry;

use anyhow::Result;
use async_trait::async_trait;
use llm_core::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

pub use registry::Toolbox;

/// Context provided to tools during execution
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Working directory for subprocess tools
    pub working_dir: PathBuf,
    /// Maximum output length (truncate if exceeded)
    pub max_output_len: usize,
    /// Timeout for subprocess tools in seconds
    pub command_timeout_secs: u64,
    /// Timeout for HTTP requests in seconds
    pub http_timeout_secs: u64,
    /// Retry policy for network tools
    pub retry: RetryConfig,
}

impl Default for ToolContext {
    fn default() -> Self {
        Self {
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            max_output_len: 20000,
            command_timeout_secs: 120,
            http_timeout_secs: 30,
            retry: RetryConfig::default(),
        }
    }
}

impl ToolContext {
    /// Create a new context with the given working directory
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            working_dir,
            ..Default::default()
        }
    }

    pub fn with_command_timeout(mut self, secs: u64) -> Self {
        self.command_timeout_secs = secs;
        self
    }

    pub fn with_http_timeout(mut self, secs: u64) -> Self {
        self.http_timeout_secs = secs;
        self
    }

    pub fn with_max_output_len(mut self, len: usize) -> Self {
        self.max_output_len = len;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// A named capability the executor can invoke
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to select the tool
    fn name(&self) -> &str;

    /// One-line description shown to the model
    fn description(&self) -> &str;

    /// Run the tool on a free-text input
    async fn invoke(&self, input: &str, ctx: &ToolContext) -> Result<String>;
}

/// The fixed set of built-in tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Execute a shell command
    #[serde(alias = "execute-shell", alias = "shell")]
    Terminal,
    /// Fetch a URL
    #[serde(alias = "fetch-url")]
    Requests,
    /// Run Python code
    #[serde(alias = "run-code")]
    PythonRepl,
    /// Ask the operator
    #[serde(alias = "ask-human")]
    Human,
    /// Search the web
    #[serde(alias = "web-search")]
    WebSearch,
}

impl ToolKind {
    pub const ALL: [ToolKind; 5] = [
        ToolKind::Terminal,
        ToolKind::Requests,
        ToolKind::PythonRepl,
        ToolKind::Human,
        ToolKind::WebSearch,
    ];

    /// Instantiate the tool behind this kind
    pub fn build(self) -> Arc<dyn Tool> {
        match self {
            ToolKind::Terminal => Arc::new(builtin::TerminalTool),
            ToolKind::Requests => Arc::new(builtin::RequestsTool),
            ToolKind::PythonRepl => Arc::new(builtin::PythonReplTool::new()),
            ToolKind::Human => Arc::new(builtin::HumanTool),
            ToolKind::WebSearch => Arc::new(builtin::WebSearchTool),
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolKind::Terminal => write!(f, "terminal"),
            ToolKind::Requests => write!(f, "requests"),
            ToolKind::PythonRepl => write!(f, "python_repl"),
            ToolKind::Human => write!(f, "human"),
            ToolKind::WebSearch => write!(f, "web_search"),
        }
    }
}

/// Truncate to at most `max_len` bytes on a char boundary, noting how much was kept
pub fn truncate_output(output: String, max_len: usize) -> String {
    if output.len() <= max_len {
        return output;
    }
    let safe_end = output
        .char_indices()
        .take_while(|(idx, c)| idx + c.len_utf8() <= max_len)
        .last()
        .map(|(idx, c)| idx + c.len_utf8())
        .unwrap_or(0);
    format!(
        "{}\n\n[Output truncated at {} bytes]",
        &output[..safe_end],
        safe_end
    )
}
