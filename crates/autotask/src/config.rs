//! User configuration for autotask
//!
//! Configuration file: ~/.config/autotask/config.toml (or platform equivalent)

use anyhow::{Context, Result};
use llm_core::RetryConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::tools::ToolKind;

/// User configuration for the agent
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    /// Ollama server and models
    #[serde(default)]
    pub model: ModelConfig,

    /// Control loop settings
    #[serde(default)]
    pub agent: AgentSection,

    /// Enabled tools and their limits
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Retry policy for model and network calls
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Ollama base URL
    #[serde(default = "default_url")]
    pub url: String,

    /// Completion model
    #[serde(default = "default_model")]
    pub name: String,

    /// Embedding model used by the memory store
    #[serde(default = "default_embedding_model")]
    pub embedding: String,

    #[serde(default)]
    pub temperature: f32,

    /// Per-call timeout in seconds
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
}

/// `[agent]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    /// Unbounded when unset
    #[serde(default)]
    pub max_iterations: Option<usize>,

    /// Compose a final answer from the gathered context
    #[serde(default = "default_true")]
    pub compose_answer: bool,

    /// Memory hits given to the executor per task
    #[serde(default = "default_memory_k")]
    pub memory_k: usize,

    /// Tool calls allowed per task
    #[serde(default = "default_max_tool_steps")]
    pub max_tool_steps: usize,
}

/// `[tools]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_tools")]
    pub enabled: Vec<ToolKind>,

    /// Working directory for terminal and python_repl (current dir if unset)
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_max_output_len")]
    pub max_output_len: usize,
}

fn default_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_model_timeout() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

fn default_memory_k() -> usize {
    4
}

fn default_max_tool_steps() -> usize {
    3
}

fn default_tools() -> Vec<ToolKind> {
    ToolKind::ALL.to_vec()
}

fn default_command_timeout() -> u64 {
    120
}

fn default_http_timeout() -> u64 {
    30
}

fn default_max_output_len() -> usize {
    20000
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            name: default_model(),
            embedding: default_embedding_model(),
            temperature: 0.0,
            timeout_secs: default_model_timeout(),
        }
    }
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_iterations: None,
            compose_answer: true,
            memory_k: default_memory_k(),
            max_tool_steps: default_max_tool_steps(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: default_tools(),
            working_dir: None,
            command_timeout_secs: default_command_timeout(),
            http_timeout_secs: default_http_timeout(),
            max_output_len: default_max_output_len(),
        }
    }
}

impl UserConfig {
    /// Load user configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load from `path`; a missing file means defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("autotask").join("config.toml"))
    }
}
