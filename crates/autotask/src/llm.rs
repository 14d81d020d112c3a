//! Language model and embedding capabilities

use async_trait::async_trait;
use llm_core::{GenerateOptions, OllamaClient};
use std::time::Duration;
use tracing::debug;

use crate::error::AgentError;

/// Text completion service
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, AgentError>;
}

/// Text embedding service
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AgentError>;
}

/// Completion model served by Ollama
#[derive(Debug, Clone)]
pub struct OllamaModel {
    client: OllamaClient,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl OllamaModel {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: 0.0,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LanguageModel for OllamaModel {
    async fn complete(&self, prompt: &str) -> Result<String, AgentError> {
        let options = GenerateOptions {
            temperature: self.temperature,
        };
        let text = self
            .client
            .generate(&self.model, prompt, options, self.timeout)
            .await
            .map_err(|e| AgentError::LanguageModel(format!("{:#}", e)))?;

        if text.trim().is_empty() {
            return Err(AgentError::LanguageModel(format!(
                "model '{}' returned an empty completion",
                self.model
            )));
        }
        debug!(model = %self.model, chars = text.len(), "Completion");
        Ok(text)
    }
}

/// Embedding model served by Ollama
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AgentError> {
        self.client
            .embed(&self.model, text)
            .await
            .map_err(|e| AgentError::LanguageModel(format!("{:#}", e)))
    }
}
