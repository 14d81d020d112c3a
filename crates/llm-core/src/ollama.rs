//! Ollama API client

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::retry::{with_retry, RetryConfig};

/// Ollama service status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OllamaStatus {
    /// Service is running and ready
    Running,
    /// Service is stopped or unreachable
    Stopped,
}

/// Model information from Ollama API
#[derive(Debug, Clone, Deserialize)]
pub struct Model {
    pub name: String,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<Model>,
}

/// Sampling options for a completion
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerateOptions {
    pub temperature: f32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self { temperature: 0.0 }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Ollama API client
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
    retry: RetryConfig,
}

impl OllamaClient {
    /// Create a new client
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            retry: RetryConfig::default(),
        })
    }

    /// Replace the retry policy used for completions and embeddings
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if Ollama is running
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);

        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Get current status
    pub async fn status(&self) -> OllamaStatus {
        if self.health_check().await.unwrap_or(false) {
            OllamaStatus::Running
        } else {
            OllamaStatus::Stopped
        }
    }

    /// List all available models
    pub async fn list_models(&self) -> Result<Vec<Model>> {
        let url = format!("{}/api/tags", self.base_url);

        let resp: TagsResponse = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .context("Failed to connect to Ollama")?
            .json()
            .await
            .context("Failed to parse models response")?;

        Ok(resp.models)
    }

    /// Non-streaming text completion.
    ///
    /// Each attempt is bounded by `timeout`; transient failures are retried
    /// according to the client's retry policy.
    #[instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    pub async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: GenerateOptions,
        timeout: Duration,
    ) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let req = GenerateRequest {
            model,
            prompt,
            stream: false,
            options,
        };

        let resp: GenerateResponse = with_retry(&self.retry, "generate", || async {
            self.client
                .post(&url)
                .json(&req)
                .timeout(timeout)
                .send()
                .await
                .with_context(|| format!("Completion request to {} failed", url))?
                .error_for_status()
                .context("Completion request rejected")?
                .json::<GenerateResponse>()
                .await
                .context("Failed to parse completion response")
        })
        .await?;

        debug!(response_len = resp.response.len(), "Completion received");
        Ok(resp.response)
    }

    /// Embed a single text
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embed", self.base_url);
        let req = EmbedRequest { model, input: text };

        let resp: EmbedResponse = with_retry(&self.retry, "embed", || async {
            self.client
                .post(&url)
                .json(&req)
                .timeout(Duration::from_secs(60))
                .send()
                .await
                .with_context(|| format!("Embedding request to {} failed", url))?
                .error_for_status()
                .context("Embedding request rejected")?
                .json::<EmbedResponse>()
                .await
                .context("Failed to parse embedding response")
        })
        .await?;

        resp.embeddings
            .into_iter()
            .next()
            .context("Embedding response contained no vectors")
    }
}
