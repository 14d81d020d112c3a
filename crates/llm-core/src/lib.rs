//! llm-core: Shared library for talking to a local Ollama service
//!
//! Provides:
//! - Ollama API client (completion, embeddings, health check)
//! - Bounded retry with exponential backoff for network calls

pub mod ollama;
pub mod retry;

pub use ollama::{GenerateOptions, Model, OllamaClient, OllamaStatus};
pub use retry::{is_retryable, with_retry, RetryConfig};
