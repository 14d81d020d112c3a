//! Semantic memory of task results
//!
//! Every completed task result is embedded and stored; the executor looks up
//! the records closest to the task it is about to run.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

use crate::error::AgentError;
use crate::llm::Embedder;

/// Embedding vector type
pub type Embedding = Vec<f32>;

/// Store of free-text records searchable by similarity
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Insert a record, returning its id
    async fn add(&self, text: &str) -> Result<String, AgentError>;

    /// Up to `k` stored texts, closest first
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<String>, AgentError>;
}

/// A stored record
#[derive(Debug, Clone)]
pub struct MemoryRecord {
    pub id: String,
    pub text: String,
    pub embedding: Embedding,
}

/// Flat in-process vector index ranked by L2 distance
pub struct VectorMemory {
    embedder: Arc<dyn Embedder>,
    records: RwLock<Vec<MemoryRecord>>,
}

impl VectorMemory {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            records: RwLock::new(Vec::new()),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Squared euclidean distance
    pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
    }
}

#[async_trait]
impl MemoryStore for VectorMemory {
    async fn add(&self, text: &str) -> Result<String, AgentError> {
        let embedding = self.embedder.embed(text).await?;
        if embedding.is_empty() {
            return Err(AgentError::Memory("embedder returned an empty vector".into()));
        }

        let mut records = self.records.write();
        if let Some(first) = records.first() {
            if first.embedding.len() != embedding.len() {
                return Err(AgentError::Memory(format!(
                    "embedding dimension {} does not match index dimension {}",
                    embedding.len(),
                    first.embedding.len()
                )));
            }
        }

        let id = uuid::Uuid::new_v4().to_string();
        records.push(MemoryRecord {
            id: id.clone(),
            text: text.to_string(),
            embedding,
        });
        debug!(id = %id, records = records.len(), "Stored memory record");
        Ok(id)
    }

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<String>, AgentError> {
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query).await?;
        let records = self.records.read();

        let mut scored: Vec<(f32, &MemoryRecord)> = records
            .iter()
            .filter(|r| r.embedding.len() == query_embedding.len())
            .map(|r| (Self::l2_distance(&query_embedding, &r.embedding), r))
            .collect();

        // Ascending distance; stable so ties keep insertion order
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        debug!(
            hits = ?scored.iter().map(|(d, r)| (r.id.as_str(), *d)).collect::<Vec<_>>(),
            "Memory search"
        );
        Ok(scored.into_iter().map(|(_, r)| r.text.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::KeywordEmbedder;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Each call returns a vector one element longer than the last
    struct GrowingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for GrowingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, AgentError> {
            let dim = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(vec![1.0; dim])
        }
    }

    fn memory() -> VectorMemory {
        VectorMemory::new(Arc::new(KeywordEmbedder::new(&["ocean", "haiku", "rust", "tax"])))
    }

    #[test]
    fn test_l2_distance() {
        assert_eq!(VectorMemory::l2_distance(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
        assert_eq!(VectorMemory::l2_distance(&[0.0, 0.0], &[3.0, 4.0]), 25.0);
    }

    #[tokio::test]
    async fn test_search_ranks_closest_first() {
        let memory = memory();
        memory.add("rust borrow checker notes").await.unwrap();
        memory.add("ocean haiku draft").await.unwrap();
        memory.add("tax forms").await.unwrap();

        let hits = memory.similarity_search("a haiku about the ocean", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0], "ocean haiku draft");
    }

    #[tokio::test]
    async fn test_search_empty_store() {
        let memory = memory();
        let hits = memory.similarity_search("anything", 4).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_add_returns_unique_ids() {
        let memory = memory();
        let a = memory.add("ocean").await.unwrap();
        let b = memory.add("ocean").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(memory.len(), 2);
    }

    #[tokio::test]
    async fn test_add_rejects_dimension_mismatch() {
        let memory = VectorMemory::new(Arc::new(GrowingEmbedder {
            calls: AtomicUsize::new(0),
        }));
        memory.add("first").await.unwrap();

        let err = memory.add("second").await.unwrap_err();
        assert!(matches!(err, AgentError::Memory(_)));
        assert!(err
            .to_string()
            .contains("embedding dimension 2 does not match index dimension 1"));
        assert_eq!(memory.len(), 1);
    }
}
