//! Query-time similarity retrieval.
//!
//! Embeds the query with the same provider configuration the index was
//! built with, runs the similarity search, and applies the relevance
//! threshold and result-size cap. Results are deterministic: descending
//! score with a stable `chunk_id` tie-break (done by the index), then a
//! `min_score` filter here.

use anyhow::Result;
use std::sync::Arc;

use crate::embedding::EmbeddingProvider;
use crate::errors::{EmbeddingError, IndexError};
use crate::index::VectorIndex;
use crate::models::ScoredChunk;

pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    provider: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    pub fn new(index: Arc<dyn VectorIndex>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { index, provider }
    }

    /// Retrieve the `top_k` most similar chunks scoring at least
    /// `min_score`.
    ///
    /// Fails fast when the query-time provider drifts from the
    /// ingestion-time configuration: a different vector dimension or a
    /// different model identifier would make every score meaningless, so
    /// neither is survivable.
    pub async fn retrieve(
        &self,
        query_text: &str,
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<ScoredChunk>> {
        let signature = self.index.signature().await?;

        let query_vector = self.provider.embed_query(query_text).await?;

        if let Some(signature) = signature {
            if query_vector.len() != signature.dims {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: signature.dims,
                    got: query_vector.len(),
                }
                .into());
            }
            if signature.model != self.provider.model_name() {
                return Err(IndexError::ModelMismatch {
                    indexed_model: signature.model,
                    indexed_dims: signature.dims,
                    model: self.provider.model_name().to_string(),
                    dims: self.provider.dims(),
                }
                .into());
            }
        } else {
            // Empty index: nothing can match.
            return Ok(Vec::new());
        }

        let mut results = self.index.query(&query_vector, top_k).await?;
        results.retain(|r| r.score >= min_score);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::IndexError;
    use crate::index::IndexSignature;
    use crate::models::{Document, IndexEntry};
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Minimal in-memory index proving any engine can sit behind the
    /// capability trait.
    struct InMemoryIndex {
        entries: Vec<IndexEntry>,
    }

    #[async_trait]
    impl VectorIndex for InMemoryIndex {
        async fn upsert_document(
            &self,
            _doc: &Document,
            _entries: &[IndexEntry],
        ) -> Result<(), IndexError> {
            unimplemented!("read-only test index")
        }

        async fn delete_document(&self, _source_id: &str) -> Result<u64, IndexError> {
            unimplemented!("read-only test index")
        }

        async fn query(
            &self,
            vector: &[f32],
            top_k: usize,
        ) -> Result<Vec<ScoredChunk>, IndexError> {
            let mut scored: Vec<ScoredChunk> = self
                .entries
                .iter()
                .map(|e| ScoredChunk {
                    chunk_id: e.chunk_id.clone(),
                    source_id: e.source_id.clone(),
                    text: e.text.clone(),
                    start_offset: e.start_offset,
                    end_offset: e.end_offset,
                    sequence_index: e.sequence_index,
                    score: crate::embedding::cosine_similarity(vector, &e.vector),
                })
                .collect();
            scored.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.chunk_id.cmp(&b.chunk_id))
            });
            scored.truncate(top_k);
            Ok(scored)
        }

        async fn manifest(&self) -> Result<HashMap<String, String>, IndexError> {
            Ok(HashMap::new())
        }

        async fn signature(&self) -> Result<Option<IndexSignature>, IndexError> {
            Ok(self.entries.first().map(|e| IndexSignature {
                model: e.model.clone(),
                dims: e.dims,
            }))
        }
    }

    struct FixedEmbedder {
        vector: Vec<f32>,
        model: String,
    }

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        fn model_name(&self) -> &str {
            &self.model
        }
        fn dims(&self) -> usize {
            self.vector.len()
        }
        async fn embed_batch(
            &self,
            texts: &[String],
        ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|_| self.vector.clone()).collect())
        }
    }

    fn entry(chunk_id: &str, vector: Vec<f32>) -> IndexEntry {
        IndexEntry {
            chunk_id: chunk_id.to_string(),
            source_id: "doc.txt".to_string(),
            content_hash: "hash".to_string(),
            sequence_index: 0,
            text: format!("text for {}", chunk_id),
            start_offset: 0,
            end_offset: 10,
            vector: vector.clone(),
            model: "stub-model".to_string(),
            dims: vector.len(),
        }
    }

    fn retriever(entries: Vec<IndexEntry>, query: Vec<f32>) -> Retriever {
        Retriever::new(
            Arc::new(InMemoryIndex { entries }),
            Arc::new(FixedEmbedder {
                vector: query,
                model: "stub-model".to_string(),
            }),
        )
    }

    #[tokio::test]
    async fn results_ranked_by_descending_score() {
        let entries = vec![
            entry("a", vec![1.0, 0.0]),
            entry("b", vec![0.8, 0.2]),
            entry("c", vec![0.0, 1.0]),
        ];
        let r = retriever(entries, vec![1.0, 0.0]);
        let results = r.retrieve("q", 3, -1.0).await.unwrap();
        assert_eq!(results.len(), 3);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert_eq!(results[0].chunk_id, "a");
    }

    #[tokio::test]
    async fn equal_scores_break_ties_by_chunk_id() {
        let entries = vec![
            entry("zz", vec![1.0, 0.0]),
            entry("aa", vec![1.0, 0.0]),
            entry("mm", vec![1.0, 0.0]),
        ];
        let r = retriever(entries, vec![1.0, 0.0]);
        let results = r.retrieve("q", 3, 0.0).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["aa", "mm", "zz"]);
    }

    #[tokio::test]
    async fn top_k_caps_result_size() {
        let entries = (0..10)
            .map(|i| entry(&format!("c{:02}", i), vec![1.0, i as f32 / 10.0]))
            .collect();
        let r = retriever(entries, vec![1.0, 0.0]);
        let results = r.retrieve("q", 3, -1.0).await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn min_score_drops_weak_matches() {
        let entries = vec![
            entry("close", vec![1.0, 0.0]),
            entry("far", vec![-1.0, 0.0]),
        ];
        let r = retriever(entries, vec![1.0, 0.0]);
        let results = r.retrieve("q", 5, 0.5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk_id, "close");
    }

    #[tokio::test]
    async fn empty_index_returns_no_results() {
        let r = retriever(Vec::new(), vec![1.0, 0.0]);
        let results = r.retrieve("q", 5, 0.0).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn query_dimension_drift_is_fatal() {
        let entries = vec![entry("a", vec![1.0, 0.0, 0.0])];
        // Query provider produces 2-dimensional vectors against a
        // 3-dimensional index.
        let r = retriever(entries, vec![1.0, 0.0]);
        let err = r.retrieve("q", 5, 0.0).await.unwrap_err();
        let embedding_err = err.downcast_ref::<EmbeddingError>().unwrap();
        assert!(matches!(
            embedding_err,
            EmbeddingError::DimensionMismatch {
                expected: 3,
                got: 2
            }
        ));
    }

    #[tokio::test]
    async fn model_drift_is_fatal() {
        let entries = vec![entry("a", vec![1.0, 0.0])];
        let r = Retriever::new(
            Arc::new(InMemoryIndex { entries }),
            Arc::new(FixedEmbedder {
                vector: vec![1.0, 0.0],
                model: "different-model".to_string(),
            }),
        );
        let err = r.retrieve("q", 5, 0.0).await.unwrap_err();
        assert!(err.downcast_ref::<IndexError>().is_some());
    }
}
