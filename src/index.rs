//! Vector-index ownership: the [`VectorIndex`] capability trait, its
//! SQLite implementation, and the [`IndexManager`] that enforces
//! replace-on-change semantics.
//!
//! The pipeline only ever talks to the trait, so any storage engine with
//! upsert/delete/query can be substituted without touching ingestion or
//! retrieval. The bundled engine stores entries in SQLite (see
//! [`crate::migrate`]) with embeddings as little-endian `f32` BLOBs and
//! computes similarity in process.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::errors::IndexError;
use crate::models::{Chunk, Document, IndexEntry, ScoredChunk};

/// The embedding model and dimension an index was built with. Mixing
/// models in one index is a configuration error, not a data state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSignature {
    pub model: String,
    pub dims: usize,
}

/// Capability interface over a persistent vector index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Replace all of one document's entries atomically: stage the new
    /// entries (keyed by their deterministic chunk ids), then drop every
    /// entry whose stored content hash differs, then record the manifest
    /// row. Either the document's whole new state commits or none of it.
    async fn upsert_document(
        &self,
        doc: &Document,
        entries: &[IndexEntry],
    ) -> Result<(), IndexError>;

    /// Remove all entries and the manifest row for a document. Returns
    /// the number of entries dropped.
    async fn delete_document(&self, source_id: &str) -> Result<u64, IndexError>;

    /// Similarity search: entries scored against `vector` by cosine
    /// similarity, descending, ties broken by `chunk_id` so results are
    /// deterministic, truncated to `top_k`.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>, IndexError>;

    /// The persisted change-detection state: `source_id` → `content_hash`.
    async fn manifest(&self) -> Result<HashMap<String, String>, IndexError>;

    /// The model signature of the stored vectors, `None` while empty.
    async fn signature(&self) -> Result<Option<IndexSignature>, IndexError>;
}

// ============ SQLite implementation ============

pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn upsert_document(
        &self,
        doc: &Document,
        entries: &[IndexEntry],
    ) -> Result<(), IndexError> {
        // Model drift check before any write.
        if let (Some(signature), Some(entry)) = (self.signature().await?, entries.first()) {
            if signature.model != entry.model || signature.dims != entry.dims {
                return Err(IndexError::ModelMismatch {
                    indexed_model: signature.model,
                    indexed_dims: signature.dims,
                    model: entry.model.clone(),
                    dims: entry.dims,
                });
            }
        }

        let mut tx = self.pool.begin().await?;

        // Stage the new entries first. Chunk ids are deterministic per
        // (source_id, seq), so re-ingesting a changed document overwrites
        // in place rather than duplicating.
        for entry in entries {
            let blob = vec_to_blob(&entry.vector);
            sqlx::query(
                r#"
                INSERT INTO entries (chunk_id, source_id, content_hash, seq, text, start_offset, end_offset, embedding, model, dims)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(chunk_id) DO UPDATE SET
                    content_hash = excluded.content_hash,
                    text = excluded.text,
                    start_offset = excluded.start_offset,
                    end_offset = excluded.end_offset,
                    embedding = excluded.embedding,
                    model = excluded.model,
                    dims = excluded.dims
                "#,
            )
            .bind(&entry.chunk_id)
            .bind(&entry.source_id)
            .bind(&entry.content_hash)
            .bind(entry.sequence_index)
            .bind(&entry.text)
            .bind(entry.start_offset as i64)
            .bind(entry.end_offset as i64)
            .bind(blob)
            .bind(&entry.model)
            .bind(entry.dims as i64)
            .execute(&mut *tx)
            .await?;
        }

        // Now drop superseded entries: anything for this document still
        // carrying a different content hash (shorter new version leaves
        // trailing old chunks behind; this sweeps them).
        sqlx::query("DELETE FROM entries WHERE source_id = ? AND content_hash != ?")
            .bind(&doc.source_id)
            .bind(&doc.content_hash)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO manifest (source_id, content_hash, mime_type, metadata_json, chunk_count, ingested_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(source_id) DO UPDATE SET
                content_hash = excluded.content_hash,
                mime_type = excluded.mime_type,
                metadata_json = excluded.metadata_json,
                chunk_count = excluded.chunk_count,
                ingested_at = excluded.ingested_at
            "#,
        )
        .bind(&doc.source_id)
        .bind(&doc.content_hash)
        .bind(&doc.mime_type)
        .bind(&doc.metadata_json)
        .bind(entries.len() as i64)
        .bind(doc.ingested_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_document(&self, source_id: &str) -> Result<u64, IndexError> {
        let mut tx = self.pool.begin().await?;

        let dropped = sqlx::query("DELETE FROM entries WHERE source_id = ?")
            .bind(source_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM manifest WHERE source_id = ?")
            .bind(source_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(dropped)
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        let rows = sqlx::query(
            "SELECT chunk_id, source_id, seq, text, start_offset, end_offset, embedding FROM entries",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<ScoredChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let stored = blob_to_vec(&blob);
                ScoredChunk {
                    chunk_id: row.get("chunk_id"),
                    source_id: row.get("source_id"),
                    text: row.get("text"),
                    start_offset: row.get::<i64, _>("start_offset") as usize,
                    end_offset: row.get::<i64, _>("end_offset") as usize,
                    sequence_index: row.get("seq"),
                    score: cosine_similarity(vector, &stored),
                }
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
        let rows = sqlx::query("SELECT source_id, content_hash FROM manifest")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get("source_id"), row.get("content_hash")))
            .collect())
    }

    async fn signature(&self) -> Result<Option<IndexSignature>, IndexError> {
        let row = sqlx::query("SELECT model, dims FROM entries LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| IndexSignature {
            model: r.get("model"),
            dims: r.get::<i64, _>("dims") as usize,
        }))
    }
}

// ============ Index manager ============

/// Pipeline-facing wrapper over a [`VectorIndex`]: builds entries from
/// chunks + vectors, enforces idempotence, and detects removals.
pub struct IndexManager {
    index: Arc<dyn VectorIndex>,
}

impl IndexManager {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self { index }
    }

    pub fn index(&self) -> Arc<dyn VectorIndex> {
        Arc::clone(&self.index)
    }

    /// Snapshot of the persisted manifest for change detection.
    pub async fn manifest(&self) -> Result<HashMap<String, String>, IndexError> {
        self.index.manifest().await
    }

    /// Commit one document's chunks and vectors. `chunks` and `vectors`
    /// are parallel; the transaction covers the whole document, so a
    /// failure here leaves the previously committed state untouched.
    pub async fn upsert_document(
        &self,
        doc: &Document,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
        model: &str,
    ) -> Result<(), IndexError> {
        debug_assert_eq!(chunks.len(), vectors.len());

        let entries: Vec<IndexEntry> = chunks
            .iter()
            .zip(vectors.iter())
            .map(|(chunk, vector)| IndexEntry {
                chunk_id: chunk.chunk_id.clone(),
                source_id: chunk.source_id.clone(),
                content_hash: doc.content_hash.clone(),
                sequence_index: chunk.sequence_index,
                text: chunk.text.clone(),
                start_offset: chunk.start_offset,
                end_offset: chunk.end_offset,
                vector: vector.clone(),
                model: model.to_string(),
                dims: vector.len(),
            })
            .collect();

        self.index.upsert_document(doc, &entries).await
    }

    /// Drop every previously ingested document that is absent from the
    /// current source set. Returns the removed source ids, sorted.
    pub async fn remove_absent(
        &self,
        present: &HashSet<String>,
    ) -> Result<Vec<String>, IndexError> {
        let manifest = self.index.manifest().await?;
        let mut removed = Vec::new();
        for source_id in manifest.keys() {
            if !present.contains(source_id) {
                self.index.delete_document(source_id).await?;
                removed.push(source_id.clone());
            }
        }
        removed.sort();
        Ok(removed)
    }
}
