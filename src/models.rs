//! Core data types that flow through the ingestion and retrieval pipeline.

use uuid::Uuid;

/// Namespace for deterministic document/chunk UUIDs (v5). Fixed so the
/// same source_id always maps to the same id across runs and hosts.
pub const ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6b, 0x1e, 0x03, 0x42, 0x9a, 0x41, 0x4c, 0x7d, 0x8f, 0x25, 0xc0, 0x1a, 0x5e, 0xd2, 0x7b, 0x90,
]);

/// A normalized document produced by the loader.
///
/// `content_hash` is computed over the raw file bytes before any parsing,
/// so identical bytes always yield the same hash regardless of parse
/// outcome. Documents are never mutated in place: a modified file becomes
/// a new `Document` with a new hash.
#[derive(Debug, Clone)]
pub struct Document {
    /// Path relative to the source root; unique per source set.
    pub source_id: String,
    /// SHA-256 of the raw bytes, lowercase hex.
    pub content_hash: String,
    pub mime_type: String,
    /// Normalized plain text extracted from the file.
    pub raw_text: String,
    /// Format-specific markers (PDF page offsets, CSV headers/row count).
    pub metadata_json: String,
    /// Unix timestamp of the load.
    pub ingested_at: i64,
}

/// A bounded segment of a document's text: the unit of embedding and
/// retrieval. Offsets are character offsets into `Document::raw_text`.
/// Chunks from one document are contiguous, ordered by `sequence_index`,
/// and consecutive chunks share exactly the configured overlap window.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub chunk_id: String,
    pub source_id: String,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub sequence_index: i64,
}

impl Chunk {
    /// Deterministic chunk id: UUIDv5 over `"{source_id}:{sequence_index}"`.
    pub fn derive_id(source_id: &str, sequence_index: i64) -> String {
        Uuid::new_v5(
            &ID_NAMESPACE,
            format!("{}:{}", source_id, sequence_index).as_bytes(),
        )
        .to_string()
    }
}

/// A persisted index entry: one chunk plus its embedding vector and the
/// document metadata needed to detect staleness without re-reading files.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk_id: String,
    pub source_id: String,
    pub content_hash: String,
    pub sequence_index: i64,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub vector: Vec<f32>,
    pub model: String,
    pub dims: usize,
}

/// A retrieval hit: a chunk with its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub source_id: String,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub sequence_index: i64,
    pub score: f32,
}

/// Outcome of one document's trip through the ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocOutcome {
    Added,
    Updated,
    Unchanged,
    /// Empty after extraction; reported, not stored.
    Empty,
    Failed(String),
}

/// Summary of a full ingest run. The CLI exits non-zero when `failures`
/// is non-empty.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub scanned: usize,
    pub added: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub removed: u64,
    pub empty: u64,
    pub chunks_written: u64,
    pub failures: Vec<(String, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_ids_are_deterministic() {
        let a = Chunk::derive_id("docs/a.txt", 0);
        let b = Chunk::derive_id("docs/a.txt", 0);
        assert_eq!(a, b);
    }

    #[test]
    fn chunk_ids_differ_by_index_and_source() {
        let base = Chunk::derive_id("docs/a.txt", 0);
        assert_ne!(base, Chunk::derive_id("docs/a.txt", 1));
        assert_ne!(base, Chunk::derive_id("docs/b.txt", 0));
    }
}
