//! Overlapping sliding-window chunker with natural-boundary snapping.
//!
//! Splits normalized document text into [`Chunk`]s of at most
//! `chunk_size` characters, with `overlap` characters repeated between
//! consecutive chunks. A chunk prefers to end at the nearest preceding
//! paragraph, line, or sentence boundary within `boundary_tolerance`
//! characters of the target size, falling back to a hard cut.
//!
//! Chunking is deterministic for identical input and configuration: the
//! same text always yields the same boundaries and the same UUIDv5 chunk
//! ids, which is what makes re-ingestion detection idempotent.
//!
//! All offsets are character offsets into the document text; cuts always
//! land on `char` boundaries, so multi-byte UTF-8 is safe.

use crate::config::ChunkingConfig;
use crate::models::{Chunk, Document};

pub fn chunk_document(doc: &Document, config: &ChunkingConfig) -> Vec<Chunk> {
    chunk_text(&doc.source_id, &doc.raw_text, config)
}

/// Split `text` into overlapping chunks. Empty text yields zero chunks;
/// text shorter than `chunk_size` yields exactly one.
pub fn chunk_text(source_id: &str, text: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    if text.is_empty() {
        return Vec::new();
    }

    // Byte offset of every char boundary, so window math runs in char
    // space while slices stay valid UTF-8.
    let mut byte_of: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
    byte_of.push(text.len());
    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut seq: i64 = 0;

    loop {
        let target_end = (start + config.chunk_size).min(n);
        let end = if target_end == n {
            n
        } else {
            pick_cut(&chars, start, target_end, config)
        };

        chunks.push(Chunk {
            chunk_id: Chunk::derive_id(source_id, seq),
            source_id: source_id.to_string(),
            text: text[byte_of[start]..byte_of[end]].to_string(),
            start_offset: start,
            end_offset: end,
            sequence_index: seq,
        });

        if end == n {
            break;
        }
        // Anchor the overlap at the realized end so adjacent chunks share
        // exactly `overlap` characters even after boundary snapping.
        start = end - config.overlap;
        seq += 1;
    }

    chunks
}

/// Choose the cut position for a chunk starting at `start` with target
/// end `target_end` (both char indices, `target_end < len`). Scans
/// backwards through the tolerance window for the nearest boundary; a cut
/// must leave room for forward progress past the overlap window.
fn pick_cut(chars: &[char], start: usize, target_end: usize, config: &ChunkingConfig) -> usize {
    let floor = (start + config.overlap + 1).max(target_end.saturating_sub(config.boundary_tolerance));

    let mut cut = target_end;
    while cut > floor {
        if is_boundary(chars, cut) {
            return cut;
        }
        cut -= 1;
    }
    target_end
}

/// A cut at `pos` means the chunk ends with `chars[pos - 1]`. Boundaries,
/// strongest first: end of line (covers paragraph breaks and CSV rows),
/// then end of sentence followed by whitespace.
fn is_boundary(chars: &[char], pos: usize) -> bool {
    let prev = chars[pos - 1];
    if prev == '\n' {
        return true;
    }
    matches!(prev, '.' | '!' | '?') && chars.get(pos).map(|c| c.is_whitespace()).unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chunk_size: usize, overlap: usize, tolerance: usize) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size,
            overlap,
            boundary_tolerance: tolerance,
        }
    }

    #[test]
    fn empty_text_yields_zero_chunks() {
        assert!(chunk_text("doc", "", &config(100, 20, 10)).is_empty());
    }

    #[test]
    fn short_text_yields_single_chunk() {
        let chunks = chunk_text("doc", "The sky is blue. Grass is green.", &config(900, 150, 120));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks[0].end_offset, 32);
        assert_eq!(chunks[0].sequence_index, 0);
        assert_eq!(chunks[0].text, "The sky is blue. Grass is green.");
    }

    #[test]
    fn chunks_cover_full_text_with_exact_overlap() {
        let text: String = (0..40)
            .map(|i| format!("Sentence number {} sits right here. ", i))
            .collect();
        let cfg = config(120, 30, 40);
        let chunks = chunk_text("doc", &text, &cfg);
        assert!(chunks.len() > 1);

        let total: usize = text.chars().count();
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks.last().unwrap().end_offset, total);

        for pair in chunks.windows(2) {
            // Adjacent chunks overlap by exactly the configured window.
            assert_eq!(pair[1].start_offset, pair[0].end_offset - cfg.overlap);
            // Contiguous, ordered indices.
            assert_eq!(pair[1].sequence_index, pair[0].sequence_index + 1);
        }
    }

    #[test]
    fn every_chunk_respects_the_size_bound() {
        let text = "word ".repeat(500);
        let cfg = config(97, 13, 20);
        for chunk in chunk_text("doc", &text, &cfg) {
            assert!(chunk.end_offset - chunk.start_offset <= cfg.chunk_size);
        }
    }

    #[test]
    fn prefers_sentence_boundary_within_tolerance() {
        // A period lands a few chars before the 50-char target; the cut
        // should snap back to it rather than split the next word.
        let text = "This is the first sentence, which ends here. The second one keeps going for a while after that.";
        let chunks = chunk_text("doc", text, &config(50, 10, 15));
        assert!(chunks[0].text.ends_with("ends here."));
    }

    #[test]
    fn hard_cut_when_no_boundary_exists() {
        let text = "x".repeat(300);
        let cfg = config(100, 20, 30);
        let chunks = chunk_text("doc", &text, &cfg);
        assert_eq!(chunks[0].end_offset, 100);
        assert_eq!(chunks[1].start_offset, 80);
    }

    #[test]
    fn csv_style_lines_are_not_split_mid_row() {
        let text = (0..30)
            .map(|i| format!("drug: compound-{}; dose: {}mg", i, i * 10))
            .collect::<Vec<_>>()
            .join("\n");
        let chunks = chunk_text("doc", &text, &config(120, 20, 60));
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(
                chunk.text.ends_with('\n'),
                "chunk should end at a row boundary: {:?}",
                chunk.text
            );
        }
    }

    #[test]
    fn deterministic_across_runs() {
        let text = "Alpha beta gamma. ".repeat(60);
        let cfg = config(100, 25, 30);
        let a = chunk_text("doc", &text, &cfg);
        let b = chunk_text("doc", &text, &cfg);
        assert_eq!(a, b);
    }

    #[test]
    fn multibyte_text_is_cut_on_char_boundaries() {
        let text = "é".repeat(250);
        let cfg = config(100, 20, 10);
        let chunks = chunk_text("doc", &text, &cfg);
        assert!(chunks.len() > 1);
        let covered: usize = chunks.last().unwrap().end_offset;
        assert_eq!(covered, 250);
        for chunk in &chunks {
            assert_eq!(
                chunk.text.chars().count(),
                chunk.end_offset - chunk.start_offset
            );
        }
    }
}
