//! Grounded prompt assembly.
//!
//! Takes the ranked retrieval result and the user's question and builds
//! the prompt handed to the generation collaborator. Every context block
//! carries its provenance (source id and character offsets) so answers
//! can be traced back to the documents they came from.

use crate::models::ScoredChunk;

const INSTRUCTIONS: &str = "You are a careful assistant. Use ONLY the provided context to answer. \
If the context is insufficient, say you don't know.";

const NO_CONTEXT: &str = "No supporting context was found in the indexed documents for this \
question. Say that you cannot answer from the available documents; do not fabricate an answer.";

/// A composed prompt plus the chunks that actually fit the context budget.
#[derive(Debug)]
pub struct ComposedPrompt {
    pub text: String,
    /// Chunks included in the context window, highest score first. May be
    /// shorter than the retrieval result when the budget truncates.
    pub included: Vec<ScoredChunk>,
}

/// Assemble the grounded prompt.
///
/// Context blocks are added in descending score order until adding the
/// next block would push the accumulated context past
/// `max_context_chars`; everything from that point on is dropped
/// (lowest-scoring first, since input is ranked). An empty retrieval
/// yields an explicit no-context prompt instead of fabricated context.
pub fn compose(
    query_text: &str,
    results: &[ScoredChunk],
    max_context_chars: usize,
) -> ComposedPrompt {
    if results.is_empty() {
        let text = format!(
            "{}\n\n{}\n\nQuestion: {}\nAnswer:",
            INSTRUCTIONS, NO_CONTEXT, query_text
        );
        return ComposedPrompt {
            text,
            included: Vec::new(),
        };
    }

    let mut context = String::new();
    let mut included = Vec::new();

    for chunk in results {
        let block = format!(
            "[source: {} @ chars {}..{}, score {:.3}]\n{}",
            chunk.source_id, chunk.start_offset, chunk.end_offset, chunk.score, chunk.text
        );
        let separator = if context.is_empty() { 0 } else { 5 }; // "\n---\n"
        if context.chars().count() + separator + block.chars().count() > max_context_chars {
            break;
        }
        if !context.is_empty() {
            context.push_str("\n---\n");
        }
        context.push_str(&block);
        included.push(chunk.clone());
    }

    // Degenerate budget: always carry at least the best chunk rather
    // than sending an empty context for a non-empty retrieval.
    if included.is_empty() {
        let best = &results[0];
        context = format!(
            "[source: {} @ chars {}..{}, score {:.3}]\n{}",
            best.source_id, best.start_offset, best.end_offset, best.score, best.text
        );
        included.push(best.clone());
    }

    let text = format!(
        "{}\n\nContext:\n{}\n\nQuestion: {}\nAnswer:",
        INSTRUCTIONS, context, query_text
    );

    ComposedPrompt { text, included }
}
