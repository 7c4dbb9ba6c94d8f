//! Query entry point: retrieve → compose → generate.
//!
//! Wires the retriever, prompt composer, and generation collaborator
//! together for one question, and prints the answer with the provenance
//! of every contributing chunk. Generation failure is not fatal: the
//! composed prompt and provenance are still produced so the caller can
//! retry generation without re-running retrieval.

use anyhow::Result;
use std::sync::Arc;

use crate::compose::{self, ComposedPrompt};
use crate::config::Config;
use crate::db;
use crate::embedding::{self, EmbeddingProvider};
use crate::generate::{self, GenerationProvider};
use crate::index::{SqliteIndex, VectorIndex};
use crate::models::ScoredChunk;
use crate::retrieve::Retriever;
use crate::retry::RetryPolicy;

/// Per-query overrides for the configured retrieval settings.
#[derive(Debug, Default, Clone, Copy)]
pub struct QueryOptions {
    pub top_k: Option<usize>,
    pub min_score: Option<f32>,
    pub max_context_chars: Option<usize>,
}

/// Everything one query produced. `answer` is `None` when generation is
/// disabled or failed; `generation_error` says why.
#[derive(Debug)]
pub struct QueryOutcome {
    pub results: Vec<ScoredChunk>,
    pub prompt: ComposedPrompt,
    pub answer: Option<String>,
    pub generation_error: Option<String>,
}

/// Structured query flow over explicit collaborators. Tests and embedded
/// callers drive this directly; the CLI wraps it below.
pub async fn answer_query(
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Option<Arc<dyn GenerationProvider>>,
    query_text: &str,
    top_k: usize,
    min_score: f32,
    max_context_chars: usize,
) -> Result<QueryOutcome> {
    let retriever = Retriever::new(index, embedder);
    let results = retriever.retrieve(query_text, top_k, min_score).await?;

    let prompt = compose::compose(query_text, &results, max_context_chars);

    let (answer, generation_error) = match generator {
        Some(generator) => match generator.generate(&prompt.text).await {
            Ok(answer) => (Some(answer), None),
            Err(e) => (None, Some(e.to_string())),
        },
        None => (None, None),
    };

    Ok(QueryOutcome {
        results,
        prompt,
        answer,
        generation_error,
    })
}

/// CLI entry point — builds collaborators from config and prints results.
pub async fn run_query(
    config: &Config,
    query_text: &str,
    options: QueryOptions,
    show_prompt: bool,
    no_generate: bool,
) -> Result<()> {
    if query_text.trim().is_empty() {
        println!("Empty query.");
        return Ok(());
    }
    if !config.embedding.is_enabled() {
        anyhow::bail!("Querying requires an embedding provider. Set [embedding] provider in config.");
    }

    let retry = RetryPolicy::from_config(&config.retry);
    let embedder = embedding::create_provider(&config.embedding, retry)?;
    let generator = if no_generate || !config.generation.is_enabled() {
        None
    } else {
        Some(generate::create_provider(&config.generation, retry)?)
    };

    let pool = db::connect(&config.index.path).await?;
    let index: Arc<dyn VectorIndex> = Arc::new(SqliteIndex::new(pool.clone()));

    let top_k = options.top_k.unwrap_or(config.retrieval.top_k);
    let min_score = options.min_score.unwrap_or(config.retrieval.min_score);
    let max_context = options
        .max_context_chars
        .unwrap_or(config.retrieval.max_context_chars);

    let outcome = answer_query(
        index,
        embedder,
        generator,
        query_text,
        top_k,
        min_score,
        max_context,
    )
    .await?;

    pool.close().await;

    if outcome.results.is_empty() {
        println!("No chunks scored above {:.2} for this query.", min_score);
    }

    if show_prompt || outcome.answer.is_none() {
        println!("--- Prompt ---");
        println!("{}", outcome.prompt.text);
        println!();
    }

    if let Some(ref answer) = outcome.answer {
        println!("--- Answer ---");
        println!("{}", answer);
        println!();
    }
    if let Some(ref reason) = outcome.generation_error {
        eprintln!(
            "Warning: generation failed ({}); the prompt above can be retried without re-retrieving.",
            reason
        );
    }

    if !outcome.prompt.included.is_empty() {
        println!("--- Sources ---");
        for (i, chunk) in outcome.prompt.included.iter().enumerate() {
            println!(
                "{}. [{:.2}] {} @ chars {}..{} (chunk {})",
                i + 1,
                chunk.score,
                chunk.source_id,
                chunk.start_offset,
                chunk.end_offset,
                chunk.sequence_index
            );
        }
    }

    Ok(())
}
