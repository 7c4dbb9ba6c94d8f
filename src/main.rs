//! # Quarry CLI
//!
//! The `quarry` binary drives the ingestion and retrieval pipeline.
//!
//! ## Usage
//!
//! ```bash
//! quarry --config ./quarry.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `quarry init` | Create the index database and schema |
//! | `quarry ingest` | Scan the source directory and index new/changed files |
//! | `quarry query "<text>"` | Retrieve relevant chunks and answer a question |
//! | `quarry get <source_id>` | Print one document's manifest row and chunks |
//! | `quarry status` | Index overview |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! quarry init --config ./quarry.toml
//!
//! # Ingest the configured source directory
//! quarry ingest --config ./quarry.toml
//!
//! # See what an ingest would do without writing
//! quarry ingest --dry-run
//!
//! # Ask a question; print the composed prompt too
//! quarry query "What color is grass?" --show-prompt
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use quarry::query::QueryOptions;
use quarry::{config, db, get, ingest, migrate, query, status};

/// Quarry — a local-first document ingestion and grounded retrieval
/// pipeline for RAG applications.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file with the source directory, chunking, embedding, and retrieval
/// settings.
#[derive(Parser)]
#[command(
    name = "quarry",
    about = "Quarry — a local-first document ingestion and grounded retrieval pipeline",
    version,
    long_about = "Quarry ingests heterogeneous documents (PDF, DOCX, CSV, plain text) from a \
    source directory, chunks and embeds them into a persistent vector index, and answers \
    natural-language queries by retrieving relevant chunks and composing a grounded prompt."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./quarry.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the index database schema.
    ///
    /// Creates the SQLite database file and the manifest and entries
    /// tables. Idempotent — running it multiple times is safe.
    Init,

    /// Scan the source directory and index new or changed documents.
    ///
    /// Compares every file's content hash against the persisted manifest:
    /// unchanged files are skipped without embedding calls, changed files
    /// have their chunks replaced atomically, and files no longer present
    /// are removed from the index. Exits non-zero if any document failed.
    Ingest {
        /// Ignore the manifest — re-chunk and re-embed every file.
        #[arg(long)]
        full: bool,

        /// Load and chunk only; show counts without writing to the index.
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of files to process (disables removal detection).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Answer a question from the indexed documents.
    ///
    /// Embeds the query, retrieves the most similar chunks, composes a
    /// grounded prompt, and (when a generation provider is configured)
    /// prints the generated answer with source provenance.
    Query {
        /// The question to answer.
        query: String,

        /// Maximum number of chunks to retrieve (defaults to config).
        #[arg(long)]
        top_k: Option<usize>,

        /// Minimum similarity score to keep a chunk (defaults to config).
        #[arg(long)]
        min_score: Option<f32>,

        /// Context budget for the composed prompt, in characters.
        #[arg(long)]
        max_context: Option<usize>,

        /// Print the composed prompt even when an answer is generated.
        #[arg(long)]
        show_prompt: bool,

        /// Skip the generation call; print the prompt and sources only.
        #[arg(long)]
        no_generate: bool,
    },

    /// Print one document's manifest row and indexed chunks.
    Get {
        /// Document source id (path relative to the source root).
        source_id: String,
    },

    /// Print an index overview: counts, model signature, formats.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.index.path).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Index database initialized.");
        }
        Commands::Ingest {
            full,
            dry_run,
            limit,
        } => {
            let report = ingest::run_ingest(&cfg, full, dry_run, limit).await?;
            ingest::print_report(&cfg, &report, dry_run);
            if !report.failures.is_empty() {
                std::process::exit(1);
            }
        }
        Commands::Query {
            query,
            top_k,
            min_score,
            max_context,
            show_prompt,
            no_generate,
        } => {
            let options = QueryOptions {
                top_k,
                min_score,
                max_context_chars: max_context,
            };
            query::run_query(&cfg, &query, options, show_prompt, no_generate).await?;
        }
        Commands::Get { source_id } => {
            get::run_get(&cfg, &source_id).await?;
        }
        Commands::Status => {
            status::run_status(&cfg).await?;
        }
    }

    Ok(())
}
