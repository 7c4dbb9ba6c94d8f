//! Ingestion entry point and pipeline orchestration.
//!
//! Drives the full flow for a batch: scan the source directory, detect
//! new/changed/removed files against the persisted manifest, then run
//! load → chunk → embed → upsert per document under a bounded worker
//! pool. Documents are independent: one failure is recorded and the rest
//! of the batch continues. Only configuration drift (embedding dimension
//! or index model mismatch) halts the run.

use anyhow::{bail, Result};
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::chunk::chunk_document;
use crate::config::{ChunkingConfig, Config};
use crate::db;
use crate::embedding::{self, EmbeddingProvider};
use crate::errors::{EmbeddingError, IndexError};
use crate::index::{IndexManager, SqliteIndex};
use crate::loader;
use crate::models::{DocOutcome, IngestReport};
use crate::retry::RetryPolicy;

/// A file discovered in the source directory: absolute path plus the
/// root-relative source id.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub source_id: String,
}

/// Run a full ingest using the provider named in the configuration.
pub async fn run_ingest(
    config: &Config,
    full: bool,
    dry_run: bool,
    limit: Option<usize>,
) -> Result<IngestReport> {
    if dry_run {
        // Dry runs load and chunk only; no provider needed.
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(embedding::DisabledEmbeddings);
        return run_ingest_with(config, provider, full, true, limit).await;
    }
    if !config.embedding.is_enabled() {
        bail!("Ingestion requires an embedding provider. Set [embedding] provider in config.");
    }
    let retry = RetryPolicy::from_config(&config.retry);
    let provider = embedding::create_provider(&config.embedding, retry)?;
    run_ingest_with(config, provider, full, false, limit).await
}

/// Run a full ingest with an explicit embedding collaborator. Tests and
/// embedded callers inject their own provider here.
pub async fn run_ingest_with(
    config: &Config,
    provider: Arc<dyn EmbeddingProvider>,
    full: bool,
    dry_run: bool,
    limit: Option<usize>,
) -> Result<IngestReport> {
    let pool = db::connect(&config.index.path).await?;
    let manager = Arc::new(IndexManager::new(Arc::new(SqliteIndex::new(pool.clone()))));

    let mut files = scan_source(config)?;
    // Only a limit that actually cuts the scan short makes the observed
    // source set partial.
    let truncated = match limit {
        Some(lim) if files.len() > lim => {
            files.truncate(lim);
            true
        }
        _ => false,
    };

    let manifest = Arc::new(manager.manifest().await?);

    if dry_run {
        let report = dry_run_report(config, &files, &manifest);
        pool.close().await;
        return Ok(report);
    }

    let mut report = IngestReport {
        scanned: files.len(),
        ..Default::default()
    };
    let present: HashSet<String> = files.iter().map(|f| f.source_id.clone()).collect();

    let concurrency = config.ingest.concurrency;
    let chunk_cfg = config.chunking.clone();
    let batch_size = config.embedding.batch_size;

    let tasks = files.into_iter().map(|file| {
        let provider = Arc::clone(&provider);
        let manager = Arc::clone(&manager);
        let manifest = Arc::clone(&manifest);
        let chunk_cfg = chunk_cfg.clone();
        async move {
            let outcome = process_document(
                file.clone(),
                &manifest,
                full,
                &chunk_cfg,
                provider,
                &manager,
                batch_size,
            )
            .await;
            outcome.map(|(outcome, chunks)| (file.source_id, outcome, chunks))
        }
    });

    let mut stream = futures::stream::iter(tasks).buffer_unordered(concurrency.max(1));
    while let Some(result) = stream.next().await {
        // Fatal configuration drift aborts here; dropping the stream
        // cancels the documents still in flight.
        let (source_id, outcome, chunks) = result?;
        report.chunks_written += chunks;
        match outcome {
            DocOutcome::Added => report.added += 1,
            DocOutcome::Updated => report.updated += 1,
            DocOutcome::Unchanged => report.unchanged += 1,
            DocOutcome::Empty => report.empty += 1,
            DocOutcome::Failed(reason) => report.failures.push((source_id, reason)),
        }
    }
    drop(stream);

    // Removal detection needs the full source set; a truncated scan
    // would report live documents as deleted.
    if !truncated {
        let removed = manager.remove_absent(&present).await?;
        report.removed = removed.len() as u64;
    }

    pool.close().await;
    Ok(report)
}

/// One document's trip through the pipeline. Per-document failures come
/// back as `DocOutcome::Failed`; only fatal configuration errors are
/// returned as `Err`.
async fn process_document(
    file: SourceFile,
    manifest: &HashMap<String, String>,
    full: bool,
    chunk_cfg: &ChunkingConfig,
    provider: Arc<dyn EmbeddingProvider>,
    manager: &IndexManager,
    batch_size: usize,
) -> Result<(DocOutcome, u64)> {
    let previously_known = manifest.contains_key(&file.source_id);

    // Parsing PDFs and DOCX archives is CPU-bound; keep it off the
    // async workers.
    let load_result = {
        let path = file.path.clone();
        let source_id = file.source_id.clone();
        tokio::task::spawn_blocking(move || loader::load(&path, &source_id)).await
    };
    let doc = match load_result {
        Ok(Ok(doc)) => doc,
        Ok(Err(e)) => return Ok((DocOutcome::Failed(e.to_string()), 0)),
        Err(join_err) => return Ok((DocOutcome::Failed(join_err.to_string()), 0)),
    };

    // Idempotence: unchanged bytes mean no chunking, no embedding calls,
    // no index churn.
    if !full && manifest.get(&file.source_id) == Some(&doc.content_hash) {
        return Ok((DocOutcome::Unchanged, 0));
    }

    let chunks = chunk_document(&doc, chunk_cfg);
    if chunks.is_empty() {
        // Nothing to store; drop any previous version so the index never
        // serves stale text for an emptied file.
        if previously_known {
            if let Err(e) = manager.index().delete_document(&doc.source_id).await {
                return Ok((DocOutcome::Failed(e.to_string()), 0));
            }
        }
        return Ok((DocOutcome::Empty, 0));
    }

    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        match provider.embed_batch(&texts).await {
            Ok(batch_vectors) => vectors.extend(batch_vectors),
            Err(e @ EmbeddingError::DimensionMismatch { .. }) => return Err(e.into()),
            Err(e) => return Ok((DocOutcome::Failed(e.to_string()), 0)),
        }
    }

    match manager
        .upsert_document(&doc, &chunks, &vectors, provider.model_name())
        .await
    {
        Ok(()) => {
            let outcome = if previously_known {
                DocOutcome::Updated
            } else {
                DocOutcome::Added
            };
            Ok((outcome, chunks.len() as u64))
        }
        Err(e @ IndexError::ModelMismatch { .. }) => Err(e.into()),
        Err(e) => Ok((DocOutcome::Failed(e.to_string()), 0)),
    }
}

/// Discover source files: walk the root, apply include/exclude globs,
/// sort by source id for deterministic ordering.
pub fn scan_source(config: &Config) -> Result<Vec<SourceFile>> {
    let root = &config.source.root;
    if !root.exists() {
        bail!("Source root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.source.include_globs)?;
    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(config.source.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut files = Vec::new();
    let walker = WalkDir::new(root).follow_links(config.source.follow_symlinks);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let source_id = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&source_id) || !include_set.is_match(&source_id) {
            continue;
        }

        files.push(SourceFile {
            path: path.to_path_buf(),
            source_id,
        });
    }

    files.sort_by(|a, b| a.source_id.cmp(&b.source_id));
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Load and chunk without writing anything; counts what an ingest would do.
fn dry_run_report(
    config: &Config,
    files: &[SourceFile],
    manifest: &HashMap<String, String>,
) -> IngestReport {
    let mut report = IngestReport {
        scanned: files.len(),
        ..Default::default()
    };

    for file in files {
        let doc = match loader::load(&file.path, &file.source_id) {
            Ok(doc) => doc,
            Err(e) => {
                report.failures.push((file.source_id.clone(), e.to_string()));
                continue;
            }
        };
        if manifest.get(&file.source_id) == Some(&doc.content_hash) {
            report.unchanged += 1;
            continue;
        }
        let chunks = chunk_document(&doc, &config.chunking);
        if chunks.is_empty() {
            report.empty += 1;
            continue;
        }
        if manifest.contains_key(&file.source_id) {
            report.updated += 1;
        } else {
            report.added += 1;
        }
        report.chunks_written += chunks.len() as u64;
    }

    report
}

/// Print the run summary the way `quarry ingest` reports it.
pub fn print_report(config: &Config, report: &IngestReport, dry_run: bool) {
    if dry_run {
        println!("ingest {} (dry-run)", config.source.root.display());
    } else {
        println!("ingest {}", config.source.root.display());
    }
    println!("  scanned: {} files", report.scanned);
    println!("  added: {}", report.added);
    println!("  updated: {}", report.updated);
    println!("  unchanged: {}", report.unchanged);
    println!("  removed: {}", report.removed);
    if report.empty > 0 {
        println!("  empty (skipped): {}", report.empty);
    }
    println!("  chunks written: {}", report.chunks_written);
    if report.failures.is_empty() {
        println!("ok");
    } else {
        println!("  failed: {}", report.failures.len());
        for (source_id, reason) in &report.failures {
            eprintln!("    {}: {}", source_id, reason);
        }
        println!("completed with failures");
    }
}
